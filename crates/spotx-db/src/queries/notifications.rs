use crate::connection::Database;
use crate::error::{DbError, Result};
use crate::models::{DbNotification, NewNotification};
use chrono::Utc;

pub struct NotificationQueries;

impl NotificationQueries {
    pub async fn log(db: &Database, notification: NewNotification) -> Result<i64> {
        let pool = db.pool()?;

        let result = sqlx::query(
            r#"
            INSERT INTO notifications (user_id, title, body, data, sent_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&notification.user_id)
        .bind(&notification.title)
        .bind(&notification.body)
        .bind(&notification.data)
        .bind(Utc::now())
        .execute(pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn list_recent(db: &Database, limit: i64) -> Result<Vec<DbNotification>> {
        let pool = db.pool()?;

        sqlx::query_as::<_, DbNotification>(
            "SELECT * FROM notifications ORDER BY sent_at DESC, id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(pool)
        .await
        .map_err(DbError::Sqlx)
    }
}
