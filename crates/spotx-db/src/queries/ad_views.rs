use crate::connection::Database;
use crate::error::{DbError, Result};
use crate::models::DbAdView;
use chrono::{DateTime, Utc};
use spotx_common::types::AdView;

pub struct AdViewQueries;

impl AdViewQueries {
    pub async fn get_by_id(db: &Database, id: &str) -> Result<AdView> {
        let pool = db.pool()?;

        sqlx::query_as::<_, DbAdView>("SELECT * FROM ad_views WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("Ad view {} not found", id)))?
            .try_into()
    }

    pub async fn list_for_user(db: &Database, user_id: &str, limit: i64) -> Result<Vec<AdView>> {
        let pool = db.pool()?;

        sqlx::query_as::<_, DbAdView>(
            "SELECT * FROM ad_views WHERE user_id = ? ORDER BY watched_at DESC LIMIT ?",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(AdView::try_from)
        .collect()
    }

    /// Views recorded for one user and slot inside `[from, to)`
    pub async fn count_for_slot_between(
        db: &Database,
        user_id: &str,
        slot_id: u8,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<i64> {
        let pool = db.pool()?;

        Ok(sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM ad_views
            WHERE user_id = ? AND slot_id = ? AND watched_at >= ? AND watched_at < ?
            "#,
        )
        .bind(user_id)
        .bind(i64::from(slot_id))
        .bind(from)
        .bind(to)
        .fetch_one(pool)
        .await?)
    }

    pub async fn count_since(db: &Database, since: DateTime<Utc>) -> Result<i64> {
        let pool = db.pool()?;

        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM ad_views WHERE watched_at >= ?")
            .bind(since)
            .fetch_one(pool)
            .await?)
    }
}
