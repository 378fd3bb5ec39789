use crate::connection::Database;
use crate::error::{DbError, Result};
use crate::models::{DbUser, NewUser};
use chrono::Utc;
use spotx_common::types::User;

pub struct UserQueries;

impl UserQueries {
    pub async fn create(db: &Database, user: NewUser) -> Result<User> {
        let pool = db.pool()?;

        let result = sqlx::query(
            r#"
            INSERT INTO users (id, name, email, interests, push_token, preferred_slots, created_at)
            VALUES (?, ?, ?, ?, ?, '[]', ?)
            "#,
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(serde_json::to_string(&user.interests)?)
        .bind(&user.push_token)
        .bind(Utc::now())
        .execute(pool)
        .await;

        match result {
            Ok(_) => Self::get_by_id(db, &user.id).await,
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(DbError::Duplicate(format!("User with email '{}' already exists", user.email)))
            }
            Err(e) => Err(DbError::Sqlx(e)),
        }
    }

    pub async fn get_by_id(db: &Database, id: &str) -> Result<User> {
        let pool = db.pool()?;

        sqlx::query_as::<_, DbUser>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("User {} not found", id)))?
            .try_into()
    }

    pub async fn list_all(db: &Database) -> Result<Vec<User>> {
        let pool = db.pool()?;

        sqlx::query_as::<_, DbUser>("SELECT * FROM users ORDER BY created_at")
            .fetch_all(pool)
            .await?
            .into_iter()
            .map(User::try_from)
            .collect()
    }

    /// Users with a registered push token
    pub async fn list_with_push_tokens(db: &Database) -> Result<Vec<User>> {
        let pool = db.pool()?;

        sqlx::query_as::<_, DbUser>(
            r#"
            SELECT * FROM users
            WHERE push_token IS NOT NULL AND push_token != ''
            ORDER BY created_at
            "#,
        )
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(User::try_from)
        .collect()
    }

    pub async fn update_push_token(db: &Database, id: &str, token: Option<&str>) -> Result<()> {
        let pool = db.pool()?;

        let result = sqlx::query("UPDATE users SET push_token = ? WHERE id = ?")
            .bind(token)
            .bind(id)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            Err(DbError::NotFound(format!("User {} not found", id)))
        } else {
            Ok(())
        }
    }

    pub async fn update_preferred_slots(db: &Database, id: &str, slots: &[u8]) -> Result<()> {
        let pool = db.pool()?;

        let result = sqlx::query("UPDATE users SET preferred_slots = ? WHERE id = ?")
            .bind(serde_json::to_string(slots)?)
            .bind(id)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            Err(DbError::NotFound(format!("User {} not found", id)))
        } else {
            Ok(())
        }
    }

    pub async fn count(db: &Database) -> Result<i64> {
        let pool = db.pool()?;

        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM users").fetch_one(pool).await?)
    }
}
