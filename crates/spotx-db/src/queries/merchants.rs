use crate::connection::Database;
use crate::error::{DbError, Result};
use crate::models::{DbMerchant, NewMerchant};
use chrono::Utc;
use spotx_common::types::{Merchant, MerchantStatus};

pub struct MerchantQueries;

impl MerchantQueries {
    pub async fn create(db: &Database, merchant: NewMerchant) -> Result<Merchant> {
        let pool = db.pool()?;

        let result = sqlx::query(
            r#"
            INSERT INTO merchants (id, business_name, contact_email, status, created_at)
            VALUES (?, ?, ?, 'pending', ?)
            "#,
        )
        .bind(&merchant.id)
        .bind(&merchant.business_name)
        .bind(&merchant.contact_email)
        .bind(Utc::now())
        .execute(pool)
        .await;

        match result {
            Ok(_) => Self::get_by_id(db, &merchant.id).await,
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(DbError::Duplicate(
                format!("Merchant with email '{}' already exists", merchant.contact_email),
            )),
            Err(e) => Err(DbError::Sqlx(e)),
        }
    }

    pub async fn get_by_id(db: &Database, id: &str) -> Result<Merchant> {
        let pool = db.pool()?;

        sqlx::query_as::<_, DbMerchant>("SELECT * FROM merchants WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("Merchant {} not found", id)))?
            .try_into()
    }

    pub async fn list_all(db: &Database) -> Result<Vec<Merchant>> {
        let pool = db.pool()?;

        sqlx::query_as::<_, DbMerchant>("SELECT * FROM merchants ORDER BY business_name")
            .fetch_all(pool)
            .await?
            .into_iter()
            .map(Merchant::try_from)
            .collect()
    }

    pub async fn update_status(db: &Database, id: &str, status: MerchantStatus) -> Result<()> {
        let pool = db.pool()?;

        let result = sqlx::query("UPDATE merchants SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            Err(DbError::NotFound(format!("Merchant {} not found", id)))
        } else {
            Ok(())
        }
    }

    pub async fn count_by_status(db: &Database, status: MerchantStatus) -> Result<i64> {
        let pool = db.pool()?;

        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM merchants WHERE status = ?")
            .bind(status.as_str())
            .fetch_one(pool)
            .await?)
    }
}
