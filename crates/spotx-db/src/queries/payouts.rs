use crate::connection::Database;
use crate::error::{DbError, Result};
use crate::models::{DbPayout, PayoutRequest};
use chrono::Utc;
use spotx_common::types::{Payout, PayoutStatus};
use uuid::Uuid;

pub struct PayoutQueries;

impl PayoutQueries {
    /// Insert a pending payout only if it fits the unreserved balance: earned rewards
    /// minus every payout already requested, paid or not. The check and the insert are
    /// one statement inside the transaction, so concurrent requests cannot both pass.
    pub async fn request_within_balance(
        db: &Database,
        user_id: &str,
        amount_cents: i64,
    ) -> Result<PayoutRequest> {
        let pool = db.pool()?;
        let mut tx = pool.begin().await?;

        let id = Uuid::new_v4().to_string();

        let inserted = sqlx::query(
            r#"
            INSERT INTO payouts (id, user_id, amount_cents, status, requested_at)
            SELECT ?, ?, ?, 'pending', ?
            WHERE ? <= (SELECT COALESCE(SUM(amount_cents), 0) FROM rewards WHERE user_id = ?)
                     - (SELECT COALESCE(SUM(amount_cents), 0) FROM payouts WHERE user_id = ?)
            "#,
        )
        .bind(&id)
        .bind(user_id)
        .bind(amount_cents)
        .bind(Utc::now())
        .bind(amount_cents)
        .bind(user_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            let available: i64 = sqlx::query_scalar(
                r#"
                SELECT (SELECT COALESCE(SUM(amount_cents), 0) FROM rewards WHERE user_id = ?)
                     - (SELECT COALESCE(SUM(amount_cents), 0) FROM payouts WHERE user_id = ?)
                "#,
            )
            .bind(user_id)
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await?;
            tx.rollback().await?;
            return Ok(PayoutRequest::InsufficientBalance { available: available.max(0) });
        }

        let payout: Payout = sqlx::query_as::<_, DbPayout>("SELECT * FROM payouts WHERE id = ?")
            .bind(&id)
            .fetch_one(&mut *tx)
            .await?
            .try_into()?;
        tx.commit().await?;

        Ok(PayoutRequest::Created(payout))
    }

    pub async fn get_by_id(db: &Database, id: &str) -> Result<Payout> {
        let pool = db.pool()?;

        sqlx::query_as::<_, DbPayout>("SELECT * FROM payouts WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("Payout {} not found", id)))?
            .try_into()
    }

    pub async fn list_for_user(db: &Database, user_id: &str) -> Result<Vec<Payout>> {
        let pool = db.pool()?;

        sqlx::query_as::<_, DbPayout>(
            "SELECT * FROM payouts WHERE user_id = ? ORDER BY requested_at DESC",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(Payout::try_from)
        .collect()
    }

    pub async fn mark_paid(db: &Database, id: &str) -> Result<Payout> {
        let pool = db.pool()?;

        let result = sqlx::query(
            "UPDATE payouts SET status = 'paid', paid_at = ? WHERE id = ? AND status = 'pending'",
        )
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await?;

        if result.rows_affected() == 0 {
            let payout = Self::get_by_id(db, id).await?;
            return Err(DbError::InvalidData(format!(
                "Payout {} is already {}",
                id,
                payout.status.as_str()
            )));
        }
        Self::get_by_id(db, id).await
    }

    /// Sum of payouts in the given status for one user
    pub async fn total_for_user(db: &Database, user_id: &str, status: PayoutStatus) -> Result<i64> {
        let pool = db.pool()?;

        Ok(sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount_cents), 0) FROM payouts WHERE user_id = ? AND status = ?",
        )
        .bind(user_id)
        .bind(status.as_str())
        .fetch_one(pool)
        .await?)
    }

    pub async fn total_by_status(db: &Database, status: PayoutStatus) -> Result<i64> {
        let pool = db.pool()?;

        Ok(sqlx::query_scalar("SELECT COALESCE(SUM(amount_cents), 0) FROM payouts WHERE status = ?")
            .bind(status.as_str())
            .fetch_one(pool)
            .await?)
    }
}
