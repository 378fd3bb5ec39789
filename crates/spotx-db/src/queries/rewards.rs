use crate::connection::Database;
use crate::error::Result;
use crate::models::DbReward;
use spotx_common::types::Reward;

pub struct RewardQueries;

impl RewardQueries {
    pub async fn list_for_user(db: &Database, user_id: &str) -> Result<Vec<Reward>> {
        let pool = db.pool()?;

        sqlx::query_as::<_, DbReward>(
            "SELECT * FROM rewards WHERE user_id = ? ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(Reward::try_from)
        .collect()
    }

    pub async fn get_for_view(db: &Database, ad_view_id: &str) -> Result<Option<Reward>> {
        let pool = db.pool()?;

        sqlx::query_as::<_, DbReward>("SELECT * FROM rewards WHERE ad_view_id = ?")
            .bind(ad_view_id)
            .fetch_optional(pool)
            .await?
            .map(Reward::try_from)
            .transpose()
    }

    pub async fn total_for_user(db: &Database, user_id: &str) -> Result<i64> {
        let pool = db.pool()?;

        Ok(sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount_cents), 0) FROM rewards WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_one(pool)
        .await?)
    }

    pub async fn total_granted(db: &Database) -> Result<i64> {
        let pool = db.pool()?;

        Ok(sqlx::query_scalar("SELECT COALESCE(SUM(amount_cents), 0) FROM rewards")
            .fetch_one(pool)
            .await?)
    }
}
