use crate::connection::Database;
use crate::error::{DbError, Result};
use crate::models::{DbCampaign, NewCampaign};
use chrono::Utc;
use spotx_common::types::{Campaign, CampaignInput, CampaignStatus};

pub struct CampaignQueries;

impl CampaignQueries {
    pub async fn create(db: &Database, campaign: NewCampaign) -> Result<Campaign> {
        let pool = db.pool()?;

        let now = Utc::now();
        let input = &campaign.input;

        sqlx::query(
            r#"
            INSERT INTO campaigns (
                id, merchant_id, name, description, media_url, budget_cents, spent_cents,
                reward_per_view_cents, duration_seconds, target_interests, status,
                created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, 0, ?, ?, ?, 'draft', ?, ?)
            "#,
        )
        .bind(&campaign.id)
        .bind(&campaign.merchant_id)
        .bind(input.name.trim())
        .bind(&input.description)
        .bind(&input.media_url)
        .bind(input.budget_cents)
        .bind(input.reward_per_view_cents)
        .bind(i64::from(input.duration_seconds))
        .bind(serde_json::to_string(&input.target_interests)?)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await?;

        Self::get_by_id(db, &campaign.id).await
    }

    pub async fn get_by_id(db: &Database, id: &str) -> Result<Campaign> {
        let pool = db.pool()?;

        sqlx::query_as::<_, DbCampaign>("SELECT * FROM campaigns WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("Campaign {} not found", id)))?
            .try_into()
    }

    pub async fn list_all(db: &Database) -> Result<Vec<Campaign>> {
        let pool = db.pool()?;

        Self::convert(
            sqlx::query_as::<_, DbCampaign>("SELECT * FROM campaigns ORDER BY created_at DESC")
                .fetch_all(pool)
                .await?,
        )
    }

    pub async fn list_by_merchant(db: &Database, merchant_id: &str) -> Result<Vec<Campaign>> {
        let pool = db.pool()?;

        Self::convert(
            sqlx::query_as::<_, DbCampaign>(
                "SELECT * FROM campaigns WHERE merchant_id = ? ORDER BY created_at DESC",
            )
            .bind(merchant_id)
            .fetch_all(pool)
            .await?,
        )
    }

    pub async fn list_by_status(db: &Database, status: CampaignStatus) -> Result<Vec<Campaign>> {
        let pool = db.pool()?;

        Self::convert(
            sqlx::query_as::<_, DbCampaign>(
                "SELECT * FROM campaigns WHERE status = ? ORDER BY created_at",
            )
            .bind(status.as_str())
            .fetch_all(pool)
            .await?,
        )
    }

    /// Replace the editable fields of a campaign. Spend and status are untouched.
    pub async fn update_details(
        db: &Database,
        id: &str,
        input: &CampaignInput,
    ) -> Result<Campaign> {
        let pool = db.pool()?;

        let result = sqlx::query(
            r#"
            UPDATE campaigns
            SET name = ?, description = ?, media_url = ?, budget_cents = ?,
                reward_per_view_cents = ?, duration_seconds = ?, target_interests = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(input.name.trim())
        .bind(&input.description)
        .bind(&input.media_url)
        .bind(input.budget_cents)
        .bind(input.reward_per_view_cents)
        .bind(i64::from(input.duration_seconds))
        .bind(serde_json::to_string(&input.target_interests)?)
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(format!("Campaign {} not found", id)));
        }
        Self::get_by_id(db, id).await
    }

    pub async fn update_status(db: &Database, id: &str, status: CampaignStatus) -> Result<()> {
        let pool = db.pool()?;

        let result = sqlx::query("UPDATE campaigns SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(Utc::now())
            .bind(id)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            Err(DbError::NotFound(format!("Campaign {} not found", id)))
        } else {
            Ok(())
        }
    }

    /// Delete a campaign that never left draft
    pub async fn delete_draft(db: &Database, id: &str) -> Result<()> {
        let pool = db.pool()?;

        let result = sqlx::query("DELETE FROM campaigns WHERE id = ? AND status = 'draft'")
            .bind(id)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            let campaign = Self::get_by_id(db, id).await?;
            return Err(DbError::InvalidData(format!(
                "Campaign {} is {} and cannot be deleted",
                id, campaign.status
            )));
        }
        Ok(())
    }

    pub async fn count_by_status(db: &Database, status: CampaignStatus) -> Result<i64> {
        let pool = db.pool()?;

        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM campaigns WHERE status = ?")
            .bind(status.as_str())
            .fetch_one(pool)
            .await?)
    }

    /// Total merchant spend across every campaign
    pub async fn total_spent(db: &Database) -> Result<i64> {
        let pool = db.pool()?;

        Ok(sqlx::query_scalar("SELECT COALESCE(SUM(spent_cents), 0) FROM campaigns")
            .fetch_one(pool)
            .await?)
    }

    fn convert(rows: Vec<DbCampaign>) -> Result<Vec<Campaign>> {
        rows.into_iter().map(Campaign::try_from).collect()
    }
}
