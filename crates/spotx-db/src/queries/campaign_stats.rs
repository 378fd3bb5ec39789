use crate::connection::Database;
use crate::error::Result;
use crate::models::DbCampaignStats;
use chrono::NaiveDate;
use spotx_common::types::CampaignStats;

pub struct CampaignStatsQueries;

impl CampaignStatsQueries {
    pub async fn get_for_date(
        db: &Database,
        campaign_id: &str,
        date: NaiveDate,
    ) -> Result<Option<CampaignStats>> {
        let pool = db.pool()?;

        sqlx::query_as::<_, DbCampaignStats>(
            "SELECT * FROM campaign_stats WHERE campaign_id = ? AND date = ?",
        )
        .bind(campaign_id)
        .bind(date)
        .fetch_optional(pool)
        .await?
        .map(CampaignStats::try_from)
        .transpose()
    }

    pub async fn list_for_campaign(
        db: &Database,
        campaign_id: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<CampaignStats>> {
        let pool = db.pool()?;

        sqlx::query_as::<_, DbCampaignStats>(
            r#"
            SELECT * FROM campaign_stats
            WHERE campaign_id = ? AND date >= ? AND date <= ?
            ORDER BY date DESC
            "#,
        )
        .bind(campaign_id)
        .bind(start_date)
        .bind(end_date)
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(CampaignStats::try_from)
        .collect()
    }
}
