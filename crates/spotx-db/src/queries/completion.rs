use crate::connection::Database;
use crate::error::{DbError, Result};
use crate::models::{CompletionOutcome, CompletionRecord};
use chrono::Utc;
use tracing::{debug, info};

pub struct CompletionQueries;

impl CompletionQueries {
    /// Apply a completed view in one transaction: the view row, the campaign spend
    /// increment (verified views only), the daily stats row and the user's reward.
    ///
    /// The view id is the idempotency key. Replaying a record whose view already
    /// exists writes nothing and returns `AlreadyRecorded`.
    pub async fn record(db: &Database, record: &CompletionRecord) -> Result<CompletionOutcome> {
        let pool = db.pool()?;
        let view = &record.view;
        let view_id = view.id.to_string();
        let campaign_id = view.campaign_id.to_string();

        let mut tx = pool.begin().await?;

        let existing: Option<i64> = sqlx::query_scalar("SELECT 1 FROM ad_views WHERE id = ?")
            .bind(&view_id)
            .fetch_optional(&mut *tx)
            .await?;
        if existing.is_some() {
            tx.rollback().await?;
            debug!("Ad view {} already recorded, skipping", view_id);
            return Ok(CompletionOutcome::AlreadyRecorded);
        }

        sqlx::query(
            r#"
            INSERT INTO ad_views (
                id, user_id, campaign_id, slot_id, watched_at, duration_seconds,
                reward_earned_cents, verified
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&view_id)
        .bind(view.user_id.to_string())
        .bind(&campaign_id)
        .bind(i64::from(view.slot_id))
        .bind(view.watched_at)
        .bind(i64::from(view.duration_seconds))
        .bind(view.reward_earned_cents)
        .bind(view.verified)
        .execute(&mut *tx)
        .await?;

        let mut campaign_completed = false;
        let spend = record.campaign_spend_cents.unwrap_or(0);

        if let Some(amount) = record.campaign_spend_cents {
            let updated = sqlx::query(
                "UPDATE campaigns SET spent_cents = spent_cents + ?, updated_at = ? WHERE id = ?",
            )
            .bind(amount)
            .bind(Utc::now())
            .bind(&campaign_id)
            .execute(&mut *tx)
            .await?;

            if updated.rows_affected() == 0 {
                return Err(DbError::NotFound(format!("Campaign {} not found", campaign_id)));
            }

            let exhausted = sqlx::query(
                r#"
                UPDATE campaigns SET status = 'completed', updated_at = ?
                WHERE id = ? AND status = 'active' AND spent_cents >= budget_cents
                "#,
            )
            .bind(Utc::now())
            .bind(&campaign_id)
            .execute(&mut *tx)
            .await?;
            campaign_completed = exhausted.rows_affected() > 0;
        }

        sqlx::query(
            r#"
            INSERT INTO campaign_stats (campaign_id, date, views, verified_views, spend_cents)
            VALUES (?, ?, 1, ?, ?)
            ON CONFLICT (campaign_id, date) DO UPDATE SET
                views = views + 1,
                verified_views = verified_views + excluded.verified_views,
                spend_cents = spend_cents + excluded.spend_cents
            "#,
        )
        .bind(&campaign_id)
        .bind(record.stats_date)
        .bind(i64::from(view.verified))
        .bind(spend)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO rewards (id, user_id, amount_cents, ad_view_id, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.reward.id.to_string())
        .bind(record.reward.user_id.to_string())
        .bind(record.reward.amount_cents)
        .bind(&view_id)
        .bind(record.reward.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        if campaign_completed {
            info!("Campaign {} exhausted its budget and was completed", campaign_id);
        }
        debug!("Recorded ad view {} (verified: {})", view_id, view.verified);

        Ok(CompletionOutcome::Recorded { campaign_completed })
    }
}
