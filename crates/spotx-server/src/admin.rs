use std::sync::Arc;

use chrono::{Local, Utc};
use serde::{Deserialize, Serialize};
use spotx_common::types::{CampaignStatus, MerchantStatus, PayoutStatus};
use spotx_db::queries::{
    AdViewQueries, CampaignQueries, MerchantQueries, PayoutQueries, RewardQueries, UserQueries,
};
use spotx_db::Database;
use tracing::debug;

use crate::clock::Clock;
use crate::completion_recorder::CompletionRecorder;
use crate::error::Result;
use crate::session_manager::SessionManager;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub users: i64,
    pub merchants_pending: i64,
    pub merchants_approved: i64,
    pub campaigns_active: i64,
    pub campaigns_completed: i64,
    pub total_spent_cents: i64,
    pub total_rewards_cents: i64,
    pub payouts_pending_cents: i64,
    pub payouts_paid_cents: i64,
    pub views_today: i64,
    pub outbox_pending: usize,
    pub active_sessions: usize,
}

pub struct AdminService {
    db: Arc<Database>,
    clock: Arc<dyn Clock>,
    recorder: Arc<CompletionRecorder>,
    sessions: SessionManager,
}

impl AdminService {
    pub fn new(
        db: Arc<Database>,
        clock: Arc<dyn Clock>,
        recorder: Arc<CompletionRecorder>,
        sessions: SessionManager,
    ) -> Self {
        Self { db, clock, recorder, sessions }
    }

    /// Aggregates from independent queries run concurrently
    pub async fn dashboard(&self) -> Result<DashboardSummary> {
        let db = self.db.as_ref();
        let midnight = self
            .clock
            .today()
            .and_hms_opt(0, 0, 0)
            .and_then(|t| t.and_local_timezone(Local).earliest())
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(|| self.clock.now_utc());

        let (
            users,
            merchants_pending,
            merchants_approved,
            campaigns_active,
            campaigns_completed,
            total_spent_cents,
            total_rewards_cents,
            payouts_pending_cents,
            payouts_paid_cents,
            views_today,
        ) = tokio::try_join!(
            UserQueries::count(db),
            MerchantQueries::count_by_status(db, MerchantStatus::Pending),
            MerchantQueries::count_by_status(db, MerchantStatus::Approved),
            CampaignQueries::count_by_status(db, CampaignStatus::Active),
            CampaignQueries::count_by_status(db, CampaignStatus::Completed),
            CampaignQueries::total_spent(db),
            RewardQueries::total_granted(db),
            PayoutQueries::total_by_status(db, PayoutStatus::Pending),
            PayoutQueries::total_by_status(db, PayoutStatus::Paid),
            AdViewQueries::count_since(db, midnight),
        )?;

        let outbox_pending = self.recorder.pending_outbox().await?;
        let active_sessions = self.sessions.active_count().await;

        debug!("Dashboard computed: {} users, {} views today", users, views_today);

        Ok(DashboardSummary {
            users,
            merchants_pending,
            merchants_approved,
            campaigns_active,
            campaigns_completed,
            total_spent_cents,
            total_rewards_cents,
            payouts_pending_cents,
            payouts_paid_cents,
            views_today,
            outbox_pending,
            active_sessions,
        })
    }
}
