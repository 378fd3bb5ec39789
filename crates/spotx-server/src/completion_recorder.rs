use std::sync::Arc;

use chrono::{Duration, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use spotx_common::rewards::{is_verified, RewardRules};
use spotx_common::slot_calendar::slot_by_id;
use spotx_common::types::{AdView, Campaign, DailyAdStatus, Reward};
use spotx_common::Error as DomainError;
use spotx_db::queries::{AdViewQueries, CompletionQueries};
use spotx_db::{CompletionOutcome, CompletionRecord, Database};
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::daily_status_store::DailyStatusStore;
use crate::error::Result;
use crate::local_store::{self, LocalStore};

const OUTBOX_KEY: &str = "completion_outbox";

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub user_id: Uuid,
    pub campaign: Campaign,
    pub slot_id: u8,
    pub watched_secs: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Persistence {
    Recorded { campaign_completed: bool },
    /// Database write failed; the completion waits in the local outbox
    Queued,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionReceipt {
    pub view: AdView,
    pub reward: Reward,
    pub persistence: Persistence,
    pub daily_status: DailyAdStatus,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboxReport {
    pub replayed: usize,
    pub skipped: usize,
    pub remaining: usize,
}

pub struct CompletionRecorder {
    db: Arc<Database>,
    store: Arc<dyn LocalStore>,
    daily_status: Arc<DailyStatusStore>,
    clock: Arc<dyn Clock>,
    rules: RewardRules,
    enforce_single_view: bool,
    outbox_lock: Mutex<()>,
}

impl CompletionRecorder {
    pub fn new(
        db: Arc<Database>,
        store: Arc<dyn LocalStore>,
        daily_status: Arc<DailyStatusStore>,
        clock: Arc<dyn Clock>,
        rules: RewardRules,
        enforce_single_view: bool,
    ) -> Self {
        Self {
            db,
            store,
            daily_status,
            clock,
            rules,
            enforce_single_view,
            outbox_lock: Mutex::new(()),
        }
    }

    /// Record a finished view: one database transaction for view, spend, stats and
    /// reward, falling back to the local outbox when it fails, then mark the slot.
    pub async fn record(&self, request: CompletionRequest) -> Result<CompletionReceipt> {
        slot_by_id(request.slot_id)?;

        let now = self.clock.now();
        let today = now.date_naive();

        self.check_slot_on(request.user_id, request.slot_id, today).await?;

        let watched_at = now.with_timezone(&Utc);
        let verified = is_verified(request.watched_secs, request.campaign.duration_seconds);
        let view = AdView {
            id: Uuid::new_v4(),
            user_id: request.user_id,
            campaign_id: request.campaign.id,
            slot_id: request.slot_id,
            watched_at,
            duration_seconds: request.watched_secs,
            reward_earned_cents: self.rules.per_view_cents(),
            verified,
        };
        let reward = Reward {
            id: Uuid::new_v4(),
            user_id: request.user_id,
            amount_cents: view.reward_earned_cents,
            ad_view_id: view.id,
            created_at: watched_at,
        };
        let record = CompletionRecord {
            view: view.clone(),
            reward: reward.clone(),
            campaign_spend_cents: verified.then_some(request.campaign.reward_per_view_cents),
            stats_date: today,
        };

        let persistence = match CompletionQueries::record(&self.db, &record).await {
            Ok(CompletionOutcome::Recorded { campaign_completed }) => {
                Persistence::Recorded { campaign_completed }
            }
            Ok(CompletionOutcome::AlreadyRecorded) => {
                Persistence::Recorded { campaign_completed: false }
            }
            Err(e) => {
                warn!("Recording view {} failed, queueing locally: {}", view.id, e);
                self.enqueue(record).await?;
                Persistence::Queued
            }
        };

        let daily_status = self
            .daily_status
            .complete_slot(request.user_id, today, request.slot_id, request.campaign.id, watched_at)
            .await?;

        info!(
            "User {} completed slot {} with campaign {} (verified: {}, reward: {})",
            request.user_id, request.slot_id, request.campaign.id, verified, reward.amount_cents
        );

        Ok(CompletionReceipt { view, reward, persistence, daily_status })
    }

    /// Fails with `SlotAlreadyCompleted` when single-view enforcement is on and the
    /// user already watched this slot today. Otherwise a repeat only logs a warning.
    pub async fn check_slot_available(&self, user_id: Uuid, slot_id: u8) -> Result<()> {
        self.check_slot_on(user_id, slot_id, self.clock.today()).await
    }

    async fn check_slot_on(&self, user_id: Uuid, slot_id: u8, today: NaiveDate) -> Result<()> {
        let status = self.daily_status.get_daily_status(user_id, today).await?;
        if !self.enforce_single_view {
            if status.is_completed(slot_id) {
                warn!("User {} is repeating slot {} today", user_id, slot_id);
            }
            return Ok(());
        }

        if status.is_completed(slot_id) {
            return Err(DomainError::SlotAlreadyCompleted(slot_id).into());
        }

        let start = today
            .and_hms_opt(0, 0, 0)
            .and_then(|t| t.and_local_timezone(Local).earliest())
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);
        let end = start + Duration::days(1);

        let recorded = AdViewQueries::count_for_slot_between(
            &self.db,
            &user_id.to_string(),
            slot_id,
            start,
            end,
        )
        .await?;
        if recorded > 0 {
            return Err(DomainError::SlotAlreadyCompleted(slot_id).into());
        }
        Ok(())
    }

    async fn enqueue(&self, record: CompletionRecord) -> Result<()> {
        let _guard = self.outbox_lock.lock().await;

        let mut pending: Vec<CompletionRecord> =
            local_store::load(self.store.as_ref(), OUTBOX_KEY).await?.unwrap_or_default();
        pending.push(record);
        local_store::save(self.store.as_ref(), OUTBOX_KEY, &pending).await?;

        info!("Completion outbox now holds {} entries", pending.len());
        Ok(())
    }

    pub async fn pending_outbox(&self) -> Result<usize> {
        let pending: Vec<CompletionRecord> =
            local_store::load(self.store.as_ref(), OUTBOX_KEY).await?.unwrap_or_default();
        Ok(pending.len())
    }

    /// Replay queued completions. Entries whose view already exists are dropped.
    pub async fn flush_outbox(&self) -> Result<OutboxReport> {
        let _guard = self.outbox_lock.lock().await;

        let pending: Vec<CompletionRecord> =
            local_store::load(self.store.as_ref(), OUTBOX_KEY).await?.unwrap_or_default();
        if pending.is_empty() {
            return Ok(OutboxReport::default());
        }

        let mut report = OutboxReport::default();
        let mut remaining = Vec::new();

        for record in pending {
            match CompletionQueries::record(&self.db, &record).await {
                Ok(CompletionOutcome::Recorded { .. }) => report.replayed += 1,
                Ok(CompletionOutcome::AlreadyRecorded) => report.skipped += 1,
                Err(e) => {
                    error!("Replaying view {} failed: {}", record.view.id, e);
                    remaining.push(record);
                }
            }
        }

        report.remaining = remaining.len();
        if remaining.is_empty() {
            self.store.remove(OUTBOX_KEY).await?;
        } else {
            local_store::save(self.store.as_ref(), OUTBOX_KEY, &remaining).await?;
        }

        info!(
            "Outbox flush: {} replayed, {} skipped, {} remaining",
            report.replayed, report.skipped, report.remaining
        );
        Ok(report)
    }
}
