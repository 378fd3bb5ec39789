use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use spotx_common::daily_status::{complete_slot, effective_status};
use spotx_common::types::DailyAdStatus;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::local_store::{self, LocalStore};

/// Per-user daily slot completion, persisted in the local store.
/// Stale snapshots from earlier days are replaced on read.
pub struct DailyStatusStore {
    store: Arc<dyn LocalStore>,
}

impl DailyStatusStore {
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self { store }
    }

    fn key(user_id: Uuid) -> String {
        format!("daily_ad_status:{}", user_id)
    }

    pub async fn get_daily_status(&self, user_id: Uuid, today: NaiveDate) -> Result<DailyAdStatus> {
        let persisted: Option<DailyAdStatus> =
            local_store::load(self.store.as_ref(), &Self::key(user_id)).await?;

        if let Some(stale) = persisted.as_ref().filter(|s| s.date != today) {
            debug!("Rolling over daily status for {} from {} to {}", user_id, stale.date, today);
        }

        Ok(effective_status(persisted, today))
    }

    /// Mark a slot watched and persist. A repeat completion overwrites the earlier one.
    pub async fn complete_slot(
        &self,
        user_id: Uuid,
        today: NaiveDate,
        slot_id: u8,
        ad_id: Uuid,
        viewed_at: DateTime<Utc>,
    ) -> Result<DailyAdStatus> {
        let mut status = self.get_daily_status(user_id, today).await?;

        if status.is_completed(slot_id) {
            warn!("Slot {} already completed today for user {}, overwriting", slot_id, user_id);
        }

        complete_slot(&mut status, slot_id, ad_id, viewed_at)?;
        local_store::save(self.store.as_ref(), &Self::key(user_id), &status).await?;

        debug!("Slot {} marked complete for user {}", slot_id, user_id);
        Ok(status)
    }
}
