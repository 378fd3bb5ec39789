//! Lazy daily rollover of per-user slot completion.
//!
//! There is no midnight reset job: a persisted snapshot from an earlier date is
//! simply ignored the next time it is read.

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::slot_calendar::{slot_by_id, SLOTS};
use crate::types::{DailyAdStatus, SlotStatus};

/// A status for `date` with every slot incomplete
pub fn fresh_status(date: NaiveDate) -> DailyAdStatus {
    DailyAdStatus { date, slots: SLOTS.iter().map(|slot| SlotStatus::pending(slot.id)).collect() }
}

/// Map a persisted snapshot to the one in effect on `today`
pub fn effective_status(persisted: Option<DailyAdStatus>, today: NaiveDate) -> DailyAdStatus {
    match persisted {
        Some(status) if status.date == today => status,
        _ => fresh_status(today),
    }
}

/// Mark a slot completed. A slot completed earlier the same day is overwritten.
pub fn complete_slot(
    status: &mut DailyAdStatus,
    slot_id: u8,
    ad_id: Uuid,
    viewed_at: DateTime<Utc>,
) -> Result<()> {
    slot_by_id(slot_id)?;

    let entry = status
        .slots
        .iter_mut()
        .find(|s| s.slot_id == slot_id)
        .ok_or(Error::InvalidSlot(slot_id))?;

    entry.completed = true;
    entry.ad_id = Some(ad_id);
    entry.viewed_at = Some(viewed_at);
    Ok(())
}
