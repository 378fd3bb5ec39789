use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveDate;
use spotx_common::slot_calendar::current_active_slot;
use spotx_db::queries::UserQueries;
use spotx_db::Database;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::error::Result;
use crate::notification_manager::NotificationManager;

/// Reminds users when a slot they prefer opens, at most once per slot per day
pub struct SlotReminderTask {
    db: Arc<Database>,
    notifications: Arc<NotificationManager>,
    clock: Arc<dyn Clock>,
    reminded: RwLock<HashSet<(u8, NaiveDate)>>,
}

impl SlotReminderTask {
    pub fn new(
        db: Arc<Database>,
        notifications: Arc<NotificationManager>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { db, notifications, clock, reminded: RwLock::new(HashSet::new()) }
    }

    /// Run one check. Returns the number of reminders queued.
    pub async fn check_and_notify(&self) -> Result<usize> {
        let today = self.clock.today();
        let Some(slot) = current_active_slot(self.clock.time_of_day()) else {
            debug!("No slot window open");
            return Ok(0);
        };

        if self.reminded.read().await.contains(&(slot.id, today)) {
            return Ok(0);
        }

        let users: Vec<_> = UserQueries::list_with_push_tokens(&self.db)
            .await?
            .into_iter()
            .filter(|user| user.preferred_slots.contains(&slot.id))
            .collect();

        let queued = self
            .notifications
            .notify_users(
                &users,
                "Your ad slot is open",
                &format!("The {} slot is open now. Watch an ad to earn your reward.", slot.label()),
                serde_json::json!({ "slot_id": slot.id }),
            )
            .await?;

        let mut reminded = self.reminded.write().await;
        reminded.retain(|(_, date)| *date == today);
        reminded.insert((slot.id, today));

        info!("Slot {} reminders queued for {} users", slot.id, queued);
        Ok(queued)
    }

    pub fn start(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval_timer = interval(Duration::from_secs(60));
            loop {
                interval_timer.tick().await;

                if let Err(e) = self.check_and_notify().await {
                    warn!("Slot reminder check failed: {}", e);
                }
            }
        })
    }
}
