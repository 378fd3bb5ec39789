use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use spotx_common::slot_calendar::current_active_slot;
use spotx_common::types::{Campaign, User};
use spotx_common::{Error as DomainError, SessionState, Transition, ViewSession};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::ad_selector::AdSelector;
use crate::clock::Clock;
use crate::completion_recorder::{CompletionReceipt, CompletionRecorder, CompletionRequest};
use crate::config::ViewConfig;
use crate::error::{Result, ServiceError};

const TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub id: Uuid,
    pub user_id: Uuid,
    pub slot_id: u8,
    pub campaign: Campaign,
    pub state: SessionState,
    pub remaining_secs: u32,
    pub can_dismiss: bool,
    pub close_requested: bool,
    pub receipt: Option<CompletionReceipt>,
    /// Why the last completion attempt failed; closing again retries it
    pub last_error: Option<String>,
}

struct SessionEntry {
    user_id: Uuid,
    slot_id: u8,
    campaign: Campaign,
    view: ViewSession,
    receipt: Option<CompletionReceipt>,
    last_error: Option<String>,
    last_activity: Instant,
    state_tx: watch::Sender<SessionState>,
    ticker: Option<JoinHandle<()>>,
}

impl SessionEntry {
    fn snapshot(&self, id: Uuid) -> SessionSnapshot {
        SessionSnapshot {
            id,
            user_id: self.user_id,
            slot_id: self.slot_id,
            campaign: self.campaign.clone(),
            state: self.view.state(),
            remaining_secs: self.view.remaining_secs(),
            can_dismiss: self.view.can_dismiss(),
            close_requested: self.view.close_requested(),
            receipt: self.receipt.clone(),
            last_error: self.last_error.clone(),
        }
    }

    fn publish(&mut self) {
        self.last_activity = Instant::now();
        self.state_tx.send_replace(self.view.state());
    }

    /// The countdown and an in-flight completion keep a session alive
    fn is_idle_since(&self, cutoff: Instant) -> bool {
        !matches!(self.view.state(), SessionState::Watching | SessionState::CloseRequested)
            && self.last_activity <= cutoff
    }

    fn shut_down(mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
        if self.view.state() != SessionState::Closed {
            self.view.abort();
            self.state_tx.send_replace(SessionState::Closed);
        }
    }
}

struct Inner {
    sessions: Mutex<HashMap<Uuid, SessionEntry>>,
    selector: Arc<AdSelector>,
    recorder: Arc<CompletionRecorder>,
    clock: Arc<dyn Clock>,
    view: ViewConfig,
}

/// Hosts ad-view sessions. Each watching session owns a one-second ticker task
/// that drives its countdown. Sessions idle past `idle_session_timeout_secs` are
/// dropped whenever a new session starts.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

fn not_found(id: Uuid) -> ServiceError {
    ServiceError::NotFound(format!("Session {} not found", id))
}

impl SessionManager {
    pub fn new(
        selector: Arc<AdSelector>,
        recorder: Arc<CompletionRecorder>,
        clock: Arc<dyn Clock>,
        view: ViewConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                sessions: Mutex::new(HashMap::new()),
                selector,
                recorder,
                clock,
                view,
            }),
        }
    }

    /// Open a session for the slot active right now and start its countdown
    pub async fn start(&self, user: &User) -> Result<SessionSnapshot> {
        let slot =
            current_active_slot(self.inner.clock.time_of_day()).ok_or(DomainError::NoActiveSlot)?;

        self.inner.recorder.check_slot_available(user.id, slot.id).await?;

        let campaign = self
            .inner
            .selector
            .get_ad_for_slot(user, slot.id)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("No ad available for slot {}", slot.id))
            })?;

        let mut view =
            ViewSession::new(self.inner.view.duration_secs, self.inner.view.dismiss_after_secs);
        view.start()?;

        let id = Uuid::new_v4();
        let (state_tx, _) = watch::channel(view.state());
        let watching = view.state() == SessionState::Watching;

        let mut sessions = self.inner.sessions.lock().await;
        self.reap_locked(&mut sessions);
        let entry = SessionEntry {
            user_id: user.id,
            slot_id: slot.id,
            campaign,
            view,
            receipt: None,
            last_error: None,
            last_activity: Instant::now(),
            state_tx,
            ticker: watching.then(|| self.spawn_ticker(id)),
        };
        let snapshot = entry.snapshot(id);
        sessions.insert(id, entry);
        drop(sessions);

        info!(
            "Session {} started for user {} on slot {} with campaign {}",
            id, user.id, slot.id, snapshot.campaign.id
        );
        Ok(snapshot)
    }

    fn spawn_ticker(&self, id: Uuid) -> JoinHandle<()> {
        let manager = self.clone();
        tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + TICK, TICK);
            loop {
                interval.tick().await;

                let Some((transition, watching)) = manager.tick(id).await else {
                    break;
                };

                if transition == Transition::CompletionDue {
                    if let Err(e) = manager.complete(id).await {
                        error!("Completing session {} failed: {}", id, e);
                    }
                    break;
                }
                if !watching {
                    break;
                }
            }
            debug!("Ticker for session {} stopped", id);
        })
    }

    async fn tick(&self, id: Uuid) -> Option<(Transition, bool)> {
        let mut sessions = self.inner.sessions.lock().await;
        let entry = sessions.get_mut(&id)?;

        let transition = entry.view.tick();
        entry.publish();
        if transition != Transition::None {
            debug!("Session {} tick: {:?}", id, transition);
        }
        Some((transition, entry.view.state() == SessionState::Watching))
    }

    async fn complete(&self, id: Uuid) -> Result<SessionSnapshot> {
        let request = {
            let sessions = self.inner.sessions.lock().await;
            let entry = sessions.get(&id).ok_or_else(|| not_found(id))?;
            CompletionRequest {
                user_id: entry.user_id,
                campaign: entry.campaign.clone(),
                slot_id: entry.slot_id,
                watched_secs: entry.view.elapsed_secs(),
            }
        };

        let recorded = self.inner.recorder.record(request).await;

        let mut sessions = self.inner.sessions.lock().await;
        let entry = sessions.get_mut(&id).ok_or_else(|| not_found(id))?;
        let receipt = match recorded {
            Ok(receipt) => receipt,
            Err(e) => {
                warn!("Session {} could not be completed: {}", id, e);
                entry.view.completion_failed()?;
                entry.last_error = Some(e.to_string());
                entry.publish();
                return Err(e);
            }
        };
        entry.receipt = Some(receipt);
        entry.last_error = None;
        entry.view.mark_reward_shown()?;
        entry.publish();

        info!("Session {} completed, reward shown", id);
        Ok(entry.snapshot(id))
    }

    /// Request close. While the countdown runs this is only remembered.
    pub async fn close(&self, id: Uuid) -> Result<SessionSnapshot> {
        {
            let mut sessions = self.inner.sessions.lock().await;
            let entry = sessions.get_mut(&id).ok_or_else(|| not_found(id))?;
            let transition = entry.view.request_close()?;
            entry.publish();

            if transition == Transition::Deferred {
                debug!("Session {} close deferred with {}s left", id, entry.view.remaining_secs());
            }
            if transition != Transition::CompletionDue {
                return Ok(entry.snapshot(id));
            }
        }

        self.complete(id).await
    }

    /// Reward acknowledged: close the session and drop it
    pub async fn acknowledge(&self, id: Uuid) -> Result<SessionSnapshot> {
        let mut sessions = self.inner.sessions.lock().await;
        let entry = sessions.get_mut(&id).ok_or_else(|| not_found(id))?;
        entry.view.acknowledge()?;
        entry.publish();
        let snapshot = entry.snapshot(id);

        if let Some(entry) = sessions.remove(&id) {
            entry.shut_down();
        }
        debug!("Session {} closed", id);
        Ok(snapshot)
    }

    /// Tear a session down without completing it
    pub async fn cancel(&self, id: Uuid) -> Result<()> {
        let mut sessions = self.inner.sessions.lock().await;
        sessions.remove(&id).ok_or_else(|| not_found(id))?.shut_down();
        info!("Session {} cancelled", id);
        Ok(())
    }

    pub async fn snapshot(&self, id: Uuid) -> Result<SessionSnapshot> {
        let sessions = self.inner.sessions.lock().await;
        sessions.get(&id).map(|entry| entry.snapshot(id)).ok_or_else(|| not_found(id))
    }

    /// Follow state changes of one session
    pub async fn subscribe(&self, id: Uuid) -> Result<watch::Receiver<SessionState>> {
        let sessions = self.inner.sessions.lock().await;
        sessions.get(&id).map(|entry| entry.state_tx.subscribe()).ok_or_else(|| not_found(id))
    }

    /// Drop sessions nobody has touched within the idle timeout. Returns how many.
    pub async fn reap_idle(&self) -> usize {
        let mut sessions = self.inner.sessions.lock().await;
        self.reap_locked(&mut sessions)
    }

    fn reap_locked(&self, sessions: &mut HashMap<Uuid, SessionEntry>) -> usize {
        let timeout = Duration::from_secs(self.inner.view.idle_session_timeout_secs);
        let Some(cutoff) = Instant::now().checked_sub(timeout) else {
            return 0;
        };

        let idle: Vec<Uuid> =
            sessions.iter().filter(|(_, e)| e.is_idle_since(cutoff)).map(|(id, _)| *id).collect();
        for id in &idle {
            if let Some(entry) = sessions.remove(id) {
                debug!("Dropping idle session {} in state {:?}", id, entry.view.state());
                entry.shut_down();
            }
        }
        if !idle.is_empty() {
            info!("Dropped {} idle sessions", idle.len());
        }
        idle.len()
    }

    pub async fn active_count(&self) -> usize {
        self.inner.sessions.lock().await.len()
    }
}
