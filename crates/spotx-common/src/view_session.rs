//! Countdown state machine for a single ad view.
//!
//! `Idle -> Watching -> TimerExpired -> CloseRequested -> RewardShown -> Closed`
//!
//! A close request while the countdown is still running is remembered and only
//! acted on when the counter reaches zero, so completion always follows a full
//! countdown.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::rewards::{DISMISS_AFTER_SECS, VIEW_DURATION_SECS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Watching,
    TimerExpired,
    CloseRequested,
    RewardShown,
    Closed,
}

/// What the caller has to do after driving the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    None,
    /// Close was requested early and is held until the countdown ends
    Deferred,
    TimerExpired,
    /// Record the view and grant the reward. Emitted at most once per session.
    CompletionDue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewSession {
    state: SessionState,
    duration_secs: u32,
    dismiss_after_secs: u32,
    remaining_secs: u32,
    close_requested: bool,
    completion_emitted: bool,
}

impl Default for ViewSession {
    fn default() -> Self {
        Self::new(VIEW_DURATION_SECS, DISMISS_AFTER_SECS)
    }
}

impl ViewSession {
    pub fn new(duration_secs: u32, dismiss_after_secs: u32) -> Self {
        Self {
            state: SessionState::Idle,
            duration_secs,
            dismiss_after_secs: dismiss_after_secs.min(duration_secs),
            remaining_secs: duration_secs,
            close_requested: false,
            completion_emitted: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn remaining_secs(&self) -> u32 {
        self.remaining_secs
    }

    pub fn elapsed_secs(&self) -> u32 {
        self.duration_secs - self.remaining_secs
    }

    pub fn duration_secs(&self) -> u32 {
        self.duration_secs
    }

    pub fn close_requested(&self) -> bool {
        self.close_requested
    }

    /// Whether the dismiss affordance should be shown
    pub fn can_dismiss(&self) -> bool {
        match self.state {
            SessionState::Watching => self.elapsed_secs() >= self.dismiss_after_secs,
            SessionState::TimerExpired => true,
            _ => false,
        }
    }

    pub fn start(&mut self) -> Result<()> {
        if self.state != SessionState::Idle {
            return Err(self.invalid("start"));
        }
        self.state = SessionState::Watching;
        if self.duration_secs == 0 {
            self.state = SessionState::TimerExpired;
        }
        Ok(())
    }

    /// Advance the countdown by one second
    pub fn tick(&mut self) -> Transition {
        if self.state != SessionState::Watching {
            return Transition::None;
        }

        self.remaining_secs = self.remaining_secs.saturating_sub(1);
        if self.remaining_secs > 0 {
            return Transition::None;
        }

        if self.close_requested {
            self.enter_close_requested()
        } else {
            self.state = SessionState::TimerExpired;
            Transition::TimerExpired
        }
    }

    pub fn request_close(&mut self) -> Result<Transition> {
        match self.state {
            SessionState::Idle => Err(self.invalid("close")),
            SessionState::Watching => {
                self.close_requested = true;
                Ok(Transition::Deferred)
            }
            SessionState::TimerExpired => {
                self.close_requested = true;
                Ok(self.enter_close_requested())
            }
            SessionState::CloseRequested | SessionState::RewardShown | SessionState::Closed => {
                Ok(Transition::None)
            }
        }
    }

    pub fn mark_reward_shown(&mut self) -> Result<()> {
        if self.state != SessionState::CloseRequested {
            return Err(self.invalid("show reward"));
        }
        self.state = SessionState::RewardShown;
        Ok(())
    }

    pub fn acknowledge(&mut self) -> Result<()> {
        if self.state != SessionState::RewardShown {
            return Err(self.invalid("acknowledge"));
        }
        self.state = SessionState::Closed;
        Ok(())
    }

    /// Recording the completion failed. Return to `TimerExpired` so the next close
    /// emits `CompletionDue` again.
    pub fn completion_failed(&mut self) -> Result<()> {
        if self.state != SessionState::CloseRequested {
            return Err(self.invalid("retry completion of"));
        }
        self.state = SessionState::TimerExpired;
        self.close_requested = false;
        self.completion_emitted = false;
        Ok(())
    }

    /// Tear the session down without completing it
    pub fn abort(&mut self) {
        self.state = SessionState::Closed;
    }

    fn enter_close_requested(&mut self) -> Transition {
        self.state = SessionState::CloseRequested;
        if self.completion_emitted {
            return Transition::None;
        }
        self.completion_emitted = true;
        Transition::CompletionDue
    }

    fn invalid(&self, action: &str) -> Error {
        Error::InvalidState(format!("cannot {} a session in state {:?}", action, self.state))
    }
}
