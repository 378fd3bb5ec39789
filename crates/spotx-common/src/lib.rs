pub mod config;
pub mod daily_status;
pub mod error;
pub mod rewards;
pub mod security;
pub mod slot_calendar;
pub mod types;
pub mod view_session;

pub use daily_status::effective_status;
pub use error::{Error, Result};
pub use slot_calendar::{current_active_slot, is_within_slot_window, next_slot, SLOTS};
pub use types::*;
pub use view_session::{SessionState, Transition, ViewSession};
