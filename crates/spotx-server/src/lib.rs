pub mod ad_selector;
pub mod admin;
pub mod api;
pub mod app;
pub mod campaign_service;
pub mod clock;
pub mod completion_recorder;
pub mod config;
pub mod daily_status_store;
pub mod error;
pub mod local_store;
pub mod notification_manager;
pub mod reward_service;
pub mod server;
pub mod session_manager;
pub mod slot_reminder_task;
pub mod user_service;

pub use app::AppState;
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::ServerConfig;
pub use error::{Result, ServiceError};
