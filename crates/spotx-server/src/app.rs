use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use spotx_db::{migrations, Database, DatabaseConfig};
use tracing::info;

use crate::ad_selector::AdSelector;
use crate::admin::AdminService;
use crate::campaign_service::CampaignService;
use crate::clock::Clock;
use crate::completion_recorder::CompletionRecorder;
use crate::config::ServerConfig;
use crate::daily_status_store::DailyStatusStore;
use crate::local_store::LocalStore;
use crate::notification_manager::NotificationManager;
use crate::reward_service::RewardService;
use crate::session_manager::SessionManager;
use crate::slot_reminder_task::SlotReminderTask;
use crate::user_service::UserService;

/// Every service, constructed once at startup and shared by reference
pub struct AppState {
    pub config: ServerConfig,
    pub db: Arc<Database>,
    pub clock: Arc<dyn Clock>,
    pub users: UserService,
    pub campaigns: CampaignService,
    pub selector: Arc<AdSelector>,
    pub daily_status: Arc<DailyStatusStore>,
    pub recorder: Arc<CompletionRecorder>,
    pub rewards: RewardService,
    pub sessions: SessionManager,
    pub notifications: Arc<NotificationManager>,
    pub admin: AdminService,
}

impl AppState {
    pub fn new(
        config: ServerConfig,
        db: Arc<Database>,
        store: Arc<dyn LocalStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let selector = Arc::new(AdSelector::new(
            db.clone(),
            Duration::from_secs(config.view.ad_load_timeout_secs),
        ));
        let daily_status = Arc::new(DailyStatusStore::new(store.clone()));
        let recorder = Arc::new(CompletionRecorder::new(
            db.clone(),
            store,
            daily_status.clone(),
            clock.clone(),
            config.rewards,
            config.policy.enforce_single_view_per_slot,
        ));
        let sessions = SessionManager::new(
            selector.clone(),
            recorder.clone(),
            clock.clone(),
            config.view.clone(),
        );
        let notifications = Arc::new(
            NotificationManager::new(db.clone(), config.push.clone())
                .context("Failed to start notification manager")?,
        );
        let admin =
            AdminService::new(db.clone(), clock.clone(), recorder.clone(), sessions.clone());

        Ok(Self {
            users: UserService::new(db.clone()),
            campaigns: CampaignService::new(db.clone()),
            rewards: RewardService::new(db.clone(), clock.clone()),
            config,
            db,
            clock,
            selector,
            daily_status,
            recorder,
            sessions,
            notifications,
            admin,
        })
    }

    pub fn slot_reminders(&self) -> SlotReminderTask {
        SlotReminderTask::new(self.db.clone(), self.notifications.clone(), self.clock.clone())
    }
}

pub async fn initialize_database(config: &ServerConfig) -> Result<Database> {
    info!("Initializing database");

    if let Some(parent) = Path::new(&config.database.path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create database directory: {:?}", parent))?;
        }
    }

    migrations::create_database_if_not_exists(&config.database.path)
        .await
        .context("Failed to create database")?;

    let database_config = DatabaseConfig {
        path: config.database.path.clone(),
        max_connections: config.database.max_connections,
        busy_timeout: Duration::from_millis(config.database.busy_timeout_ms),
    };
    let database = Database::new(database_config).await.context("Failed to connect to database")?;

    migrations::run_migrations(database.pool()?).await.context("Failed to run migrations")?;
    database.verify_migrations().await.context("Database schema is out of date")?;

    info!("Database initialized successfully");
    Ok(database)
}
