#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDate;
use spotx_common::security::hash_token;
use spotx_common::types::{
    Campaign, CampaignInput, CampaignStatus, MerchantStatus, NewMerchantRequest, NewUserRequest,
    User,
};
use spotx_db::Database;
use spotx_server::local_store::MemoryStore;
use spotx_server::{AppState, FixedClock, ServerConfig};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tempfile::{tempdir, TempDir};
use uuid::Uuid;

pub const ADMIN_TOKEN: &str = "test-admin-token";

pub struct TestApp {
    pub state: Arc<AppState>,
    pub clock: Arc<FixedClock>,
    pub db: Arc<Database>,
    pub store: Arc<MemoryStore>,
    _dir: TempDir,
}

/// A Thursday
pub fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 22).unwrap()
}

/// Single long-lived connection with no reaper and no pre-acquire ping, so the
/// pool never waits on a timer while tokio time is paused.
async fn test_database(dir: &Path) -> Database {
    let options = SqliteConnectOptions::new()
        .filename(dir.join("spotx.db"))
        .create_if_missing(true)
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .test_before_acquire(false)
        .connect_with(options)
        .await
        .unwrap();

    let db = Database::from_pool(pool);
    db.run_migrations().await.unwrap();
    db
}

pub async fn test_app_with(configure: impl FnOnce(&mut ServerConfig)) -> TestApp {
    let dir = tempdir().unwrap();

    let mut config = ServerConfig::default();
    config.database.path = dir.path().join("spotx.db").to_string_lossy().to_string();
    config.storage.local_store_dir = dir.path().join("local").to_string_lossy().to_string();
    config.auth.admin_token_hash = Some(hash_token(ADMIN_TOKEN));
    configure(&mut config);

    let db = Arc::new(test_database(dir.path()).await);
    let clock = Arc::new(FixedClock::at(day(), 9, 0));
    let store = Arc::new(MemoryStore::new());
    let state = AppState::new(config, db.clone(), store.clone(), clock.clone()).unwrap();

    TestApp { state: Arc::new(state), clock, db, store, _dir: dir }
}

pub async fn test_app() -> TestApp {
    test_app_with(|_| {}).await
}

pub async fn seed_user(app: &TestApp, interests: &[&str]) -> User {
    app.state
        .users
        .register(NewUserRequest {
            name: "Viewer".to_string(),
            email: format!("{}@viewer.example", Uuid::new_v4()),
            interests: interests.iter().map(|i| i.to_string()).collect(),
            push_token: None,
        })
        .await
        .unwrap()
}

/// Approved merchant with one active campaign
pub async fn seed_campaign(app: &TestApp, budget_cents: i64, price_cents: i64) -> Campaign {
    let merchant = app
        .state
        .campaigns
        .register_merchant(NewMerchantRequest {
            business_name: "Corner Cafe".to_string(),
            contact_email: format!("{}@cafe.example", Uuid::new_v4()),
        })
        .await
        .unwrap();
    app.state.campaigns.set_merchant_status(merchant.id, MerchantStatus::Approved).await.unwrap();

    let campaign = app
        .state
        .campaigns
        .create_campaign(
            merchant.id,
            CampaignInput {
                name: "Morning latte".to_string(),
                description: Some("Two for one before noon".to_string()),
                media_url: None,
                budget_cents,
                reward_per_view_cents: price_cents,
                duration_seconds: 5,
                target_interests: vec!["food".to_string()],
            },
        )
        .await
        .unwrap();
    app.state.campaigns.set_campaign_status(campaign.id, CampaignStatus::Active).await.unwrap()
}
