mod common;

use std::time::Duration;

use hyper::{Method, StatusCode};
use serde_json::json;
use spotx_common::{Error as DomainError, SessionState};
use spotx_db::queries::{CampaignQueries, CampaignStatsQueries, RewardQueries};
use spotx_server::api::{dispatch, ApiRequest};
use spotx_server::completion_recorder::Persistence;
use spotx_server::{Clock, FixedClock, ServiceError};

use common::{day, seed_campaign, seed_user, test_app, test_app_with};

#[tokio::test]
async fn test_no_active_slot_sends_user_back() {
    let app = test_app().await;
    let user = seed_user(&app, &["food"]).await;
    seed_campaign(&app, 10_000, 250).await;
    app.clock.set(FixedClock::at(day(), 6, 30).now());

    let err = app.state.sessions.start(&user).await.unwrap_err();
    assert!(matches!(err, ServiceError::Domain(DomainError::NoActiveSlot)));

    let response = dispatch(
        &app.state,
        ApiRequest::new(Method::POST, "/api/sessions").with_json(&json!({ "user_id": user.id })),
    )
    .await;
    assert_eq!(response.status, StatusCode::CONFLICT);
    assert_eq!(response.body["error"], "No active time window");
    assert_eq!(response.body["back_after_ms"], 2000);
}

#[tokio::test]
async fn test_full_watch_then_close_grants_reward() {
    let app = test_app().await;
    let user = seed_user(&app, &["food"]).await;
    let campaign = seed_campaign(&app, 10_000, 250).await;

    let started = app.state.sessions.start(&user).await.unwrap();
    tokio::time::pause();

    assert_eq!(started.state, SessionState::Watching);
    assert_eq!(started.slot_id, 1);
    assert_eq!(started.remaining_secs, 5);
    assert!(!started.can_dismiss);

    tokio::time::sleep(Duration::from_millis(5_500)).await;

    let expired = app.state.sessions.snapshot(started.id).await.unwrap();
    assert_eq!(expired.state, SessionState::TimerExpired);
    assert_eq!(expired.remaining_secs, 0);
    assert!(expired.can_dismiss);
    assert!(expired.receipt.is_none());

    let shown = app.state.sessions.close(started.id).await.unwrap();
    assert_eq!(shown.state, SessionState::RewardShown);

    let receipt = shown.receipt.unwrap();
    assert_eq!(receipt.persistence, Persistence::Recorded { campaign_completed: false });
    assert_eq!(receipt.reward.amount_cents, 100);
    assert!(receipt.view.verified);
    assert_eq!(receipt.view.duration_seconds, 5);
    assert!(receipt.daily_status.is_completed(1));

    let rewards = RewardQueries::list_for_user(&app.db, &user.id.to_string()).await.unwrap();
    assert_eq!(rewards.len(), 1);
    assert_eq!(rewards[0].ad_view_id, receipt.view.id);

    let campaign = CampaignQueries::get_by_id(&app.db, &campaign.id.to_string()).await.unwrap();
    assert_eq!(campaign.spent_cents, 250);

    let stats = CampaignStatsQueries::get_for_date(&app.db, &campaign.id.to_string(), day())
        .await
        .unwrap()
        .unwrap();
    assert_eq!((stats.views, stats.verified_views, stats.spend_cents), (1, 1, 250));

    let closed = app.state.sessions.acknowledge(started.id).await.unwrap();
    assert_eq!(closed.state, SessionState::Closed);
    assert!(matches!(
        app.state.sessions.snapshot(started.id).await,
        Err(ServiceError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_early_close_waits_for_countdown() {
    let app = test_app().await;
    let user = seed_user(&app, &[]).await;
    seed_campaign(&app, 10_000, 250).await;

    let opened_at = tokio::time::Instant::now();
    let started = app.state.sessions.start(&user).await.unwrap();
    let mut state = app.state.sessions.subscribe(started.id).await.unwrap();
    tokio::time::pause();

    tokio::time::sleep(Duration::from_millis(2_500)).await;

    let deferred = app.state.sessions.close(started.id).await.unwrap();
    assert_eq!(deferred.state, SessionState::Watching);
    assert!(deferred.close_requested);
    assert_eq!(deferred.remaining_secs, 3);
    assert!(deferred.receipt.is_none());

    state.wait_for(|s| *s == SessionState::RewardShown).await.unwrap();
    assert!(opened_at.elapsed() >= Duration::from_secs(5));

    let shown = app.state.sessions.snapshot(started.id).await.unwrap();
    let receipt = shown.receipt.unwrap();
    assert_eq!(receipt.view.duration_seconds, 5);
    assert!(receipt.view.verified);

    let rewards = RewardQueries::list_for_user(&app.db, &user.id.to_string()).await.unwrap();
    assert_eq!(rewards.len(), 1);

    // A second close after completion changes nothing
    let again = app.state.sessions.close(started.id).await.unwrap();
    assert_eq!(again.state, SessionState::RewardShown);
    let rewards = RewardQueries::list_for_user(&app.db, &user.id.to_string()).await.unwrap();
    assert_eq!(rewards.len(), 1);
}

#[tokio::test]
async fn test_acknowledge_before_reward_is_rejected() {
    let app = test_app().await;
    let user = seed_user(&app, &["food"]).await;
    seed_campaign(&app, 10_000, 250).await;

    let started = app.state.sessions.start(&user).await.unwrap();
    let err = app.state.sessions.acknowledge(started.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::Domain(DomainError::InvalidState(_))));

    app.state.sessions.cancel(started.id).await.unwrap();
    assert_eq!(app.state.sessions.active_count().await, 0);
}

#[tokio::test]
async fn test_no_matching_campaign_is_not_found() {
    let app = test_app().await;
    let user = seed_user(&app, &["cars"]).await;
    seed_campaign(&app, 10_000, 250).await;

    let err = app.state.sessions.start(&user).await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn test_rejected_completion_leaves_session_recoverable() {
    let app = test_app_with(|config| config.policy.enforce_single_view_per_slot = true).await;
    let user = seed_user(&app, &["food"]).await;
    seed_campaign(&app, 10_000, 250).await;

    let first = app.state.sessions.start(&user).await.unwrap();
    let second = app.state.sessions.start(&user).await.unwrap();
    tokio::time::pause();

    tokio::time::sleep(Duration::from_millis(5_500)).await;

    let shown = app.state.sessions.close(first.id).await.unwrap();
    assert_eq!(shown.state, SessionState::RewardShown);

    let err = app.state.sessions.close(second.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::Domain(DomainError::SlotAlreadyCompleted(1))));

    let failed = app.state.sessions.snapshot(second.id).await.unwrap();
    assert_eq!(failed.state, SessionState::TimerExpired);
    assert!(failed.receipt.is_none());
    assert!(failed.last_error.unwrap().contains("already completed"));

    // Closing again runs the completion again instead of silently doing nothing
    let err = app.state.sessions.close(second.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::Domain(DomainError::SlotAlreadyCompleted(1))));

    app.state.sessions.cancel(second.id).await.unwrap();
    assert_eq!(app.state.sessions.active_count().await, 1);
}

#[tokio::test]
async fn test_abandoned_sessions_are_dropped() {
    let app = test_app().await;
    let user = seed_user(&app, &["food"]).await;
    seed_campaign(&app, 10_000, 250).await;

    let mut abandoned = Vec::new();
    for _ in 0..3 {
        abandoned.push(app.state.sessions.start(&user).await.unwrap());
    }
    let mut state = app.state.sessions.subscribe(abandoned[0].id).await.unwrap();
    tokio::time::pause();

    // Still inside the idle timeout once the countdowns end
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(app.state.sessions.reap_idle().await, 0);
    assert_eq!(app.state.sessions.active_count().await, 3);

    tokio::time::sleep(Duration::from_secs(3_600)).await;
    tokio::time::resume();

    // Starting a new session sweeps the stale ones
    let fresh = app.state.sessions.start(&user).await.unwrap();
    assert_eq!(app.state.sessions.active_count().await, 1);
    assert_eq!(*state.borrow_and_update(), SessionState::Closed);
    for session in &abandoned {
        assert!(matches!(
            app.state.sessions.snapshot(session.id).await,
            Err(ServiceError::NotFound(_))
        ));
    }
    assert!(app.state.sessions.snapshot(fresh.id).await.is_ok());
}

#[tokio::test]
async fn test_watching_session_is_never_reaped() {
    let app = test_app_with(|config| {
        config.view.duration_secs = 120;
        config.view.idle_session_timeout_secs = 150;
    })
    .await;
    let user = seed_user(&app, &["food"]).await;
    seed_campaign(&app, 10_000, 250).await;

    let started = app.state.sessions.start(&user).await.unwrap();
    tokio::time::pause();

    tokio::time::sleep(Duration::from_secs(100)).await;
    assert_eq!(app.state.sessions.reap_idle().await, 0);
    let watching = app.state.sessions.snapshot(started.id).await.unwrap();
    assert_eq!(watching.state, SessionState::Watching);

    tokio::time::sleep(Duration::from_secs(200)).await;
    assert_eq!(app.state.sessions.reap_idle().await, 1);
}
