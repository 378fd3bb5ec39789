use chrono::{NaiveDate, Utc};
use spotx_common::types::{
    AdView, CampaignInput, CampaignStatus, MerchantStatus, NewMerchantRequest, NewUserRequest,
    PayoutStatus, Reward,
};
use spotx_db::queries::{
    AdViewQueries, CampaignQueries, CampaignStatsQueries, CompletionQueries, MerchantQueries,
    PayoutQueries, RewardQueries, UserQueries,
};
use spotx_db::{
    CompletionOutcome, CompletionRecord, Database, DatabaseConfig, DbError, NewCampaign,
    NewMerchant, NewUser, PayoutRequest,
};
use tempfile::{tempdir, TempDir};
use uuid::Uuid;

async fn setup() -> (TempDir, Database) {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("spotx.db");
    let config =
        DatabaseConfig { path: db_path.to_str().unwrap().to_string(), ..Default::default() };
    let db = Database::new(config).await.unwrap();
    db.run_migrations().await.unwrap();
    (dir, db)
}

async fn seed_user(db: &Database, email: &str) -> spotx_common::types::User {
    UserQueries::create(
        db,
        NewUser::from_request(NewUserRequest {
            name: "Viewer".to_string(),
            email: email.to_string(),
            interests: vec!["food".to_string()],
            push_token: None,
        }),
    )
    .await
    .unwrap()
}

async fn seed_campaign(db: &Database, budget: i64, price: i64) -> spotx_common::types::Campaign {
    let merchant = MerchantQueries::create(
        db,
        NewMerchant::from_request(NewMerchantRequest {
            business_name: "Corner Cafe".to_string(),
            contact_email: format!("{}@cafe.example", Uuid::new_v4()),
        }),
    )
    .await
    .unwrap();

    let campaign = CampaignQueries::create(
        db,
        NewCampaign::new(
            merchant.id,
            CampaignInput {
                name: "Morning latte".to_string(),
                description: None,
                media_url: None,
                budget_cents: budget,
                reward_per_view_cents: price,
                duration_seconds: 5,
                target_interests: vec!["food".to_string()],
            },
        ),
    )
    .await
    .unwrap();
    CampaignQueries::update_status(db, &campaign.id.to_string(), CampaignStatus::Active)
        .await
        .unwrap();
    CampaignQueries::get_by_id(db, &campaign.id.to_string()).await.unwrap()
}

fn completion(
    user_id: Uuid,
    campaign_id: Uuid,
    verified: bool,
    spend: Option<i64>,
) -> CompletionRecord {
    let now = Utc::now();
    let view = AdView {
        id: Uuid::new_v4(),
        user_id,
        campaign_id,
        slot_id: 2,
        watched_at: now,
        duration_seconds: if verified { 5 } else { 3 },
        reward_earned_cents: 100,
        verified,
    };
    let reward = Reward {
        id: Uuid::new_v4(),
        user_id,
        amount_cents: 100,
        ad_view_id: view.id,
        created_at: now,
    };
    CompletionRecord {
        view,
        reward,
        campaign_spend_cents: spend,
        stats_date: NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
    }
}

#[tokio::test]
async fn test_duplicate_user_email_is_rejected() {
    let (_dir, db) = setup().await;
    seed_user(&db, "a@example.com").await;

    let err = UserQueries::create(
        &db,
        NewUser::from_request(NewUserRequest {
            name: "Other".to_string(),
            email: "A@example.com".to_string(),
            interests: vec![],
            push_token: None,
        }),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, DbError::Duplicate(_)));
}

#[tokio::test]
async fn test_user_preferences_and_push_tokens() {
    let (_dir, db) = setup().await;
    let user = seed_user(&db, "b@example.com").await;
    let id = user.id.to_string();

    assert!(UserQueries::list_with_push_tokens(&db).await.unwrap().is_empty());

    UserQueries::update_push_token(&db, &id, Some("ExponentPushToken[abc]")).await.unwrap();
    UserQueries::update_preferred_slots(&db, &id, &[1, 4]).await.unwrap();

    let stored = UserQueries::get_by_id(&db, &id).await.unwrap();
    assert_eq!(stored.preferred_slots, vec![1, 4]);
    assert_eq!(UserQueries::list_with_push_tokens(&db).await.unwrap().len(), 1);

    let missing = UserQueries::update_preferred_slots(&db, "nope", &[1]).await;
    assert!(matches!(missing, Err(DbError::NotFound(_))));
}

#[tokio::test]
async fn test_merchant_status_update() {
    let (_dir, db) = setup().await;
    let merchant = MerchantQueries::create(
        &db,
        NewMerchant::from_request(NewMerchantRequest {
            business_name: "Shop".to_string(),
            contact_email: "shop@example.com".to_string(),
        }),
    )
    .await
    .unwrap();
    assert_eq!(merchant.status, MerchantStatus::Pending);

    MerchantQueries::update_status(&db, &merchant.id.to_string(), MerchantStatus::Approved)
        .await
        .unwrap();
    assert_eq!(MerchantQueries::count_by_status(&db, MerchantStatus::Approved).await.unwrap(), 1);
}

#[tokio::test]
async fn test_only_draft_campaigns_can_be_deleted() {
    let (_dir, db) = setup().await;
    let active = seed_campaign(&db, 10_000, 250).await;

    let err = CampaignQueries::delete_draft(&db, &active.id.to_string()).await.unwrap_err();
    assert!(matches!(err, DbError::InvalidData(_)));

    CampaignQueries::update_status(&db, &active.id.to_string(), CampaignStatus::Draft)
        .await
        .unwrap();
    CampaignQueries::delete_draft(&db, &active.id.to_string()).await.unwrap();
    assert!(matches!(
        CampaignQueries::get_by_id(&db, &active.id.to_string()).await,
        Err(DbError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_verified_completion_writes_everything() {
    let (_dir, db) = setup().await;
    let user = seed_user(&db, "c@example.com").await;
    let campaign = seed_campaign(&db, 10_000, 250).await;

    let record = completion(user.id, campaign.id, true, Some(campaign.reward_per_view_cents));
    let outcome = CompletionQueries::record(&db, &record).await.unwrap();
    assert_eq!(outcome, CompletionOutcome::Recorded { campaign_completed: false });

    let view = AdViewQueries::get_by_id(&db, &record.view.id.to_string()).await.unwrap();
    assert!(view.verified);

    let stored = CampaignQueries::get_by_id(&db, &campaign.id.to_string()).await.unwrap();
    assert_eq!(stored.spent_cents, 250);

    let stats = CampaignStatsQueries::get_for_date(&db, &campaign.id.to_string(), record.stats_date)
        .await
        .unwrap()
        .unwrap();
    assert_eq!((stats.views, stats.verified_views, stats.spend_cents), (1, 1, 250));

    let reward = RewardQueries::get_for_view(&db, &record.view.id.to_string()).await.unwrap();
    assert_eq!(reward.map(|r| r.amount_cents), Some(100));
}

#[tokio::test]
async fn test_unverified_completion_does_not_charge_merchant() {
    let (_dir, db) = setup().await;
    let user = seed_user(&db, "d@example.com").await;
    let campaign = seed_campaign(&db, 10_000, 250).await;

    let record = completion(user.id, campaign.id, false, None);
    CompletionQueries::record(&db, &record).await.unwrap();

    let stored = CampaignQueries::get_by_id(&db, &campaign.id.to_string()).await.unwrap();
    assert_eq!(stored.spent_cents, 0);

    let stats = CampaignStatsQueries::get_for_date(&db, &campaign.id.to_string(), record.stats_date)
        .await
        .unwrap()
        .unwrap();
    assert_eq!((stats.views, stats.verified_views), (1, 0));
    assert_eq!(RewardQueries::total_for_user(&db, &user.id.to_string()).await.unwrap(), 100);
}

#[tokio::test]
async fn test_replayed_completion_is_idempotent() {
    let (_dir, db) = setup().await;
    let user = seed_user(&db, "e@example.com").await;
    let campaign = seed_campaign(&db, 10_000, 250).await;

    let record = completion(user.id, campaign.id, true, Some(250));
    CompletionQueries::record(&db, &record).await.unwrap();
    let replay = CompletionQueries::record(&db, &record).await.unwrap();

    assert_eq!(replay, CompletionOutcome::AlreadyRecorded);
    let stored = CampaignQueries::get_by_id(&db, &campaign.id.to_string()).await.unwrap();
    assert_eq!(stored.spent_cents, 250);
    assert_eq!(RewardQueries::list_for_user(&db, &user.id.to_string()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_budget_exhaustion_completes_campaign() {
    let (_dir, db) = setup().await;
    let user = seed_user(&db, "f@example.com").await;
    let campaign = seed_campaign(&db, 500, 250).await;

    let first = CompletionQueries::record(&db, &completion(user.id, campaign.id, true, Some(250)))
        .await
        .unwrap();
    assert_eq!(first, CompletionOutcome::Recorded { campaign_completed: false });

    let second = CompletionQueries::record(&db, &completion(user.id, campaign.id, true, Some(250)))
        .await
        .unwrap();
    assert_eq!(second, CompletionOutcome::Recorded { campaign_completed: true });

    let stored = CampaignQueries::get_by_id(&db, &campaign.id.to_string()).await.unwrap();
    assert_eq!(stored.status, CampaignStatus::Completed);
    assert_eq!(stored.spent_cents, 500);
}

#[tokio::test]
async fn test_failed_completion_rolls_back() {
    let (_dir, db) = setup().await;
    let user = seed_user(&db, "g@example.com").await;
    let campaign = seed_campaign(&db, 10_000, 250).await;

    sqlx::query("DROP TABLE rewards").execute(db.pool().unwrap()).await.unwrap();

    let record = completion(user.id, campaign.id, true, Some(250));
    assert!(CompletionQueries::record(&db, &record).await.is_err());

    let stored = CampaignQueries::get_by_id(&db, &campaign.id.to_string()).await.unwrap();
    assert_eq!(stored.spent_cents, 0, "spend must roll back with the failed transaction");
    assert!(matches!(
        AdViewQueries::get_by_id(&db, &record.view.id.to_string()).await,
        Err(DbError::NotFound(_))
    ));
}

async fn earn(db: &Database, user: Uuid, views: usize) {
    let campaign = seed_campaign(db, 10_000, 250).await;
    for _ in 0..views {
        CompletionQueries::record(db, &completion(user, campaign.id, true, Some(250)))
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn test_payout_lifecycle() {
    let (_dir, db) = setup().await;
    let user = seed_user(&db, "h@example.com").await;
    let user_id = user.id.to_string();
    earn(&db, user.id, 3).await;

    let payout = match PayoutQueries::request_within_balance(&db, &user_id, 300).await.unwrap() {
        PayoutRequest::Created(payout) => payout,
        other => panic!("expected a payout, got {:?}", other),
    };
    assert_eq!(payout.status, PayoutStatus::Pending);
    assert_eq!(PayoutQueries::total_for_user(&db, &user_id, PayoutStatus::Paid).await.unwrap(), 0);

    let paid = PayoutQueries::mark_paid(&db, &payout.id.to_string()).await.unwrap();
    assert_eq!(paid.status, PayoutStatus::Paid);
    assert!(paid.paid_at.is_some());
    assert_eq!(
        PayoutQueries::total_for_user(&db, &user_id, PayoutStatus::Paid).await.unwrap(),
        300
    );

    let again = PayoutQueries::mark_paid(&db, &payout.id.to_string()).await;
    assert!(matches!(again, Err(DbError::InvalidData(_))));
}

#[tokio::test]
async fn test_payout_over_balance_inserts_nothing() {
    let (_dir, db) = setup().await;
    let user = seed_user(&db, "i@example.com").await;
    let user_id = user.id.to_string();
    earn(&db, user.id, 2).await;

    let first = PayoutQueries::request_within_balance(&db, &user_id, 150).await.unwrap();
    assert!(matches!(first, PayoutRequest::Created(_)));

    let second = PayoutQueries::request_within_balance(&db, &user_id, 100).await.unwrap();
    assert_eq!(second, PayoutRequest::InsufficientBalance { available: 50 });
    assert_eq!(PayoutQueries::list_for_user(&db, &user_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_concurrent_payouts_cannot_overdraw() {
    let (_dir, db) = setup().await;
    let user = seed_user(&db, "j@example.com").await;
    let user_id = user.id.to_string();
    earn(&db, user.id, 3).await;

    let (a, b) = tokio::join!(
        PayoutQueries::request_within_balance(&db, &user_id, 300),
        PayoutQueries::request_within_balance(&db, &user_id, 300),
    );
    let created = [a.unwrap(), b.unwrap()]
        .iter()
        .filter(|r| matches!(r, PayoutRequest::Created(_)))
        .count();

    assert_eq!(created, 1);
    assert_eq!(
        PayoutQueries::total_for_user(&db, &user_id, PayoutStatus::Pending).await.unwrap(),
        300
    );
}
