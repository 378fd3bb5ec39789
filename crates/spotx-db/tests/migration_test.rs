use spotx_db::{create_database_if_not_exists, get_migration_status, run_migrations};
use sqlx::SqlitePool;
use tempfile::{tempdir, TempDir};

async fn migrated_pool() -> (SqlitePool, TempDir) {
    let dir = tempdir().unwrap();
    let url = format!("sqlite:{}", dir.path().join("spotx.db").display());

    create_database_if_not_exists(&url).await.unwrap();
    let pool = SqlitePool::connect(&url).await.unwrap();
    run_migrations(&pool).await.unwrap();
    (pool, dir)
}

#[tokio::test]
async fn test_schema_has_every_table() {
    let (pool, _dir) = migrated_pool().await;

    let names: Vec<String> =
        sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .fetch_all(&pool)
            .await
            .unwrap();

    for table in [
        "ad_views",
        "campaign_stats",
        "campaigns",
        "merchants",
        "notifications",
        "payouts",
        "rewards",
        "users",
    ] {
        assert!(names.iter().any(|n| n == table), "{} is missing", table);
    }
}

#[tokio::test]
async fn test_rerun_is_noop() {
    let (pool, _dir) = migrated_pool().await;
    run_migrations(&pool).await.unwrap();

    let status = get_migration_status(&pool).await.unwrap();
    assert_eq!((status.applied_migrations, status.pending_migrations), (2, 0));
}

#[tokio::test]
async fn test_status_checks_reject_unknown_values() {
    let (pool, _dir) = migrated_pool().await;

    let rejected = sqlx::query(
        "INSERT INTO merchants (id, business_name, contact_email, status, created_at)
         VALUES ('m1', 'Kiosk', 'k@kiosk.example', 'banned', '2026-10-19T00:00:00Z')",
    )
    .execute(&pool)
    .await;
    assert!(rejected.is_err());

    sqlx::query(
        "INSERT INTO merchants (id, business_name, contact_email, created_at)
         VALUES ('m1', 'Kiosk', 'k@kiosk.example', '2026-10-19T00:00:00Z')",
    )
    .execute(&pool)
    .await
    .unwrap();

    let zero_budget = sqlx::query(
        "INSERT INTO campaigns (
             id, merchant_id, name, budget_cents, reward_per_view_cents, created_at, updated_at
         )
         VALUES ('c1', 'm1', 'Free', 0, 10, '2026-10-19T00:00:00Z', '2026-10-19T00:00:00Z')",
    )
    .execute(&pool)
    .await;
    assert!(zero_budget.is_err());
}
