use crate::connection::Database;
use crate::error::{DbError, Result};
use sqlx::migrate::{MigrateDatabase, Migrator};
use sqlx::{Sqlite, SqlitePool};
use tracing::info;

static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationStatus {
    pub applied_migrations: usize,
    pub pending_migrations: usize,
}

pub async fn create_database_if_not_exists(database_url: &str) -> Result<()> {
    let url = normalize_url(database_url);
    if !Sqlite::database_exists(&url).await? {
        info!("Creating database at {}", url);
        Sqlite::create_database(&url).await?;
    }
    Ok(())
}

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    info!("Running database migrations");
    MIGRATOR.run(pool).await?;
    info!("Database migrations completed successfully");
    Ok(())
}

pub async fn get_migration_status(pool: &SqlitePool) -> Result<MigrationStatus> {
    let applied: Vec<i64> =
        sqlx::query_scalar("SELECT version FROM _sqlx_migrations WHERE success = 1")
            .fetch_all(pool)
            .await?;

    let pending = MIGRATOR.iter().filter(|m| !applied.contains(&m.version)).count();

    Ok(MigrationStatus { applied_migrations: applied.len(), pending_migrations: pending })
}

fn normalize_url(database_url: &str) -> String {
    if database_url.starts_with("sqlite:") {
        database_url.to_string()
    } else {
        format!("sqlite://{}", database_url)
    }
}

impl Database {
    pub async fn run_migrations(&self) -> Result<()> {
        run_migrations(self.pool()?).await
    }

    /// Fails when the schema lags behind the migrations compiled into this binary
    pub async fn verify_migrations(&self) -> Result<MigrationStatus> {
        let status = get_migration_status(self.pool()?).await?;
        if status.pending_migrations > 0 {
            return Err(DbError::InvalidData(format!(
                "{} migrations have not been applied",
                status.pending_migrations
            )));
        }
        info!("Schema is current ({} migrations applied)", status.applied_migrations);
        Ok(status)
    }
}
