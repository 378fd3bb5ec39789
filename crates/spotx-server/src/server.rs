use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};

use crate::api::ApiServer;
use crate::app::{initialize_database, AppState};
use crate::clock::SystemClock;
use crate::config::ServerConfig;
use crate::local_store::FileStore;

pub async fn run(config: ServerConfig) -> Result<()> {
    info!("Initializing SpotX server");

    let database = Arc::new(initialize_database(&config).await?);
    let store = Arc::new(
        FileStore::open(&config.storage.local_store_dir)
            .await
            .context("Failed to open local store")?,
    );

    let listener = ApiServer::bind(&config.server.bind_address, config.server.port).await?;
    let state = Arc::new(AppState::new(config, database.clone(), store, Arc::new(SystemClock))?);

    match state.recorder.flush_outbox().await {
        Ok(report) if report.replayed + report.skipped > 0 => {
            info!("Replayed {} queued completions at startup", report.replayed)
        }
        Ok(_) => {}
        Err(e) => error!("Startup outbox flush failed: {}", e),
    }

    let reminders = Arc::new(state.slot_reminders()).start();
    let api = ApiServer::new(state.clone());

    info!("SpotX server running, waiting for shutdown signal...");

    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;

        tokio::select! {
            result = api.serve(listener) => {
                if let Err(e) = result {
                    error!("API server stopped: {}", e);
                }
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down gracefully...");
            }
            _ = signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down gracefully...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::select! {
            result = api.serve(listener) => {
                if let Err(e) = result {
                    error!("API server stopped: {}", e);
                }
            }
            _ = signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down gracefully...");
            }
        }
    }

    reminders.abort();
    if let Err(e) = reminders.await {
        if !e.is_cancelled() {
            error!("Slot reminder task failed: {}", e);
        }
    }
    drop(api);
    drop(state);

    match Arc::try_unwrap(database) {
        Ok(database) => database.close().await,
        Err(shared) => {
            // Open connections and the push worker keep their own clones
            warn!(
                "Database still shared by {} owners at shutdown, closing the pool in place",
                Arc::strong_count(&shared) - 1
            );
            if let Ok(pool) = shared.pool() {
                pool.close().await;
            }
        }
    }

    info!("SpotX server shutdown complete");
    Ok(())
}
