//! # TeamTask Worker
//!
//! Maintenance process that runs beside the API server against the same
//! database.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p teamtask-worker
//! ```

use std::sync::Arc;

use teamtask_shared::db::pool::{close_pool, create_pool, DatabaseConfig};
use teamtask_shared::models::refresh_token::PgRefreshTokenStore;
use teamtask_shared::models::task::PgTaskStore;
use teamtask_worker::config::WorkerConfig;
use teamtask_worker::notifier::LogNotifier;
use teamtask_worker::orchestrator::MaintenanceOrchestrator;
use teamtask_worker::sweepers::{ReminderSweeper, TokenSweeper};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "teamtask_worker=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("TeamTask Worker v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = WorkerConfig::from_env()?;
    let pool = create_pool(DatabaseConfig {
        max_connections: 2,
        ..DatabaseConfig::new(config.database_url.clone())
    })
    .await?;

    let mut orchestrator = MaintenanceOrchestrator::new();
    orchestrator.register(
        Arc::new(TokenSweeper::new(
            Arc::new(PgRefreshTokenStore::new(pool.clone())),
            config.token_retention,
        )),
        config.token_purge_interval,
    );
    orchestrator.register(
        Arc::new(ReminderSweeper::new(
            Arc::new(PgTaskStore::new(pool.clone())),
            Arc::new(LogNotifier),
            config.reminder_window,
        )),
        config.reminder_interval,
    );

    let shutdown = orchestrator.shutdown_token();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
            return;
        }
        tracing::info!("Shutdown signal received, stopping jobs...");
        shutdown.cancel();
    });

    orchestrator.run().await?;
    close_pool(pool).await;

    Ok(())
}
