/// Maintenance orchestrator
///
/// Runs every registered [`Sweeper`] on its own interval until the shutdown
/// token is cancelled.
///
/// # Architecture
///
/// ```text
/// MaintenanceOrchestrator
///   ├─> TokenSweeper     every TOKEN_PURGE_INTERVAL_SECS
///   └─> ReminderSweeper  every REMINDER_INTERVAL_SECS
/// ```
///
/// Each job runs in its own Tokio task. The first sweep happens immediately;
/// a sweep that overruns its interval delays the next one instead of
/// bunching ticks. A failed sweep is logged and retried on the next tick.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use teamtask_shared::memory::InMemoryStore;
/// use teamtask_worker::orchestrator::MaintenanceOrchestrator;
/// use teamtask_worker::sweepers::TokenSweeper;
///
/// # async fn example() -> anyhow::Result<()> {
/// let store = Arc::new(InMemoryStore::new());
///
/// let mut orchestrator = MaintenanceOrchestrator::new();
/// orchestrator.register(
///     Arc::new(TokenSweeper::new(store, chrono::Duration::hours(24))),
///     Duration::from_secs(3600),
/// );
///
/// let shutdown = orchestrator.shutdown_token();
/// tokio::spawn(async move {
///     let _ = tokio::signal::ctrl_c().await;
///     shutdown.cancel();
/// });
///
/// orchestrator.run().await?;
/// # Ok(())
/// # }
/// ```

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinSet;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::sweepers::Sweeper;

struct Job {
    sweeper: Arc<dyn Sweeper>,
    every: Duration,
}

pub struct MaintenanceOrchestrator {
    jobs: Vec<Job>,
    shutdown_token: CancellationToken,
}

impl MaintenanceOrchestrator {
    pub fn new() -> Self {
        MaintenanceOrchestrator {
            jobs: Vec::new(),
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Registers a sweeper to run every `every`
    pub fn register(&mut self, sweeper: Arc<dyn Sweeper>, every: Duration) {
        tracing::info!(job = sweeper.name(), every_secs = every.as_secs(), "Registering maintenance job");
        self.jobs.push(Job { sweeper, every });
    }

    /// Token that stops the orchestrator when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Runs all jobs until shutdown
    ///
    /// Returns once every job loop has stopped. A sweep in progress is
    /// allowed to finish.
    pub async fn run(&self) -> anyhow::Result<()> {
        tracing::info!(jobs = self.jobs.len(), "Maintenance orchestrator starting");

        let mut loops = JoinSet::new();
        for job in &self.jobs {
            loops.spawn(run_job(job.sweeper.clone(), job.every, self.shutdown_token.clone()));
        }

        while let Some(result) = loops.join_next().await {
            if let Err(e) = result {
                tracing::error!(error = %e, "Maintenance job panicked");
            }
        }

        tracing::info!("Maintenance orchestrator shut down");
        Ok(())
    }
}

impl Default for MaintenanceOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

async fn run_job(sweeper: Arc<dyn Sweeper>, every: Duration, shutdown: CancellationToken) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }

        match sweeper.sweep(Utc::now()).await {
            Ok(count) => tracing::debug!(job = sweeper.name(), count, "Sweep finished"),
            Err(e) => tracing::error!(job = sweeper.name(), error = %e, "Sweep failed"),
        }
    }

    tracing::debug!(job = sweeper.name(), "Maintenance job stopped");
}
