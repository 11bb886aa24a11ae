/// Periodic maintenance jobs
///
/// Each job implements [`Sweeper`]; the orchestrator calls
/// [`Sweeper::sweep`] on the job's interval. A sweep returns how many rows
/// it handled so the orchestrator can log it.
///
/// - [`TokenSweeper`] deletes refresh tokens that expired longer ago than
///   the retention period.
/// - [`ReminderSweeper`] sends one reminder per open or in-progress task
///   falling due within the window, then marks the task reminded.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use teamtask_shared::models::refresh_token::RefreshTokenStore;
use teamtask_shared::models::task::TaskStore;
use teamtask_shared::models::{StoreError, StoreResult};

use crate::notifier::ReminderNotifier;

#[async_trait]
pub trait Sweeper: Send + Sync {
    fn name(&self) -> &'static str;

    async fn sweep(&self, now: DateTime<Utc>) -> StoreResult<u64>;
}

/// Purges refresh tokens past their retention
pub struct TokenSweeper {
    tokens: Arc<dyn RefreshTokenStore>,
    retention: Duration,
}

impl TokenSweeper {
    pub fn new(tokens: Arc<dyn RefreshTokenStore>, retention: Duration) -> Self {
        TokenSweeper { tokens, retention }
    }
}

#[async_trait]
impl Sweeper for TokenSweeper {
    fn name(&self) -> &'static str {
        "token_purge"
    }

    async fn sweep(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let cutoff = now - self.retention;
        let purged = self.tokens.purge_expired(cutoff).await?;

        if purged > 0 {
            tracing::info!(purged, cutoff = %cutoff, "Purged expired refresh tokens");
        }
        Ok(purged)
    }
}

/// Sends due-date reminders
pub struct ReminderSweeper {
    tasks: Arc<dyn TaskStore>,
    notifier: Arc<dyn ReminderNotifier>,
    window: Duration,
}

impl ReminderSweeper {
    pub fn new(tasks: Arc<dyn TaskStore>, notifier: Arc<dyn ReminderNotifier>, window: Duration) -> Self {
        ReminderSweeper { tasks, notifier, window }
    }
}

#[async_trait]
impl Sweeper for ReminderSweeper {
    fn name(&self) -> &'static str {
        "task_reminders"
    }

    async fn sweep(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let due = self.tasks.find_due_for_reminder(now, now + self.window).await?;
        let mut sent = 0;

        for task in due {
            if let Err(e) = self.notifier.notify(&task).await {
                tracing::warn!(
                    task_id = %task.id,
                    notifier = self.notifier.name(),
                    error = %e,
                    "Reminder not delivered, will retry"
                );
                continue;
            }

            match self.tasks.mark_reminder_sent(task.id, now).await {
                Ok(()) => sent += 1,
                // Deleted between lookup and mark
                Err(StoreError::NotFound(_)) => {
                    tracing::debug!(task_id = %task.id, "Reminded task no longer exists");
                }
                Err(e) => return Err(e),
            }
        }

        if sent > 0 {
            tracing::info!(sent, "Sent task reminders");
        }
        Ok(sent)
    }
}
