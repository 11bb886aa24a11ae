/// Reminder delivery
///
/// The reminder sweeper hands every due task to a [`ReminderNotifier`]. The
/// default [`LogNotifier`] writes one structured log line per reminder;
/// other transports plug in by implementing the trait.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use teamtask_worker::notifier::{LogNotifier, ReminderNotifier};
///
/// let notifier: Arc<dyn ReminderNotifier> = Arc::new(LogNotifier);
/// assert_eq!(notifier.name(), "log");
/// ```

use async_trait::async_trait;
use teamtask_shared::models::task::Task;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Delivery failed: {0}")]
    Delivery(String),
}

#[async_trait]
pub trait ReminderNotifier: Send + Sync {
    fn name(&self) -> &'static str;

    /// Delivers a reminder for a task that is about to fall due
    ///
    /// A failed delivery leaves the task unmarked so the next sweep retries it.
    async fn notify(&self, task: &Task) -> Result<(), NotifyError>;
}

/// Logs reminders at info level
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl ReminderNotifier for LogNotifier {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn notify(&self, task: &Task) -> Result<(), NotifyError> {
        tracing::info!(
            task_id = %task.id,
            team_id = %task.team_id,
            assignee_id = %task.assignee_id,
            due_at = %task.due_at,
            "Task due soon"
        );
        Ok(())
    }
}
