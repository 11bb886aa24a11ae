/// Task model and task store
///
/// Tasks belong to a team. The reporter is the member who created the task
/// and never changes; the assignee defaults to the reporter and can be changed
/// by the reporter only.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE tasks (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     team_id UUID NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
///     title VARCHAR(100) NOT NULL,
///     description TEXT,
///     reporter_id UUID NOT NULL REFERENCES users(id),
///     assignee_id UUID NOT NULL REFERENCES users(id),
///     due_at TIMESTAMPTZ NOT NULL,
///     reminder_sent_at TIMESTAMPTZ,
///     status task_status NOT NULL DEFAULT 'open',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// # Due Dates
///
/// `due_at` must be at least [`MIN_DUE_LEAD_HOURS`] hours in the future when
/// a task is created, and whenever a detail update changes it.
///
/// # Example
///
/// ```
/// use chrono::{Duration, Utc};
/// use teamtask_shared::models::task::validate_due_at;
///
/// let now = Utc::now();
/// assert!(validate_due_at(now + Duration::hours(10), now).is_ok());
/// assert!(validate_due_at(now + Duration::hours(2), now).is_err());
/// ```

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::str::FromStr;
use uuid::Uuid;

use super::{StoreError, StoreResult};

/// Minimum lead time between now and a task's due date
pub const MIN_DUE_LEAD_HOURS: i64 = 8;

/// Maximum task title length, in characters
pub const MAX_TITLE_LEN: usize = 100;

/// Task status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Open,
    InProgress,
    Done,
    Canceled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Open => "open",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Done => "done",
            TaskStatus::Canceled => "canceled",
        }
    }

    /// Open and in-progress tasks still need doing
    pub fn is_active(&self) -> bool {
        matches!(self, TaskStatus::Open | TaskStatus::InProgress)
    }
}

impl FromStr for TaskStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(TaskStatus::Open),
            "in_progress" => Ok(TaskStatus::InProgress),
            "done" => Ok(TaskStatus::Done),
            "canceled" => Ok(TaskStatus::Canceled),
            _ => Err(StoreError::InvalidInput(
                "invalid status, expected one of open, in_progress, done, canceled".to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Task {
    pub id: Uuid,
    pub team_id: Uuid,
    pub title: String,
    pub description: Option<String>,

    /// Creator of the task, immutable
    pub reporter_id: Uuid,

    /// Member currently responsible for the task
    pub assignee_id: Uuid,

    pub due_at: DateTime<Utc>,
    pub reminder_sent_at: Option<DateTime<Utc>>,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a task
#[derive(Debug, Clone)]
pub struct NewTask {
    pub team_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub reporter_id: Uuid,
    pub assignee_id: Uuid,
    pub due_at: DateTime<Utc>,
}

/// Partial update of a task's details
///
/// `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_at: Option<DateTime<Utc>>,
}

impl TaskUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.due_at.is_none()
    }

    /// Checks the update and returns it with the title trimmed
    pub fn validated(self, now: DateTime<Utc>) -> StoreResult<Self> {
        if self.is_empty() {
            return Err(StoreError::InvalidInput(
                "at least one of title, description, due_at is required".to_string(),
            ));
        }

        let title = self.title.as_deref().map(normalize_title).transpose()?;
        if let Some(due_at) = self.due_at {
            validate_due_at(due_at, now)?;
        }

        Ok(Self { title, ..self })
    }
}

/// Trims a task title and checks its length
pub fn normalize_title(raw: &str) -> StoreResult<String> {
    let title = raw.trim();
    let len = title.chars().count();
    if len == 0 || len > MAX_TITLE_LEN {
        return Err(StoreError::InvalidInput(format!(
            "title must be between 1 and {} characters",
            MAX_TITLE_LEN
        )));
    }
    Ok(title.to_string())
}

/// Rejects due dates less than eight hours from `now`
pub fn validate_due_at(due_at: DateTime<Utc>, now: DateTime<Utc>) -> StoreResult<()> {
    if due_at < now + Duration::hours(MIN_DUE_LEAD_HOURS) {
        return Err(StoreError::InvalidInput(format!(
            "due_at must be at least {} hours in the future",
            MIN_DUE_LEAD_HOURS
        )));
    }
    Ok(())
}

/// Task store
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn create(&self, task: NewTask) -> StoreResult<Task>;

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Task>>;

    async fn assign(&self, id: Uuid, assignee_id: Uuid) -> StoreResult<Task>;

    async fn update_status(&self, id: Uuid, status: TaskStatus) -> StoreResult<Task>;

    /// Applies a partial update, validating it against `now` first
    async fn update_details(&self, id: Uuid, update: TaskUpdate, now: DateTime<Utc>) -> StoreResult<Task>;

    async fn delete(&self, id: Uuid) -> StoreResult<()>;

    async fn list_for_team(&self, team_id: Uuid) -> StoreResult<Vec<Task>>;

    async fn list_assigned_in_team(&self, team_id: Uuid, user_id: Uuid) -> StoreResult<Vec<Task>>;

    async fn list_reported_in_team(&self, team_id: Uuid, user_id: Uuid) -> StoreResult<Vec<Task>>;

    async fn list_by_assignee(&self, user_id: Uuid) -> StoreResult<Vec<Task>>;

    async fn list_by_reporter(&self, user_id: Uuid) -> StoreResult<Vec<Task>>;

    /// Active tasks due in `(from, before]` whose reminder has not been sent
    async fn find_due_for_reminder(&self, from: DateTime<Utc>, before: DateTime<Utc>) -> StoreResult<Vec<Task>>;

    async fn mark_reminder_sent(&self, id: Uuid, when: DateTime<Utc>) -> StoreResult<()>;
}

const TASK_COLUMNS: &str = "id, team_id, title, description, reporter_id, assignee_id, \
     due_at, reminder_sent_at, status, created_at, updated_at";

/// Postgres-backed [`TaskStore`]
#[derive(Debug, Clone)]
pub struct PgTaskStore {
    pool: PgPool,
}

impl PgTaskStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn list_where(&self, predicate: &str, ids: &[Uuid]) -> StoreResult<Vec<Task>> {
        let sql = format!(
            "SELECT {} FROM tasks WHERE {} ORDER BY due_at",
            TASK_COLUMNS, predicate
        );

        let mut query = sqlx::query_as::<_, Task>(&sql);
        for id in ids {
            query = query.bind(*id);
        }

        Ok(query.fetch_all(&self.pool).await?)
    }
}

#[async_trait]
impl TaskStore for PgTaskStore {
    async fn create(&self, task: NewTask) -> StoreResult<Task> {
        let sql = format!(
            r#"
            INSERT INTO tasks (team_id, title, description, reporter_id, assignee_id, due_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            TASK_COLUMNS
        );

        let task = sqlx::query_as::<_, Task>(&sql)
            .bind(task.team_id)
            .bind(&task.title)
            .bind(&task.description)
            .bind(task.reporter_id)
            .bind(task.assignee_id)
            .bind(task.due_at)
            .fetch_one(&self.pool)
            .await?;

        Ok(task)
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Task>> {
        let sql = format!("SELECT {} FROM tasks WHERE id = $1", TASK_COLUMNS);

        let task = sqlx::query_as::<_, Task>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(task)
    }

    async fn assign(&self, id: Uuid, assignee_id: Uuid) -> StoreResult<Task> {
        let sql = format!(
            "UPDATE tasks SET assignee_id = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            TASK_COLUMNS
        );

        sqlx::query_as::<_, Task>(&sql)
            .bind(id)
            .bind(assignee_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound("task"))
    }

    async fn update_status(&self, id: Uuid, status: TaskStatus) -> StoreResult<Task> {
        let sql = format!(
            "UPDATE tasks SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            TASK_COLUMNS
        );

        sqlx::query_as::<_, Task>(&sql)
            .bind(id)
            .bind(status)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound("task"))
    }

    async fn update_details(&self, id: Uuid, update: TaskUpdate, now: DateTime<Utc>) -> StoreResult<Task> {
        let update = update.validated(now)?;

        let sql = format!(
            r#"
            UPDATE tasks
            SET title = COALESCE($2, title),
                description = COALESCE($3, description),
                due_at = COALESCE($4, due_at),
                updated_at = $5
            WHERE id = $1
            RETURNING {}
            "#,
            TASK_COLUMNS
        );

        sqlx::query_as::<_, Task>(&sql)
            .bind(id)
            .bind(&update.title)
            .bind(&update.description)
            .bind(update.due_at)
            .bind(now)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound("task"))
    }

    async fn delete(&self, id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("task"));
        }

        Ok(())
    }

    async fn list_for_team(&self, team_id: Uuid) -> StoreResult<Vec<Task>> {
        self.list_where("team_id = $1", &[team_id]).await
    }

    async fn list_assigned_in_team(&self, team_id: Uuid, user_id: Uuid) -> StoreResult<Vec<Task>> {
        self.list_where("team_id = $1 AND assignee_id = $2", &[team_id, user_id])
            .await
    }

    async fn list_reported_in_team(&self, team_id: Uuid, user_id: Uuid) -> StoreResult<Vec<Task>> {
        self.list_where("team_id = $1 AND reporter_id = $2", &[team_id, user_id])
            .await
    }

    async fn list_by_assignee(&self, user_id: Uuid) -> StoreResult<Vec<Task>> {
        self.list_where("assignee_id = $1", &[user_id]).await
    }

    async fn list_by_reporter(&self, user_id: Uuid) -> StoreResult<Vec<Task>> {
        self.list_where("reporter_id = $1", &[user_id]).await
    }

    async fn find_due_for_reminder(&self, from: DateTime<Utc>, before: DateTime<Utc>) -> StoreResult<Vec<Task>> {
        let sql = format!(
            r#"
            SELECT {}
            FROM tasks
            WHERE due_at > $1
              AND due_at <= $2
              AND reminder_sent_at IS NULL
              AND status IN ('open', 'in_progress')
            ORDER BY due_at
            "#,
            TASK_COLUMNS
        );

        let tasks = sqlx::query_as::<_, Task>(&sql)
            .bind(from)
            .bind(before)
            .fetch_all(&self.pool)
            .await?;

        Ok(tasks)
    }

    async fn mark_reminder_sent(&self, id: Uuid, when: DateTime<Utc>) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE tasks SET reminder_sent_at = $2, updated_at = $2 WHERE id = $1",
        )
        .bind(id)
        .bind(when)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("task"));
        }

        Ok(())
    }
}
