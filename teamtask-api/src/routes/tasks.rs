/// Task endpoints
///
/// All routes require a bearer token.
///
/// # Team-scoped
///
/// - `POST /teams/:team_id/tasks` - Create a task (members)
/// - `GET /teams/:team_id/tasks` - All tasks of the team (members)
/// - `GET /teams/:team_id/tasks/assigned` - Caller's assigned tasks in the team
/// - `GET /teams/:team_id/tasks/reported` - Caller's reported tasks in the team
///
/// # Task-scoped
///
/// - `GET /tasks/assigned`, `GET /tasks/reported` - Caller's tasks across teams
/// - `GET /tasks/:id` - Any member of the task's team
/// - `PATCH /tasks/:id` - Edit title, description, or due date (reporter)
/// - `PATCH /tasks/:id/assign` - Reassign (reporter)
/// - `PATCH /tasks/:id/status` - Change status (assignee)
/// - `DELETE /tasks/:id` - Delete (reporter)
///
/// For an existing task the task is loaded first (404), then the task role is
/// checked, then team membership (both 403), then the body (400). Reporters
/// and assignees who have left the team lose their task permissions.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use teamtask_shared::auth::authorization::{
    is_team_member, require_assignee, require_reporter, require_team_member,
};
use teamtask_shared::auth::middleware::AuthContext;
use teamtask_shared::models::task::{normalize_title, validate_due_at, NewTask, Task, TaskStatus, TaskUpdate};
use tracing::info;
use uuid::Uuid;

use super::load_task;
use crate::app::AppState;
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiPath};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateTaskRequest {
    pub title: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Defaults to the caller
    #[serde(default)]
    pub assignee_id: Option<Uuid>,

    pub due_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateTaskRequest {
    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub due_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssignTaskRequest {
    pub assignee_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct TeamTasksResponse {
    pub team_id: Uuid,
    pub tasks: Vec<Task>,
}

#[derive(Debug, Serialize)]
pub struct UserTasksResponse {
    pub user_id: Uuid,
    pub tasks: Vec<Task>,
}

pub async fn create_task(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiPath(team_id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<CreateTaskRequest>,
) -> ApiResult<impl IntoResponse> {
    let title = normalize_title(&body.title)?;
    validate_due_at(body.due_at, Utc::now())?;

    require_team_member(state.teams.as_ref(), team_id, auth.user_id).await?;

    let assignee_id = body.assignee_id.unwrap_or(auth.user_id);
    if !is_team_member(state.teams.as_ref(), team_id, assignee_id).await? {
        return Err(ApiError::BadRequest("assignee must be a member of the team".to_string()));
    }

    let task = state
        .tasks
        .create(NewTask {
            team_id,
            title,
            description: body.description,
            reporter_id: auth.user_id,
            assignee_id,
            due_at: body.due_at,
        })
        .await?;

    info!(task_id = %task.id, team_id = %team_id, user_id = %auth.user_id, "Task created");
    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn list_team_tasks(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiPath(team_id): ApiPath<Uuid>,
) -> ApiResult<Json<TeamTasksResponse>> {
    require_team_member(state.teams.as_ref(), team_id, auth.user_id).await?;

    let tasks = state.tasks.list_for_team(team_id).await?;
    Ok(Json(TeamTasksResponse { team_id, tasks }))
}

pub async fn list_team_assigned(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiPath(team_id): ApiPath<Uuid>,
) -> ApiResult<Json<TeamTasksResponse>> {
    require_team_member(state.teams.as_ref(), team_id, auth.user_id).await?;

    let tasks = state.tasks.list_assigned_in_team(team_id, auth.user_id).await?;
    Ok(Json(TeamTasksResponse { team_id, tasks }))
}

pub async fn list_team_reported(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiPath(team_id): ApiPath<Uuid>,
) -> ApiResult<Json<TeamTasksResponse>> {
    require_team_member(state.teams.as_ref(), team_id, auth.user_id).await?;

    let tasks = state.tasks.list_reported_in_team(team_id, auth.user_id).await?;
    Ok(Json(TeamTasksResponse { team_id, tasks }))
}

pub async fn list_assigned(State(state): State<AppState>, auth: AuthContext) -> ApiResult<Json<UserTasksResponse>> {
    let tasks = state.tasks.list_by_assignee(auth.user_id).await?;
    Ok(Json(UserTasksResponse {
        user_id: auth.user_id,
        tasks,
    }))
}

pub async fn list_reported(State(state): State<AppState>, auth: AuthContext) -> ApiResult<Json<UserTasksResponse>> {
    let tasks = state.tasks.list_by_reporter(auth.user_id).await?;
    Ok(Json(UserTasksResponse {
        user_id: auth.user_id,
        tasks,
    }))
}

pub async fn get_task(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiPath(task_id): ApiPath<Uuid>,
) -> ApiResult<Json<Task>> {
    let task = load_task(&state, task_id).await?;
    require_team_member(state.teams.as_ref(), task.team_id, auth.user_id).await?;

    Ok(Json(task))
}

pub async fn update_task(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiPath(task_id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<UpdateTaskRequest>,
) -> ApiResult<Json<Task>> {
    let task = load_task(&state, task_id).await?;
    require_reporter(&task, auth.user_id)?;
    require_team_member(state.teams.as_ref(), task.team_id, auth.user_id).await?;

    let update = TaskUpdate {
        title: body.title,
        description: body.description,
        due_at: body.due_at,
    };
    let task = state.tasks.update_details(task_id, update, Utc::now()).await?;

    info!(task_id = %task.id, user_id = %auth.user_id, "Task updated");
    Ok(Json(task))
}

pub async fn assign_task(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiPath(task_id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<AssignTaskRequest>,
) -> ApiResult<Json<Task>> {
    let task = load_task(&state, task_id).await?;
    require_reporter(&task, auth.user_id)?;
    require_team_member(state.teams.as_ref(), task.team_id, auth.user_id).await?;

    if !is_team_member(state.teams.as_ref(), task.team_id, body.assignee_id).await? {
        return Err(ApiError::BadRequest("assignee must be a member of the team".to_string()));
    }

    let task = state.tasks.assign(task_id, body.assignee_id).await?;

    info!(task_id = %task.id, assignee_id = %task.assignee_id, user_id = %auth.user_id, "Task reassigned");
    Ok(Json(task))
}

pub async fn update_status(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiPath(task_id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<UpdateStatusRequest>,
) -> ApiResult<Json<Task>> {
    let task = load_task(&state, task_id).await?;
    require_assignee(&task, auth.user_id)?;
    require_team_member(state.teams.as_ref(), task.team_id, auth.user_id).await?;

    let status: TaskStatus = body.status.parse()?;
    let task = state.tasks.update_status(task_id, status).await?;

    info!(task_id = %task.id, status = task.status.as_str(), user_id = %auth.user_id, "Task status changed");
    Ok(Json(task))
}

pub async fn delete_task(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiPath(task_id): ApiPath<Uuid>,
) -> ApiResult<StatusCode> {
    let task = load_task(&state, task_id).await?;
    require_reporter(&task, auth.user_id)?;
    require_team_member(state.teams.as_ref(), task.team_id, auth.user_id).await?;

    state.tasks.delete(task_id).await?;

    info!(task_id = %task_id, user_id = %auth.user_id, "Task deleted");
    Ok(StatusCode::NO_CONTENT)
}
