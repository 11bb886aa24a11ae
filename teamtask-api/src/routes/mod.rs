/// API route handlers
///
/// Handlers are organized by resource:
///
/// - `health`: Health check endpoint
/// - `auth`: Registration, login, refresh, logout, and user administration
/// - `teams`: Teams and team membership
/// - `tasks`: Tasks within teams

pub mod auth;
pub mod health;
pub mod tasks;
pub mod teams;

use teamtask_shared::auth::middleware::AuthContext;
use teamtask_shared::models::task::Task;
use teamtask_shared::models::user::User;
use uuid::Uuid;

use crate::app::AppState;
use crate::error::{ApiError, ApiResult};

/// Loads the caller's stored account
///
/// Permission checks use the stored user type, not the token claim, so a
/// demotion takes effect before the access token expires.
pub(crate) async fn current_user(state: &AppState, auth: &AuthContext) -> ApiResult<User> {
    state
        .users
        .find_by_id(auth.user_id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("user no longer exists".to_string()))
}

pub(crate) async fn load_task(state: &AppState, task_id: Uuid) -> ApiResult<Task> {
    state
        .tasks
        .find_by_id(task_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("task not found".to_string()))
}
