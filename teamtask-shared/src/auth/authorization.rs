/// Permission evaluator for team and task operations
///
/// Stateless checks that read current relationships from the stores on every
/// call. Nothing is cached between requests, so membership and role changes
/// take effect immediately.
///
/// # Permission Model
///
/// 1. **User type**: only `admin` and `task_manager` users may create teams;
///    only `admin` users may change another user's type.
/// 2. **Team role**: only `owner` and `admin` members may add or remove
///    members. Any member may view the team's members and tasks.
/// 3. **Task role**: only the reporter may edit, reassign, or delete a task;
///    only the current assignee may change its status. Both must still be
///    members of the task's team.
///
/// Every failed check is an [`AuthzError`] that surfaces as 403, never 401.
///
/// # Example
///
/// ```no_run
/// use teamtask_shared::auth::authorization::{require_owner_or_admin, AuthzError};
/// use teamtask_shared::models::team::TeamStore;
/// use uuid::Uuid;
///
/// async fn add_member(
///     teams: &dyn TeamStore,
///     team_id: Uuid,
///     actor: Uuid,
/// ) -> Result<(), AuthzError> {
///     require_owner_or_admin(teams, team_id, actor).await?;
///     // ... upsert the member
///     Ok(())
/// }
/// ```

use uuid::Uuid;

use crate::models::task::Task;
use crate::models::team::TeamStore;
use crate::models::user::UserType;
use crate::models::{StoreError, StoreResult};

/// Error type for authorization checks
#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    #[error("not a member of this team")]
    NotTeamMember,

    #[error("only team owners and admins can manage members")]
    InsufficientTeamRole,

    #[error("only admins and task managers can create teams")]
    CannotCreateTeam,

    #[error("admin privileges required")]
    NotSystemAdmin,

    #[error("cannot change your own user type")]
    SelfModification,

    #[error("only the reporter can modify this task")]
    NotReporter,

    #[error("only the assignee can update the task status")]
    NotAssignee,

    /// Store failure while evaluating a check
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Whether the user has any role in the team
pub async fn is_team_member(teams: &dyn TeamStore, team_id: Uuid, user_id: Uuid) -> StoreResult<bool> {
    Ok(teams.member_role(team_id, user_id).await?.is_some())
}

/// Whether the user is an owner or admin of the team
pub async fn is_owner_or_admin(teams: &dyn TeamStore, team_id: Uuid, user_id: Uuid) -> StoreResult<bool> {
    Ok(teams
        .member_role(team_id, user_id)
        .await?
        .is_some_and(|role| role.can_manage_members()))
}

pub async fn require_team_member(teams: &dyn TeamStore, team_id: Uuid, user_id: Uuid) -> Result<(), AuthzError> {
    if !is_team_member(teams, team_id, user_id).await? {
        return Err(AuthzError::NotTeamMember);
    }
    Ok(())
}

pub async fn require_owner_or_admin(teams: &dyn TeamStore, team_id: Uuid, user_id: Uuid) -> Result<(), AuthzError> {
    if !is_owner_or_admin(teams, team_id, user_id).await? {
        return Err(AuthzError::InsufficientTeamRole);
    }
    Ok(())
}

/// Team creation is limited to admins and task managers
pub fn require_team_creator(user_type: UserType) -> Result<(), AuthzError> {
    if !user_type.can_create_teams() {
        return Err(AuthzError::CannotCreateTeam);
    }
    Ok(())
}

pub fn require_system_admin(user_type: UserType) -> Result<(), AuthzError> {
    if !user_type.can_manage_user_types() {
        return Err(AuthzError::NotSystemAdmin);
    }
    Ok(())
}

/// Rejects an actor targeting their own account
pub fn require_other_user(actor_id: Uuid, target_id: Uuid) -> Result<(), AuthzError> {
    if actor_id == target_id {
        return Err(AuthzError::SelfModification);
    }
    Ok(())
}

pub fn require_reporter(task: &Task, user_id: Uuid) -> Result<(), AuthzError> {
    if task.reporter_id != user_id {
        return Err(AuthzError::NotReporter);
    }
    Ok(())
}

pub fn require_assignee(task: &Task, user_id: Uuid) -> Result<(), AuthzError> {
    if task.assignee_id != user_id {
        return Err(AuthzError::NotAssignee);
    }
    Ok(())
}
