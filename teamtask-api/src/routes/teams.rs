/// Team and membership endpoints
///
/// All routes require a bearer token.
///
/// - `POST /teams` - Create a team (admin or task_manager); the caller becomes owner
/// - `GET /teams` - Teams the caller belongs to
/// - `GET /teams/:team_id/members` - Members of a team (members only)
/// - `POST /teams/:team_id/members` - Add or re-role a member (owner/admin)
/// - `DELETE /teams/:team_id/members/:user_id` - Remove a member (owner/admin)

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use teamtask_shared::auth::authorization::{require_owner_or_admin, require_team_creator, require_team_member};
use teamtask_shared::auth::middleware::AuthContext;
use teamtask_shared::models::team::{normalize_team_name, Team, TeamMember, TeamRole};
use tracing::info;
use uuid::Uuid;

use super::current_user;
use crate::app::AppState;
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiPath};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateTeamRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddMemberRequest {
    pub user_id: Uuid,

    /// `admin` or `member`, defaults to `member`
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TeamsResponse {
    pub user_id: Uuid,
    pub teams: Vec<Team>,
}

#[derive(Debug, Serialize)]
pub struct MembersResponse {
    pub team_id: Uuid,
    pub members: Vec<TeamMember>,
}

#[derive(Debug, Serialize)]
pub struct MemberRemovedResponse {
    pub message: String,
    pub team_id: Uuid,
    pub user_id: Uuid,
}

pub async fn create_team(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiJson(body): ApiJson<CreateTeamRequest>,
) -> ApiResult<impl IntoResponse> {
    let actor = current_user(&state, &auth).await?;
    require_team_creator(actor.user_type)?;

    let name = normalize_team_name(&body.name)?;
    let team = state.teams.create_team(actor.id, &name).await?;

    info!(team_id = %team.id, user_id = %actor.id, "Team created");
    Ok((StatusCode::CREATED, Json(team)))
}

pub async fn list_teams(State(state): State<AppState>, auth: AuthContext) -> ApiResult<Json<TeamsResponse>> {
    let teams = state.teams.list_teams_for_user(auth.user_id).await?;

    Ok(Json(TeamsResponse {
        user_id: auth.user_id,
        teams,
    }))
}

pub async fn list_members(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiPath(team_id): ApiPath<Uuid>,
) -> ApiResult<Json<MembersResponse>> {
    require_team_member(state.teams.as_ref(), team_id, auth.user_id).await?;

    let members = state.teams.list_members(team_id).await?;
    Ok(Json(MembersResponse { team_id, members }))
}

/// Adds a user to the team, or changes the role of an existing member
///
/// The owner's own membership cannot be changed here.
pub async fn add_member(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiPath(team_id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<AddMemberRequest>,
) -> ApiResult<Json<TeamMember>> {
    require_owner_or_admin(state.teams.as_ref(), team_id, auth.user_id).await?;

    let role = match body.role.as_deref() {
        None => TeamRole::Member,
        Some(raw) => match raw.parse::<TeamRole>()? {
            TeamRole::Owner => {
                return Err(ApiError::BadRequest("role must be admin or member".to_string()));
            }
            role => role,
        },
    };

    let team = state
        .teams
        .find_by_id(team_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("team not found".to_string()))?;
    if body.user_id == team.owner_id {
        return Err(ApiError::BadRequest("cannot change the team owner's role".to_string()));
    }

    if state.users.find_by_id(body.user_id).await?.is_none() {
        return Err(ApiError::NotFound("user not found".to_string()));
    }

    let member = state.teams.upsert_member(team_id, body.user_id, role).await?;

    info!(
        team_id = %team_id,
        user_id = %member.user_id,
        role = member.role.as_str(),
        actor_id = %auth.user_id,
        "Team member added"
    );
    Ok(Json(member))
}

pub async fn remove_member(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiPath((team_id, user_id)): ApiPath<(Uuid, Uuid)>,
) -> ApiResult<Json<MemberRemovedResponse>> {
    require_owner_or_admin(state.teams.as_ref(), team_id, auth.user_id).await?;

    if !state.teams.remove_member(team_id, user_id).await? {
        info!(team_id = %team_id, user_id = %user_id, "Member not found in team");
        return Err(ApiError::NotFound("member not found in this team".to_string()));
    }

    // TODO: refuse to remove the last owner once ownership transfer exists
    info!(team_id = %team_id, user_id = %user_id, actor_id = %auth.user_id, "Team member removed");
    Ok(Json(MemberRemovedResponse {
        message: "member removed from team".to_string(),
        team_id,
        user_id,
    }))
}
