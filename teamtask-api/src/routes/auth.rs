/// Authentication endpoints
///
/// # Endpoints
///
/// - `POST /auth/register` - Register a new `employee` account
/// - `POST /auth/login` - Login, returns an access token and sets the refresh cookie
/// - `POST /auth/refresh` - Rotate the refresh cookie and mint a new access token
/// - `POST /auth/logout` - Revoke the presented refresh token
/// - `POST /auth/logout-all` - Revoke every refresh token of the caller (bearer)
/// - `GET /auth/users` - List users (bearer)
/// - `PATCH /auth/:user_id/update-usertype` - Change another user's type (bearer, admin)
///
/// The refresh token never appears in a response body; it travels only in
/// the `refresh_token` cookie.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use teamtask_shared::auth::authorization::{require_other_user, require_system_admin};
use teamtask_shared::auth::middleware::AuthContext;
use teamtask_shared::auth::session::{Credentials, IssuedSession};
use teamtask_shared::models::user::{User, UserType};
use tracing::info;
use uuid::Uuid;

use super::current_user;
use crate::app::AppState;
use crate::cookie::{clear_refresh_cookie, read_refresh_cookie, refresh_cookie};
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiPath, ClientDevice};

/// Register response
#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub email: String,
    pub user_type: UserType,
    pub created_at: DateTime<Utc>,
}

/// User as embedded in token responses
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: Uuid,
    pub email: String,

    #[serde(rename = "type")]
    pub user_type: UserType,
}

/// Login and refresh response
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,

    /// Access token lifetime in seconds
    pub expires_in: i64,

    pub user: SessionUser,
}

impl From<&IssuedSession> for TokenResponse {
    fn from(session: &IssuedSession) -> Self {
        Self {
            access_token: session.access_token.clone(),
            token_type: "Bearer".to_string(),
            expires_in: session.expires_in,
            user: SessionUser {
                id: session.user.id,
                email: session.user.email.clone(),
                user_type: session.user.user_type,
            },
        }
    }
}

/// Entry in the user listing
#[derive(Debug, Serialize, Deserialize)]
pub struct UserEntry {
    pub id: Uuid,
    pub email: String,
    pub user_type: UserType,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateUserTypeRequest {
    pub user_type: String,
}

#[derive(Debug, Serialize)]
pub struct UpdateUserTypeResponse {
    pub message: String,
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct LogoutAllResponse {
    pub message: String,
    pub revoked: u64,
}

/// Register a new user
///
/// ```text
/// POST /auth/register
/// { "email": "user@example.com", "password": "correct horse" }
/// ```
///
/// Returns 201, 400 for a malformed email or a password under 8 characters,
/// and 409 when the email is already registered (ignoring case).
pub async fn register(
    State(state): State<AppState>,
    ApiJson(credentials): ApiJson<Credentials>,
) -> ApiResult<impl IntoResponse> {
    let user = state.auth.register(credentials).await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user_id: user.id,
            email: user.email,
            user_type: user.user_type,
            created_at: user.created_at,
        }),
    ))
}

/// Login with email and password
///
/// Unknown email and wrong password produce the same 401.
pub async fn login(
    State(state): State<AppState>,
    ClientDevice(device): ClientDevice,
    ApiJson(credentials): ApiJson<Credentials>,
) -> ApiResult<impl IntoResponse> {
    let session = state.auth.login(credentials, device).await?;
    session_response(&state, &session)
}

/// Exchange the refresh cookie for a new token pair
///
/// The presented refresh token is revoked; replaying it fails with 401.
pub async fn refresh(
    State(state): State<AppState>,
    ClientDevice(device): ClientDevice,
    headers: HeaderMap,
) -> ApiResult<impl IntoResponse> {
    let raw = read_refresh_cookie(&headers)
        .ok_or_else(|| ApiError::Unauthorized("missing refresh token".to_string()))?;

    let session = state.auth.rotate(&raw, device).await?;
    session_response(&state, &session)
}

/// Revoke the presented refresh token and clear the cookie
///
/// Always 200, with or without a cookie.
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<impl IntoResponse> {
    if let Some(raw) = read_refresh_cookie(&headers) {
        let revoked = state.auth.logout(&raw).await?;
        info!(revoked, "Logout");
    }

    Ok((
        [(header::SET_COOKIE, clear_refresh_cookie(state.secure_cookies())?)],
        Json(MessageResponse {
            message: "logged out".to_string(),
        }),
    ))
}

/// Revoke every refresh token held by the caller
pub async fn logout_all(State(state): State<AppState>, auth: AuthContext) -> ApiResult<impl IntoResponse> {
    let revoked = state.auth.logout_all(auth.user_id).await?;

    Ok((
        [(header::SET_COOKIE, clear_refresh_cookie(state.secure_cookies())?)],
        Json(LogoutAllResponse {
            message: "logged out of all sessions".to_string(),
            revoked,
        }),
    ))
}

/// List every user, ordered by email
pub async fn list_users(State(state): State<AppState>, _auth: AuthContext) -> ApiResult<Json<Vec<UserEntry>>> {
    let users = state
        .users
        .list_all()
        .await?
        .into_iter()
        .map(|u| UserEntry {
            id: u.id,
            email: u.email,
            user_type: u.user_type,
        })
        .collect();

    Ok(Json(users))
}

/// Change another user's type
///
/// Admin only, and never on the caller's own account.
///
/// ```text
/// PATCH /auth/:user_id/update-usertype
/// { "user_type": "task_manager" }
/// ```
pub async fn update_user_type(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiPath(target_id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<UpdateUserTypeRequest>,
) -> ApiResult<Json<UpdateUserTypeResponse>> {
    require_other_user(auth.user_id, target_id)?;

    let actor = current_user(&state, &auth).await?;
    require_system_admin(actor.user_type)?;

    let user_type: UserType = body
        .user_type
        .parse()
        .map_err(|e: teamtask_shared::models::user::UnknownUserType| ApiError::BadRequest(e.to_string()))?;

    let user = state.users.update_user_type(target_id, user_type).await?;

    info!(
        actor_id = %auth.user_id,
        user_id = %user.id,
        user_type = user.user_type.as_str(),
        "User type updated"
    );

    Ok(Json(UpdateUserTypeResponse {
        message: "user type updated".to_string(),
        user,
    }))
}

fn session_response(state: &AppState, session: &IssuedSession) -> ApiResult<impl IntoResponse> {
    let cookie = refresh_cookie(&session.refresh_token, state.secure_cookies())?;
    Ok(([(header::SET_COOKIE, cookie)], Json(TokenResponse::from(session))))
}
