/// Error handling for the API server
///
/// All handlers return `Result<T, ApiError>`. Each variant maps to one HTTP
/// status and renders the shared envelope:
///
/// ```json
/// { "error": { "type": "not_found", "message": "task not found" } }
/// ```
///
/// Lower-layer errors convert through `From`, so handlers can use `?`
/// directly on store, session, and authorization results.
///
/// # Example
///
/// ```
/// use teamtask_api::error::{ApiError, ApiResult};
/// use axum::Json;
/// use serde_json::{json, Value};
///
/// async fn handler(found: bool) -> ApiResult<Json<Value>> {
///     if !found {
///         return Err(ApiError::NotFound("task not found".to_string()));
///     }
///     Ok(Json(json!({ "ok": true })))
/// }
/// ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use teamtask_shared::auth::authorization::AuthzError;
use teamtask_shared::auth::middleware::AuthError;
use teamtask_shared::auth::session::SessionError;
use teamtask_shared::error::ErrorEnvelope;
use teamtask_shared::models::StoreError;

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Bad request (400)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Unauthorized (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Forbidden (403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Not found (404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Conflict (409), e.g. duplicate email or team name
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal server error (500); the detail is logged, never returned
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::NotFound(_) => "not_found",
            ApiError::Conflict(_) => "conflict",
            ApiError::InternalError(_) => "internal_error",
        }
    }

    pub fn internal(err: impl std::fmt::Display) -> Self {
        ApiError::InternalError(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let kind = self.kind();

        let message = match self {
            ApiError::InternalError(detail) => {
                tracing::error!(error = %detail, "Internal error");
                "internal server error".to_string()
            }
            ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg) => msg,
        };

        (status, Json(ErrorEnvelope::new(kind, message))).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => ApiError::NotFound(format!("{} not found", what)),
            StoreError::Conflict(msg) => ApiError::Conflict(msg),
            StoreError::InvalidInput(msg) => ApiError::BadRequest(msg),
            StoreError::Revoked | StoreError::Expired => {
                ApiError::Unauthorized("invalid or expired refresh token".to_string())
            }
            StoreError::Database(e) => ApiError::InternalError(format!("database error: {}", e)),
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::InvalidInput(msg) => ApiError::BadRequest(msg),
            SessionError::EmailTaken => ApiError::Conflict(err.to_string()),
            SessionError::InvalidCredentials | SessionError::InvalidRefreshToken => {
                ApiError::Unauthorized(err.to_string())
            }
            SessionError::Store(e) => e.into(),
            SessionError::Token(_) | SessionError::Password(_) | SessionError::Blocking(_) => {
                ApiError::internal(err)
            }
        }
    }
}

impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::Store(e) => e.into(),
            other => ApiError::Forbidden(other.to_string()),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingContext => ApiError::internal(err),
            other => ApiError::Unauthorized(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn envelope(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_envelope_shape() {
        let (status, body) = envelope(ApiError::Conflict("team name already taken".to_string())).await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["type"], "conflict");
        assert_eq!(body["error"]["message"], "team name already taken");
    }

    #[tokio::test]
    async fn test_internal_detail_not_exposed() {
        let (status, body) = envelope(ApiError::InternalError("connection refused on 10.0.0.5".to_string())).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["type"], "internal_error");
        assert_eq!(body["error"]["message"], "internal server error");
    }

    #[test]
    fn test_store_error_mapping() {
        assert_eq!(ApiError::from(StoreError::NotFound("task")).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::from(StoreError::Conflict("dup".to_string())).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(StoreError::InvalidInput("bad".to_string())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(StoreError::Database(sqlx::Error::PoolTimedOut)).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_authorization_failures_are_forbidden() {
        for err in [AuthzError::NotTeamMember, AuthzError::NotReporter, AuthzError::NotSystemAdmin] {
            assert_eq!(ApiError::from(err).status(), StatusCode::FORBIDDEN);
        }
    }

    #[test]
    fn test_session_errors() {
        assert_eq!(ApiError::from(SessionError::InvalidCredentials).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::from(SessionError::EmailTaken).status(), StatusCode::CONFLICT);
        assert_eq!(
            ApiError::from(SessionError::InvalidInput("invalid email address".to_string())).status(),
            StatusCode::BAD_REQUEST
        );
    }
}
