/// Authorization guard for Axum
///
/// Extracts the bearer token from the `Authorization` header, validates it
/// with the [`TokenIssuer`], and attaches an [`AuthContext`] to the request.
/// A missing header, a header not of the form `Bearer <token>`, an empty
/// token, and a token that fails validation are all rejected with the same
/// 401 before any handler runs.
///
/// The guard never touches the refresh token ledger. Access tokens are not
/// revocable; their 15 minute lifetime bounds exposure.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use axum::{middleware, routing::get, Router};
/// use teamtask_shared::auth::jwt::TokenIssuer;
/// use teamtask_shared::auth::middleware::{require_bearer, AuthContext};
///
/// async fn protected_handler(auth: AuthContext) -> String {
///     format!("Hello, user {}!", auth.user_id)
/// }
///
/// # fn example(issuer: Arc<TokenIssuer>) {
/// let app: Router = Router::new()
///     .route("/protected", get(protected_handler))
///     .layer(middleware::from_fn_with_state(issuer, require_bearer));
/// # }
/// ```

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use super::jwt::{AccessClaims, JwtError, TokenIssuer};
use crate::error::ErrorEnvelope;
use crate::models::user::UserType;

/// Authenticated identity for the current request
///
/// Inserted into request extensions by [`require_bearer`]. Handlers take it
/// as an argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub email: String,

    /// User type as of token minting. Permission checks that depend on it
    /// re-read the stored user.
    pub user_type: UserType,
}

impl From<AccessClaims> for AuthContext {
    fn from(claims: AccessClaims) -> Self {
        Self {
            user_id: claims.user_id,
            email: claims.email,
            user_type: claims.user_type,
        }
    }
}

/// Error type for the authorization guard
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Header missing, malformed, or carrying an empty token
    #[error("missing or malformed authorization header")]
    MissingCredentials,

    /// Token failed validation
    #[error("invalid or expired access token")]
    InvalidToken(#[source] JwtError),

    /// Handler expected an identity on a route without the guard
    #[error("authentication context missing")]
    MissingContext,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            AuthError::MissingContext => {
                tracing::error!("AuthContext extracted on a route without the bearer guard");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorEnvelope::new("internal_error", "internal server error")),
                )
                    .into_response()
            }
            other => (
                StatusCode::UNAUTHORIZED,
                Json(ErrorEnvelope::new("unauthorized", other.to_string())),
            )
                .into_response(),
        }
    }
}

/// Extracts the token from an `Authorization` header value
///
/// The value must be exactly `Bearer <token>` with a non-empty token.
///
/// # Example
///
/// ```
/// use teamtask_shared::auth::middleware::extract_bearer_token;
///
/// assert_eq!(extract_bearer_token(Some("Bearer abc.def")).unwrap(), "abc.def");
/// assert!(extract_bearer_token(Some("bearer abc")).is_err());
/// assert!(extract_bearer_token(Some("Bearer ")).is_err());
/// assert!(extract_bearer_token(None).is_err());
/// ```
pub fn extract_bearer_token(header_value: Option<&str>) -> Result<&str, AuthError> {
    let token = header_value
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(AuthError::MissingCredentials)?;

    if token.is_empty() || token.contains(char::is_whitespace) {
        return Err(AuthError::MissingCredentials);
    }

    Ok(token)
}

/// Validates a header value and returns the identity it carries
pub fn authenticate(issuer: &TokenIssuer, header_value: Option<&str>) -> Result<AuthContext, AuthError> {
    let token = extract_bearer_token(header_value)?;
    let claims = issuer.validate_access(token).map_err(|e| {
        tracing::debug!(error = %e, "Access token rejected");
        AuthError::InvalidToken(e)
    })?;
    Ok(claims.into())
}

/// Bearer authentication middleware
///
/// Use with `axum::middleware::from_fn_with_state`, passing the shared
/// [`TokenIssuer`].
pub async fn require_bearer(
    State(issuer): State<Arc<TokenIssuer>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let header_value = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let auth_context = authenticate(&issuer, header_value)?;
    req.extensions_mut().insert(auth_context);

    Ok(next.run(req).await)
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or(AuthError::MissingContext)
    }
}
