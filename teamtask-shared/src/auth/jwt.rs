/// Token issuer: JWT access and refresh token minting and validation
///
/// Access and refresh tokens are both HS256 JWTs, but are signed with two
/// independent secrets so that one leaked secret cannot forge the other kind
/// of token.
///
/// # Token Types
///
/// - **Access Token**: 15 minutes. Carries `user_id`, `email`, `user_type`.
///   Validated statelessly on every protected request.
/// - **Refresh Token**: 7 days. Carries `user_id` and a random `jti` only.
///   Additionally checked against the refresh token ledger on use.
///
/// # Validation
///
/// Signature, issuer, audience, `exp` and `nbf` are all checked with a 30
/// second leeway. Tokens whose header names any algorithm other than HS256 are
/// rejected.
///
/// # Example
///
/// ```
/// use teamtask_shared::auth::jwt::{JwtConfig, TokenIssuer};
/// use teamtask_shared::models::user::UserType;
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let issuer = TokenIssuer::new(JwtConfig::new(
///     "access-secret-at-least-32-bytes-long!!",
///     "refresh-secret-at-least-32-bytes-long!",
/// ))?;
///
/// let user_id = Uuid::new_v4();
/// let access = issuer.mint_access(user_id, "user@example.com", UserType::Employee)?;
///
/// let claims = issuer.validate_access(&access.token)?;
/// assert_eq!(claims.user_id, user_id);
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::user::UserType;

/// Access token lifetime
pub const ACCESS_TOKEN_TTL_SECS: i64 = 15 * 60;

/// Refresh token lifetime
pub const REFRESH_TOKEN_TTL_SECS: i64 = 7 * 24 * 60 * 60;

/// Allowed clock skew when checking `exp` and `nbf`
pub const DEFAULT_LEEWAY_SECS: u64 = 30;

/// Minimum signing secret length in bytes
pub const MIN_SECRET_LEN: usize = 32;

/// Error type for JWT operations
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    /// Issuer configuration is unusable
    #[error("Invalid JWT configuration: {0}")]
    Config(String),

    /// Failed to sign token
    #[error("Failed to create token: {0}")]
    CreateError(String),

    /// Token has expired
    #[error("Token has expired")]
    Expired,

    /// Signature, issuer, audience, algorithm, or format check failed
    #[error("Invalid token: {0}")]
    Invalid(String),
}

impl From<jsonwebtoken::errors::Error> for JwtError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => JwtError::Expired,
            _ => JwtError::Invalid(err.to_string()),
        }
    }
}

/// Token issuer configuration
///
/// Passed explicitly to [`TokenIssuer::new`] at startup.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Secret for access tokens
    pub access_secret: String,

    /// Secret for refresh tokens, must differ from `access_secret`
    pub refresh_secret: String,

    /// `iss` claim
    pub issuer: String,

    /// `aud` claim
    pub audience: String,

    pub access_ttl: Duration,
    pub refresh_ttl: Duration,

    /// Clock skew tolerance in seconds
    pub leeway_secs: u64,
}

impl JwtConfig {
    /// Creates a configuration with default issuer, audience, and lifetimes
    pub fn new(access_secret: impl Into<String>, refresh_secret: impl Into<String>) -> Self {
        Self {
            access_secret: access_secret.into(),
            refresh_secret: refresh_secret.into(),
            issuer: "teamtask".to_string(),
            audience: "teamtask-frontend".to_string(),
            access_ttl: Duration::seconds(ACCESS_TOKEN_TTL_SECS),
            refresh_ttl: Duration::seconds(REFRESH_TOKEN_TTL_SECS),
            leeway_secs: DEFAULT_LEEWAY_SECS,
        }
    }

    /// Checks secret length and that the two secrets differ
    pub fn validate(&self) -> Result<(), JwtError> {
        if self.access_secret.len() < MIN_SECRET_LEN || self.refresh_secret.len() < MIN_SECRET_LEN {
            return Err(JwtError::Config(format!(
                "signing secrets must be at least {} bytes",
                MIN_SECRET_LEN
            )));
        }
        if self.access_secret == self.refresh_secret {
            return Err(JwtError::Config(
                "access and refresh secrets must differ".to_string(),
            ));
        }
        Ok(())
    }
}

/// Access token claims
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessClaims {
    /// Subject (user ID)
    pub sub: String,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,

    pub user_id: Uuid,
    pub email: String,
    pub user_type: UserType,
}

/// Refresh token claims
///
/// Deliberately carries no profile data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RefreshClaims {
    /// Subject (user ID)
    pub sub: String,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,

    pub user_id: Uuid,

    /// Unique token ID, so two tokens minted in the same second differ
    pub jti: Uuid,
}

/// A signed token and its expiry
#[derive(Debug, Clone)]
pub struct SignedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Mints and validates access and refresh tokens
///
/// Holds no mutable state; share it behind an `Arc`.
pub struct TokenIssuer {
    config: JwtConfig,
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("issuer", &self.config.issuer)
            .field("audience", &self.config.audience)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    /// Creates an issuer after validating the configuration
    ///
    /// # Errors
    ///
    /// Returns `JwtError::Config` if a secret is shorter than
    /// [`MIN_SECRET_LEN`] or both secrets are equal.
    pub fn new(config: JwtConfig) -> Result<Self, JwtError> {
        config.validate()?;

        Ok(Self {
            access_encoding: EncodingKey::from_secret(config.access_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(config.access_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(config.refresh_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(config.refresh_secret.as_bytes()),
            config,
        })
    }

    pub fn config(&self) -> &JwtConfig {
        &self.config
    }

    /// Access token lifetime in seconds, as reported in `expires_in`
    pub fn access_ttl_secs(&self) -> i64 {
        self.config.access_ttl.num_seconds()
    }

    /// Mints an access token issued now
    pub fn mint_access(&self, user_id: Uuid, email: &str, user_type: UserType) -> Result<SignedToken, JwtError> {
        self.mint_access_at(user_id, email, user_type, Utc::now())
    }

    /// Mints an access token with an explicit issue time
    pub fn mint_access_at(
        &self,
        user_id: Uuid,
        email: &str,
        user_type: UserType,
        issued_at: DateTime<Utc>,
    ) -> Result<SignedToken, JwtError> {
        let expires_at = issued_at + self.config.access_ttl;
        let claims = AccessClaims {
            sub: user_id.to_string(),
            iss: self.config.issuer.clone(),
            aud: self.config.audience.clone(),
            iat: issued_at.timestamp(),
            nbf: issued_at.timestamp(),
            exp: expires_at.timestamp(),
            user_id,
            email: email.to_string(),
            user_type,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.access_encoding)
            .map_err(|e| JwtError::CreateError(format!("Token encoding failed: {}", e)))?;

        Ok(SignedToken { token, expires_at })
    }

    /// Mints a refresh token issued now
    pub fn mint_refresh(&self, user_id: Uuid) -> Result<SignedToken, JwtError> {
        self.mint_refresh_at(user_id, Utc::now())
    }

    /// Mints a refresh token with an explicit issue time
    pub fn mint_refresh_at(&self, user_id: Uuid, issued_at: DateTime<Utc>) -> Result<SignedToken, JwtError> {
        let expires_at = issued_at + self.config.refresh_ttl;
        let claims = RefreshClaims {
            sub: user_id.to_string(),
            iss: self.config.issuer.clone(),
            aud: self.config.audience.clone(),
            iat: issued_at.timestamp(),
            nbf: issued_at.timestamp(),
            exp: expires_at.timestamp(),
            user_id,
            jti: Uuid::new_v4(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.refresh_encoding)
            .map_err(|e| JwtError::CreateError(format!("Token encoding failed: {}", e)))?;

        Ok(SignedToken { token, expires_at })
    }

    /// Validates an access token
    ///
    /// # Errors
    ///
    /// - `JwtError::Expired` past `exp` plus leeway
    /// - `JwtError::Invalid` for any other failure
    pub fn validate_access(&self, token: &str) -> Result<AccessClaims, JwtError> {
        let data = decode::<AccessClaims>(token, &self.access_decoding, &self.validation())?;
        Ok(data.claims)
    }

    /// Validates a refresh token's signature and claims
    ///
    /// Ledger state is not consulted here.
    pub fn validate_refresh(&self, token: &str) -> Result<RefreshClaims, JwtError> {
        let data = decode::<RefreshClaims>(token, &self.refresh_decoding, &self.validation())?;
        Ok(data.claims)
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.config.issuer]);
        validation.set_audience(&[&self.config.audience]);
        validation.set_required_spec_claims(&["exp", "nbf", "iss", "aud", "sub"]);
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.leeway = self.config.leeway_secs;
        validation
    }
}
