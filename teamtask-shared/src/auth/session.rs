/// Session service: registration, login, refresh rotation, and logout
///
/// [`AuthService`] ties the credential store, the token issuer, and the
/// refresh token ledger together.
///
/// # Rotation Protocol
///
/// ```text
/// validate refresh JWT ─> hash ─> lookup_active ─> load user
///   ─> mint new access + refresh ─> revoke old ─> issue new
/// ```
///
/// A stolen refresh token is usable once at most. If two clients race with
/// the same token, only one `revoke` changes a row; the other fails closed.
/// If `revoke` succeeds and `issue` then fails, the user has to log in again.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use teamtask_shared::auth::jwt::{JwtConfig, TokenIssuer};
/// use teamtask_shared::auth::session::{AuthService, Credentials, DeviceInfo};
/// use teamtask_shared::memory::InMemoryStore;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = Arc::new(InMemoryStore::new());
/// let issuer = Arc::new(TokenIssuer::new(JwtConfig::new(
///     "access-secret-at-least-32-bytes-long!!",
///     "refresh-secret-at-least-32-bytes-long!",
/// ))?);
/// let auth = AuthService::new(store.clone(), store, issuer);
///
/// let credentials = Credentials::new("User@Example.com", "password123");
/// auth.register(credentials.clone()).await?;
///
/// let session = auth.login(credentials, DeviceInfo::default()).await?;
/// let rotated = auth.rotate(&session.refresh_token, DeviceInfo::default()).await?;
/// assert_ne!(rotated.refresh_token, session.refresh_token);
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use super::jwt::{JwtError, TokenIssuer};
use super::password::{hash_password, verify_password, PasswordError, PasswordParams};
use super::policy::{enforce_login_policy, SessionPolicy};
use super::refresh::hash_refresh_token;
use crate::models::refresh_token::{NewRefreshToken, RefreshTokenStore};
use crate::models::user::{NewUser, User, UserStore, UserType};
use crate::models::StoreError;

/// Email and password as submitted by a client
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct Credentials {
    #[validate(email(message = "invalid email address"))]
    pub email: String,

    #[validate(length(min = 8, message = "password must be at least 8 characters"))]
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    /// Trims and lowercases the email. The password is left untouched.
    pub fn normalized(self) -> Self {
        Self {
            email: normalize_email(&self.email),
            password: self.password,
        }
    }
}

/// Canonical form of an email address for storage and lookup
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Client fingerprint recorded with each refresh token
#[derive(Debug, Clone, Default)]
pub struct DeviceInfo {
    pub user_agent: Option<String>,
    pub source_ip: Option<String>,
}

/// Tokens handed to a client after login or rotation
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub user: User,
    pub access_token: String,

    /// Access token lifetime in seconds
    pub expires_in: i64,

    /// Raw refresh token, to be placed in the session cookie
    pub refresh_token: String,
    pub refresh_expires_at: DateTime<Utc>,
}

/// Error type for session operations
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Registration input failed validation
    #[error("{0}")]
    InvalidInput(String),

    #[error("email already registered")]
    EmailTaken,

    /// Unknown email, wrong password, or malformed login input
    #[error("invalid email or password")]
    InvalidCredentials,

    /// Refresh token missing, invalid, revoked, expired, or already rotated
    #[error("invalid or expired refresh token")]
    InvalidRefreshToken,

    #[error("token signing failed: {0}")]
    Token(#[from] JwtError),

    #[error("password hashing failed: {0}")]
    Password(#[from] PasswordError),

    #[error("blocking task failed: {0}")]
    Blocking(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Authentication workflows over the credential store and token ledger
pub struct AuthService {
    users: Arc<dyn UserStore>,
    tokens: Arc<dyn RefreshTokenStore>,
    issuer: Arc<TokenIssuer>,
    password_params: PasswordParams,
    policy: SessionPolicy,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        tokens: Arc<dyn RefreshTokenStore>,
        issuer: Arc<TokenIssuer>,
    ) -> Self {
        Self {
            users,
            tokens,
            issuer,
            password_params: PasswordParams::default(),
            policy: SessionPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: SessionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_password_params(mut self, params: PasswordParams) -> Self {
        self.password_params = params;
        self
    }

    pub fn policy(&self) -> SessionPolicy {
        self.policy
    }

    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    /// Registers a new `employee` account
    ///
    /// # Errors
    ///
    /// - `InvalidInput` for a malformed email or short password
    /// - `EmailTaken` if the email exists, ignoring case
    pub async fn register(&self, credentials: Credentials) -> Result<User, SessionError> {
        let credentials = credentials.normalized();
        credentials
            .validate()
            .map_err(|e| SessionError::InvalidInput(first_validation_message(&e)))?;

        let password_hash = self.hash(credentials.password).await?;

        let user = self
            .users
            .create(NewUser {
                email: credentials.email,
                password_hash,
                user_type: UserType::Employee,
            })
            .await
            .map_err(|e| match e {
                StoreError::Conflict(_) => SessionError::EmailTaken,
                other => other.into(),
            })?;

        info!(user_id = %user.id, "User registered");
        Ok(user)
    }

    /// Authenticates a user and opens a new session
    ///
    /// Every credential failure yields the same `InvalidCredentials`.
    pub async fn login(&self, credentials: Credentials, device: DeviceInfo) -> Result<IssuedSession, SessionError> {
        let credentials = credentials.normalized();
        if credentials.validate().is_err() {
            debug!("Login rejected: malformed credentials");
            return Err(SessionError::InvalidCredentials);
        }

        let user = match self.users.find_by_email(&credentials.email).await? {
            Some(user) => user,
            None => {
                debug!("Login rejected: unknown email");
                return Err(SessionError::InvalidCredentials);
            }
        };

        if !self.verify(credentials.password, user.password_hash.clone()).await? {
            debug!(user_id = %user.id, "Login rejected: password mismatch");
            return Err(SessionError::InvalidCredentials);
        }

        let now = Utc::now();
        enforce_login_policy(self.policy, self.tokens.as_ref(), user.id, now).await?;

        let session = self.open_session(user, &device, now).await?;
        info!(user_id = %session.user.id, "User logged in");
        Ok(session)
    }

    /// Exchanges a refresh token for a new access and refresh token pair
    ///
    /// The presented token is revoked and cannot be used again.
    pub async fn rotate(&self, raw_refresh: &str, device: DeviceInfo) -> Result<IssuedSession, SessionError> {
        let claims = self.issuer.validate_refresh(raw_refresh).map_err(|e| {
            warn!(error = %e, "Refresh rejected: token failed validation");
            SessionError::InvalidRefreshToken
        })?;

        let token_hash = hash_refresh_token(raw_refresh);
        let now = Utc::now();

        let record = match self.tokens.lookup_active(&token_hash, now).await {
            Ok(record) => record,
            Err(StoreError::NotFound(_)) => {
                warn!(user_id = %claims.user_id, "Refresh rejected: token not in ledger");
                return Err(SessionError::InvalidRefreshToken);
            }
            Err(StoreError::Revoked) => {
                warn!(user_id = %claims.user_id, "Refresh rejected: token already revoked");
                return Err(SessionError::InvalidRefreshToken);
            }
            Err(StoreError::Expired) => {
                info!(user_id = %claims.user_id, "Refresh rejected: token expired");
                return Err(SessionError::InvalidRefreshToken);
            }
            Err(e) => return Err(e.into()),
        };

        if record.user_id != claims.user_id {
            warn!(
                claimed = %claims.user_id,
                recorded = %record.user_id,
                "Refresh rejected: ledger owner mismatch"
            );
            return Err(SessionError::InvalidRefreshToken);
        }

        let user = self
            .users
            .find_by_id(record.user_id)
            .await?
            .ok_or_else(|| {
                warn!(user_id = %record.user_id, "Refresh rejected: user no longer exists");
                SessionError::InvalidRefreshToken
            })?;

        let access = self
            .issuer
            .mint_access_at(user.id, &user.email, user.user_type, now)?;
        let refresh = self.issuer.mint_refresh_at(user.id, now)?;

        match self.tokens.revoke(&token_hash, now).await {
            Ok(()) => {}
            Err(StoreError::NotFound(_)) => {
                warn!(user_id = %user.id, "Refresh rejected: token revoked concurrently");
                return Err(SessionError::InvalidRefreshToken);
            }
            Err(e) => return Err(e.into()),
        }

        self.tokens
            .issue(
                NewRefreshToken::from_raw(
                    user.id,
                    &refresh.token,
                    refresh.expires_at,
                    device.user_agent,
                    device.source_ip,
                ),
                now,
            )
            .await?;

        debug!(user_id = %user.id, "Refresh token rotated");
        Ok(IssuedSession {
            expires_in: self.issuer.access_ttl_secs(),
            access_token: access.token,
            refresh_token: refresh.token,
            refresh_expires_at: refresh.expires_at,
            user,
        })
    }

    /// Revokes the presented refresh token
    ///
    /// Returns `false` if the token was unknown or already revoked.
    pub async fn logout(&self, raw_refresh: &str) -> Result<bool, SessionError> {
        let token_hash = hash_refresh_token(raw_refresh);
        match self.tokens.revoke(&token_hash, Utc::now()).await {
            Ok(()) => Ok(true),
            Err(StoreError::NotFound(_)) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Revokes every refresh token held by the user
    pub async fn logout_all(&self, user_id: Uuid) -> Result<u64, SessionError> {
        let revoked = self.tokens.revoke_all_for_user(user_id, Utc::now()).await?;
        info!(user_id = %user_id, revoked, "Logged out of all sessions");
        Ok(revoked)
    }

    async fn open_session(&self, user: User, device: &DeviceInfo, now: DateTime<Utc>) -> Result<IssuedSession, SessionError> {
        let access = self
            .issuer
            .mint_access_at(user.id, &user.email, user.user_type, now)?;
        let refresh = self.issuer.mint_refresh_at(user.id, now)?;

        self.tokens
            .issue(
                NewRefreshToken::from_raw(
                    user.id,
                    &refresh.token,
                    refresh.expires_at,
                    device.user_agent.clone(),
                    device.source_ip.clone(),
                ),
                now,
            )
            .await?;

        Ok(IssuedSession {
            expires_in: self.issuer.access_ttl_secs(),
            access_token: access.token,
            refresh_token: refresh.token,
            refresh_expires_at: refresh.expires_at,
            user,
        })
    }

    async fn hash(&self, password: String) -> Result<String, SessionError> {
        let params = self.password_params;
        let hash = tokio::task::spawn_blocking(move || hash_password(&password, &params))
            .await
            .map_err(|e| SessionError::Blocking(e.to_string()))??;
        Ok(hash)
    }

    async fn verify(&self, password: String, hash: String) -> Result<bool, SessionError> {
        let matches = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
            .await
            .map_err(|e| SessionError::Blocking(e.to_string()))??;
        Ok(matches)
    }
}

/// First human-readable message out of a set of validation errors
pub fn first_validation_message(errors: &ValidationErrors) -> String {
    errors
        .field_errors()
        .values()
        .flat_map(|errs| errs.iter())
        .find_map(|e| e.message.as_ref().map(|m| m.to_string()))
        .unwrap_or_else(|| "invalid input".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::JwtConfig;
    use crate::memory::InMemoryStore;
    use crate::models::refresh_token::RefreshToken;
    use crate::models::StoreResult;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Ledger whose `issue` starts failing after a number of successful calls
    struct FailingIssueLedger {
        inner: Arc<InMemoryStore>,
        remaining: AtomicUsize,
    }

    #[async_trait]
    impl RefreshTokenStore for FailingIssueLedger {
        async fn issue(&self, token: NewRefreshToken, now: DateTime<Utc>) -> StoreResult<RefreshToken> {
            let left = self.remaining.load(Ordering::SeqCst);
            if left == 0 {
                return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
            }
            self.remaining.store(left - 1, Ordering::SeqCst);
            self.inner.issue(token, now).await
        }

        async fn lookup_active(&self, token_hash: &str, now: DateTime<Utc>) -> StoreResult<RefreshToken> {
            self.inner.lookup_active(token_hash, now).await
        }

        async fn revoke(&self, token_hash: &str, now: DateTime<Utc>) -> StoreResult<()> {
            self.inner.revoke(token_hash, now).await
        }

        async fn revoke_all_for_user(&self, user_id: Uuid, now: DateTime<Utc>) -> StoreResult<u64> {
            self.inner.revoke_all_for_user(user_id, now).await
        }

        async fn purge_expired(&self, cutoff: DateTime<Utc>) -> StoreResult<u64> {
            self.inner.purge_expired(cutoff).await
        }
    }

    fn service(store: Arc<InMemoryStore>) -> AuthService {
        let issuer = TokenIssuer::new(JwtConfig::new(
            "session-test-access-secret-32-bytes!",
            "session-test-refresh-secret-32-bytes",
        ))
        .unwrap();

        AuthService::new(store.clone(), store, Arc::new(issuer))
            .with_password_params(PasswordParams::insecure_fast())
    }

    #[tokio::test]
    async fn test_register_normalizes_email() {
        let auth = service(Arc::new(InMemoryStore::new()));

        let user = auth
            .register(Credentials::new("  Alice@Example.COM ", "password123"))
            .await
            .unwrap();

        assert_eq!(user.email, "alice@example.com");
        assert_eq!(user.user_type, UserType::Employee);
    }

    #[tokio::test]
    async fn test_register_duplicate_email_ignoring_case() {
        let auth = service(Arc::new(InMemoryStore::new()));
        auth.register(Credentials::new("A@b.com", "password123")).await.unwrap();

        let result = auth.register(Credentials::new("a@b.com", "password456")).await;
        assert!(matches!(result, Err(SessionError::EmailTaken)));
    }

    #[tokio::test]
    async fn test_register_rejects_bad_input() {
        let auth = service(Arc::new(InMemoryStore::new()));

        assert!(matches!(
            auth.register(Credentials::new("not-an-email", "password123")).await,
            Err(SessionError::InvalidInput(_))
        ));
        assert!(matches!(
            auth.register(Credentials::new("a@b.com", "short")).await,
            Err(SessionError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_login_failures_are_indistinguishable() {
        let auth = service(Arc::new(InMemoryStore::new()));
        auth.register(Credentials::new("a@b.com", "password123")).await.unwrap();

        let wrong_password = auth
            .login(Credentials::new("a@b.com", "password999"), DeviceInfo::default())
            .await
            .unwrap_err();
        let unknown_email = auth
            .login(Credentials::new("nobody@b.com", "password123"), DeviceInfo::default())
            .await
            .unwrap_err();

        assert!(matches!(wrong_password, SessionError::InvalidCredentials));
        assert!(matches!(unknown_email, SessionError::InvalidCredentials));
        assert_eq!(wrong_password.to_string(), unknown_email.to_string());
    }

    #[tokio::test]
    async fn test_rotation_is_single_use() {
        let auth = service(Arc::new(InMemoryStore::new()));
        let credentials = Credentials::new("a@b.com", "password123");
        auth.register(credentials.clone()).await.unwrap();

        let session = auth.login(credentials, DeviceInfo::default()).await.unwrap();
        let rotated = auth
            .rotate(&session.refresh_token, DeviceInfo::default())
            .await
            .unwrap();

        assert_ne!(rotated.refresh_token, session.refresh_token);
        assert!(matches!(
            auth.rotate(&session.refresh_token, DeviceInfo::default()).await,
            Err(SessionError::InvalidRefreshToken)
        ));
        assert!(auth.rotate(&rotated.refresh_token, DeviceInfo::default()).await.is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_rotation_has_one_winner() {
        let auth = Arc::new(service(Arc::new(InMemoryStore::new())));
        let credentials = Credentials::new("race@b.com", "password123");
        auth.register(credentials.clone()).await.unwrap();

        for _ in 0..20 {
            let session = auth.login(credentials.clone(), DeviceInfo::default()).await.unwrap();

            let mut racers = tokio::task::JoinSet::new();
            for _ in 0..8 {
                let auth = auth.clone();
                let token = session.refresh_token.clone();
                racers.spawn(async move { auth.rotate(&token, DeviceInfo::default()).await });
            }

            let mut wins = 0;
            while let Some(result) = racers.join_next().await {
                match result.unwrap() {
                    Ok(_) => wins += 1,
                    Err(e) => assert!(matches!(e, SessionError::InvalidRefreshToken), "{}", e),
                }
            }
            assert_eq!(wins, 1);
        }
    }

    #[tokio::test]
    async fn test_failed_reissue_leaves_old_token_revoked() {
        let store = Arc::new(InMemoryStore::new());
        let ledger = Arc::new(FailingIssueLedger {
            inner: store.clone(),
            remaining: AtomicUsize::new(1),
        });
        let issuer = TokenIssuer::new(JwtConfig::new(
            "session-test-access-secret-32-bytes!",
            "session-test-refresh-secret-32-bytes",
        ))
        .unwrap();
        let auth = AuthService::new(store.clone(), ledger, Arc::new(issuer))
            .with_password_params(PasswordParams::insecure_fast());

        let credentials = Credentials::new("a@b.com", "password123");
        let user = auth.register(credentials.clone()).await.unwrap();
        let session = auth.login(credentials, DeviceInfo::default()).await.unwrap();

        let result = auth.rotate(&session.refresh_token, DeviceInfo::default()).await;
        assert!(matches!(result, Err(SessionError::Store(StoreError::Database(_)))));

        assert!(matches!(
            store
                .lookup_active(&hash_refresh_token(&session.refresh_token), Utc::now())
                .await,
            Err(StoreError::Revoked)
        ));
        assert_eq!(store.revoke_all_for_user(user.id, Utc::now()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_login_revokes_previous_session() {
        let auth = service(Arc::new(InMemoryStore::new()));
        let credentials = Credentials::new("a@b.com", "password123");
        auth.register(credentials.clone()).await.unwrap();

        let first = auth.login(credentials.clone(), DeviceInfo::default()).await.unwrap();
        let _second = auth.login(credentials, DeviceInfo::default()).await.unwrap();

        assert!(matches!(
            auth.rotate(&first.refresh_token, DeviceInfo::default()).await,
            Err(SessionError::InvalidRefreshToken)
        ));
    }

    #[tokio::test]
    async fn test_concurrent_policy_keeps_previous_session() {
        let auth = service(Arc::new(InMemoryStore::new())).with_policy(SessionPolicy::ConcurrentSessions);
        let credentials = Credentials::new("a@b.com", "password123");
        auth.register(credentials.clone()).await.unwrap();

        let first = auth.login(credentials.clone(), DeviceInfo::default()).await.unwrap();
        let _second = auth.login(credentials, DeviceInfo::default()).await.unwrap();

        assert!(auth.rotate(&first.refresh_token, DeviceInfo::default()).await.is_ok());
    }

    #[tokio::test]
    async fn test_logout_all_invalidates_refresh() {
        let auth = service(Arc::new(InMemoryStore::new()));
        let credentials = Credentials::new("a@b.com", "password123");
        let user = auth.register(credentials.clone()).await.unwrap();

        let session = auth.login(credentials, DeviceInfo::default()).await.unwrap();
        assert_eq!(auth.logout_all(user.id).await.unwrap(), 1);

        assert!(matches!(
            auth.rotate(&session.refresh_token, DeviceInfo::default()).await,
            Err(SessionError::InvalidRefreshToken)
        ));
    }

    #[tokio::test]
    async fn test_logout_reports_whether_token_was_active() {
        let auth = service(Arc::new(InMemoryStore::new()));
        let credentials = Credentials::new("a@b.com", "password123");
        auth.register(credentials.clone()).await.unwrap();

        let session = auth.login(credentials, DeviceInfo::default()).await.unwrap();
        assert!(auth.logout(&session.refresh_token).await.unwrap());
        assert!(!auth.logout(&session.refresh_token).await.unwrap());
        assert!(!auth.logout("never-issued").await.unwrap());
    }

    #[tokio::test]
    async fn test_access_token_cannot_be_used_to_refresh() {
        let auth = service(Arc::new(InMemoryStore::new()));
        let credentials = Credentials::new("a@b.com", "password123");
        auth.register(credentials.clone()).await.unwrap();

        let session = auth.login(credentials, DeviceInfo::default()).await.unwrap();
        assert!(matches!(
            auth.rotate(&session.access_token, DeviceInfo::default()).await,
            Err(SessionError::InvalidRefreshToken)
        ));
    }

    #[tokio::test]
    async fn test_device_info_recorded() {
        let store = Arc::new(InMemoryStore::new());
        let auth = service(store.clone());
        let credentials = Credentials::new("a@b.com", "password123");
        auth.register(credentials.clone()).await.unwrap();

        let device = DeviceInfo {
            user_agent: Some("curl/8.0".to_string()),
            source_ip: Some("203.0.113.7".to_string()),
        };
        let session = auth.login(credentials, device).await.unwrap();

        let record = store
            .lookup_active(&hash_refresh_token(&session.refresh_token), Utc::now())
            .await
            .unwrap();
        assert_eq!(record.user_agent.as_deref(), Some("curl/8.0"));
        assert_eq!(record.source_ip.as_deref(), Some("203.0.113.7"));
    }
}
