/// Login session policy
///
/// Controls what happens to a user's existing refresh tokens when they log
/// in again. The default is one active session per user: a successful login
/// revokes every refresh token the user already holds before issuing the new
/// one. The policy is applied by [`enforce_login_policy`] and is independent
/// of refresh rotation.
///
/// # Example
///
/// ```
/// use teamtask_shared::auth::policy::SessionPolicy;
///
/// let policy: SessionPolicy = "concurrent".parse().unwrap();
/// assert!(!policy.revokes_prior_sessions());
/// assert!(SessionPolicy::default().revokes_prior_sessions());
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::models::refresh_token::RefreshTokenStore;
use crate::models::StoreResult;

/// What a new login does to existing sessions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPolicy {
    /// Revoke all prior refresh tokens on login
    #[default]
    SingleActiveSession,

    /// Leave prior refresh tokens active
    ConcurrentSessions,
}

impl SessionPolicy {
    pub fn revokes_prior_sessions(&self) -> bool {
        matches!(self, SessionPolicy::SingleActiveSession)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionPolicy::SingleActiveSession => "single",
            SessionPolicy::ConcurrentSessions => "concurrent",
        }
    }
}

/// Error for an unrecognized policy name
#[derive(Debug, thiserror::Error)]
#[error("unknown session policy '{0}', expected 'single' or 'concurrent'")]
pub struct UnknownSessionPolicy(pub String);

impl FromStr for SessionPolicy {
    type Err = UnknownSessionPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single" | "single_active_session" => Ok(SessionPolicy::SingleActiveSession),
            "concurrent" | "concurrent_sessions" => Ok(SessionPolicy::ConcurrentSessions),
            other => Err(UnknownSessionPolicy(other.to_string())),
        }
    }
}

/// Applies the login policy for a user who just authenticated
///
/// Returns the number of refresh tokens revoked.
pub async fn enforce_login_policy(
    policy: SessionPolicy,
    ledger: &dyn RefreshTokenStore,
    user_id: Uuid,
    now: DateTime<Utc>,
) -> StoreResult<u64> {
    if !policy.revokes_prior_sessions() {
        return Ok(0);
    }

    let revoked = ledger.revoke_all_for_user(user_id, now).await?;
    if revoked > 0 {
        tracing::info!(user_id = %user_id, revoked, "Revoked prior sessions on login");
    }
    Ok(revoked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;
    use crate::models::refresh_token::NewRefreshToken;
    use crate::models::StoreError;
    use chrono::Duration;

    async fn seed(store: &InMemoryStore, user_id: Uuid, raw: &str) {
        let now = Utc::now();
        store
            .issue(
                NewRefreshToken::from_raw(user_id, raw, now + Duration::days(7), None, None),
                now,
            )
            .await
            .unwrap();
    }

    #[test]
    fn test_parse_policy() {
        assert_eq!("single".parse::<SessionPolicy>().unwrap(), SessionPolicy::SingleActiveSession);
        assert_eq!("Concurrent".parse::<SessionPolicy>().unwrap(), SessionPolicy::ConcurrentSessions);
        assert!("sometimes".parse::<SessionPolicy>().is_err());
    }

    #[tokio::test]
    async fn test_single_session_revokes_prior_tokens() {
        let store = InMemoryStore::new();
        let user_id = Uuid::new_v4();
        seed(&store, user_id, "phone").await;
        seed(&store, user_id, "laptop").await;

        let revoked = enforce_login_policy(SessionPolicy::SingleActiveSession, &store, user_id, Utc::now())
            .await
            .unwrap();
        assert_eq!(revoked, 2);

        let hash = crate::auth::refresh::hash_refresh_token("phone");
        assert!(matches!(
            store.lookup_active(&hash, Utc::now()).await,
            Err(StoreError::Revoked)
        ));
    }

    #[tokio::test]
    async fn test_concurrent_sessions_leave_tokens_active() {
        let store = InMemoryStore::new();
        let user_id = Uuid::new_v4();
        seed(&store, user_id, "phone").await;

        let revoked = enforce_login_policy(SessionPolicy::ConcurrentSessions, &store, user_id, Utc::now())
            .await
            .unwrap();
        assert_eq!(revoked, 0);

        let hash = crate::auth::refresh::hash_refresh_token("phone");
        assert!(store.lookup_active(&hash, Utc::now()).await.is_ok());
    }

    #[tokio::test]
    async fn test_policy_only_touches_that_user() {
        let store = InMemoryStore::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        seed(&store, alice, "alice-token").await;
        seed(&store, bob, "bob-token").await;

        enforce_login_policy(SessionPolicy::SingleActiveSession, &store, alice, Utc::now())
            .await
            .unwrap();

        let hash = crate::auth::refresh::hash_refresh_token("bob-token");
        assert!(store.lookup_active(&hash, Utc::now()).await.is_ok());
    }
}
