/// Refresh token ledger
///
/// Every issued refresh token has exactly one row here, keyed by the SHA-256
/// hex digest of the raw token. The raw token is never stored.
///
/// # Lifecycle
///
/// ```text
/// active ──revoke──> revoked
///   │
///   └──time──> expired ──purge_expired──> deleted
/// ```
///
/// A revoked or expired row never validates. Rows are only deleted by the
/// retention sweep in the worker.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE refresh_tokens (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     token_hash VARCHAR(64) NOT NULL UNIQUE,
///     issued_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     expires_at TIMESTAMPTZ NOT NULL,
///     revoked_at TIMESTAMPTZ,
///     user_agent TEXT,
///     source_ip VARCHAR(64)
/// );
/// ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::{conflict_on_unique, StoreError, StoreResult};
use crate::auth::refresh::hash_refresh_token;

/// Persisted refresh token record
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,

    /// Hex SHA-256 of the raw token
    pub token_hash: String,

    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,

    /// Set once the token has been rotated out or logged out
    pub revoked_at: Option<DateTime<Utc>>,

    pub user_agent: Option<String>,
    pub source_ip: Option<String>,
}

impl RefreshToken {
    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Classifies this record for `lookup_active`
    ///
    /// Revocation is reported ahead of expiry.
    pub fn into_active(self, now: DateTime<Utc>) -> StoreResult<Self> {
        if self.is_revoked() {
            return Err(StoreError::Revoked);
        }
        if self.is_expired_at(now) {
            return Err(StoreError::Expired);
        }
        Ok(self)
    }
}

/// Input for recording a newly issued refresh token
#[derive(Debug, Clone)]
pub struct NewRefreshToken {
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub user_agent: Option<String>,
    pub source_ip: Option<String>,
}

impl NewRefreshToken {
    /// Builds the ledger input from a raw token, hashing it immediately
    pub fn from_raw(
        user_id: Uuid,
        raw_token: &str,
        expires_at: DateTime<Utc>,
        user_agent: Option<String>,
        source_ip: Option<String>,
    ) -> Self {
        Self {
            user_id,
            token_hash: hash_refresh_token(raw_token),
            expires_at,
            user_agent,
            source_ip,
        }
    }
}

/// Refresh token ledger
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    /// Records an issued token
    ///
    /// Fails with `InvalidInput` unless `expires_at` is strictly after `now`.
    async fn issue(&self, token: NewRefreshToken, now: DateTime<Utc>) -> StoreResult<RefreshToken>;

    /// Returns the active record for a hash
    ///
    /// Fails with `NotFound`, `Revoked`, or `Expired`.
    async fn lookup_active(&self, token_hash: &str, now: DateTime<Utc>) -> StoreResult<RefreshToken>;

    /// Revokes one token, failing with `NotFound` if absent or already revoked
    async fn revoke(&self, token_hash: &str, now: DateTime<Utc>) -> StoreResult<()>;

    /// Revokes every active token for a user, returning how many changed
    async fn revoke_all_for_user(&self, user_id: Uuid, now: DateTime<Utc>) -> StoreResult<u64>;

    /// Deletes rows whose expiry is before `cutoff`, returning how many
    async fn purge_expired(&self, cutoff: DateTime<Utc>) -> StoreResult<u64>;
}

pub(crate) fn ensure_future_expiry(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> StoreResult<()> {
    if expires_at <= now {
        return Err(StoreError::InvalidInput(
            "refresh token expiry must be in the future".to_string(),
        ));
    }
    Ok(())
}

/// Postgres-backed [`RefreshTokenStore`]
#[derive(Debug, Clone)]
pub struct PgRefreshTokenStore {
    pool: PgPool,
}

impl PgRefreshTokenStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RefreshTokenStore for PgRefreshTokenStore {
    async fn issue(&self, token: NewRefreshToken, now: DateTime<Utc>) -> StoreResult<RefreshToken> {
        ensure_future_expiry(token.expires_at, now)?;

        sqlx::query_as::<_, RefreshToken>(
            r#"
            INSERT INTO refresh_tokens (user_id, token_hash, issued_at, expires_at, user_agent, source_ip)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, user_id, token_hash, issued_at, expires_at, revoked_at, user_agent, source_ip
            "#,
        )
        .bind(token.user_id)
        .bind(&token.token_hash)
        .bind(now)
        .bind(token.expires_at)
        .bind(&token.user_agent)
        .bind(&token.source_ip)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "refresh token already recorded"))
    }

    async fn lookup_active(&self, token_hash: &str, now: DateTime<Utc>) -> StoreResult<RefreshToken> {
        sqlx::query_as::<_, RefreshToken>(
            r#"
            SELECT id, user_id, token_hash, issued_at, expires_at, revoked_at, user_agent, source_ip
            FROM refresh_tokens
            WHERE token_hash = $1
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound("refresh token"))?
        .into_active(now)
    }

    async fn revoke(&self, token_hash: &str, now: DateTime<Utc>) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked_at = $2
            WHERE token_hash = $1 AND revoked_at IS NULL
            "#,
        )
        .bind(token_hash)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("refresh token"));
        }

        Ok(())
    }

    async fn revoke_all_for_user(&self, user_id: Uuid, now: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked_at = $2
            WHERE user_id = $1 AND revoked_at IS NULL
            "#,
        )
        .bind(user_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn purge_expired(&self, cutoff: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
