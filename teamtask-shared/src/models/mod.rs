/// Domain models and store traits
///
/// Each model module defines its record types, an object-safe async store
/// trait, and the Postgres implementation of that trait. The in-memory
/// implementations of the same traits live in [`crate::memory`].
///
/// # Models
///
/// - [`user`]: User accounts and credential storage
/// - [`refresh_token`]: The refresh token ledger
/// - [`team`]: Teams and team membership
/// - [`task`]: Tasks within a team

pub mod refresh_token;
pub mod task;
pub mod team;
pub mod user;

/// Error returned by every store operation
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Referenced entity does not exist
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Uniqueness violation (duplicate email, duplicate team name)
    #[error("{0}")]
    Conflict(String),

    /// Input rejected before it reached storage
    #[error("{0}")]
    InvalidInput(String),

    /// Refresh token exists but has been revoked
    #[error("refresh token revoked")]
    Revoked,

    /// Refresh token exists but its expiry has passed
    #[error("refresh token expired")]
    Expired,

    /// Underlying database failure
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// SQLSTATE for unique_violation
const UNIQUE_VIOLATION: &str = "23505";

/// Translates a unique violation into [`StoreError::Conflict`]
///
/// Any other error is passed through as [`StoreError::Database`].
pub(crate) fn conflict_on_unique(err: sqlx::Error, message: &str) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
            return StoreError::Conflict(message.to_string());
        }
    }
    StoreError::Database(err)
}
