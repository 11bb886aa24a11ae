/// User model and credential store
///
/// Users are created on registration with the `employee` type. Only an admin
/// may change another user's type afterwards.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     email VARCHAR(255) NOT NULL,
///     password_hash VARCHAR(255) NOT NULL,
///     user_type user_type NOT NULL DEFAULT 'employee',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// CREATE UNIQUE INDEX users_email_lower_key ON users (lower(email));
/// ```
///
/// # Example
///
/// ```no_run
/// use teamtask_shared::models::user::{NewUser, PgUserStore, UserStore, UserType};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), Box<dyn std::error::Error>> {
/// let store = PgUserStore::new(pool);
///
/// let user = store
///     .create(NewUser {
///         email: "user@example.com".to_string(),
///         password_hash: "$argon2id$...".to_string(),
///         user_type: UserType::Employee,
///     })
///     .await?;
///
/// let found = store.find_by_email("user@example.com").await?;
/// assert_eq!(found.map(|u| u.id), Some(user.id));
/// # Ok(())
/// # }
/// ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::str::FromStr;
use uuid::Uuid;

use super::{conflict_on_unique, StoreError, StoreResult};

/// Message used for duplicate email conflicts
pub const EMAIL_TAKEN: &str = "email already registered";

/// System-wide user type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UserType {
    /// Default type for new registrations
    Employee,

    /// May create teams
    TaskManager,

    /// May create teams and change other users' types
    Admin,
}

impl UserType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserType::Employee => "employee",
            UserType::TaskManager => "task_manager",
            UserType::Admin => "admin",
        }
    }

    /// Admins and task managers can create teams
    pub fn can_create_teams(&self) -> bool {
        matches!(self, UserType::Admin | UserType::TaskManager)
    }

    /// Only admins can change user types
    pub fn can_manage_user_types(&self) -> bool {
        matches!(self, UserType::Admin)
    }
}

/// Error for an unrecognized user type string
#[derive(Debug, thiserror::Error)]
#[error("invalid user_type '{0}', expected one of employee, task_manager, admin")]
pub struct UnknownUserType(pub String);

impl FromStr for UserType {
    type Err = UnknownUserType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "employee" => Ok(UserType::Employee),
            "task_manager" => Ok(UserType::TaskManager),
            "admin" => Ok(UserType::Admin),
            other => Err(UnknownUserType(other.to_string())),
        }
    }
}

/// User account
///
/// `password_hash` is an Argon2id PHC string and is never serialized.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    /// Unique user ID
    pub id: Uuid,

    /// Email address, stored lowercase
    pub email: String,

    /// Argon2id password hash
    #[serde(skip_serializing, default)]
    pub password_hash: String,

    /// System-wide user type
    pub user_type: UserType,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a user
///
/// `email` must already be normalized (trimmed, lowercase).
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub user_type: UserType,
}

/// Credential store
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Creates a user, failing with `Conflict` when the email is taken
    async fn create(&self, new_user: NewUser) -> StoreResult<User>;

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;

    /// Looks up a user by email, case-insensitively
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    /// Changes a user's type, failing with `NotFound` for unknown users
    async fn update_user_type(&self, id: Uuid, user_type: UserType) -> StoreResult<User>;

    async fn update_password(&self, id: Uuid, password_hash: &str) -> StoreResult<()>;

    /// Lists every user ordered by email
    async fn list_all(&self) -> StoreResult<Vec<User>>;
}

/// Postgres-backed [`UserStore`]
#[derive(Debug, Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create(&self, new_user: NewUser) -> StoreResult<User> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password_hash, user_type)
            VALUES (lower($1), $2, $3)
            RETURNING id, email, password_hash, user_type, created_at, updated_at
            "#,
        )
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .bind(new_user.user_type)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, EMAIL_TAKEN))
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, user_type, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, user_type, created_at, updated_at
            FROM users
            WHERE lower(email) = lower($1)
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn update_user_type(&self, id: Uuid, user_type: UserType) -> StoreResult<User> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET user_type = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING id, email, password_hash, user_type, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(user_type)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound("user"))
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(password_hash)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("user"));
        }

        Ok(())
    }

    async fn list_all(&self) -> StoreResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, user_type, created_at, updated_at
            FROM users
            ORDER BY email
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_type_parse() {
        assert_eq!("admin".parse::<UserType>().unwrap(), UserType::Admin);
        assert_eq!(" Task_Manager ".parse::<UserType>().unwrap(), UserType::TaskManager);
        assert!("superuser".parse::<UserType>().is_err());
    }

    #[test]
    fn test_user_type_permissions() {
        assert!(UserType::Admin.can_create_teams());
        assert!(UserType::TaskManager.can_create_teams());
        assert!(!UserType::Employee.can_create_teams());

        assert!(UserType::Admin.can_manage_user_types());
        assert!(!UserType::TaskManager.can_manage_user_types());
    }

    #[test]
    fn test_user_type_serde_matches_as_str() {
        for t in [UserType::Employee, UserType::TaskManager, UserType::Admin] {
            let json = serde_json::to_string(&t).unwrap();
            assert_eq!(json, format!("\"{}\"", t.as_str()));
        }
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let user = User {
            id: Uuid::new_v4(),
            email: "a@b.com".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            user_type: UserType::Employee,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["user_type"], "employee");
    }
}
