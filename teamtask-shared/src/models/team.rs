/// Team and team membership models
///
/// A team is always created together with its owner's membership row inside
/// one transaction, so a team never exists without an owner member.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE teams (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     name VARCHAR(100) NOT NULL,
///     owner_id UUID NOT NULL REFERENCES users(id),
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// CREATE UNIQUE INDEX teams_name_lower_key ON teams (lower(name));
///
/// CREATE TABLE team_members (
///     team_id UUID NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     role team_role NOT NULL DEFAULT 'member',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     PRIMARY KEY (team_id, user_id)
/// );
/// ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::str::FromStr;
use uuid::Uuid;

use super::{conflict_on_unique, StoreError, StoreResult};

/// Maximum team name length, in characters
pub const MAX_TEAM_NAME_LEN: usize = 100;

/// Message used for duplicate team name conflicts
pub const TEAM_NAME_TAKEN: &str = "team name already taken";

/// Role of a user within a team
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "team_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TeamRole {
    /// Team creator
    Owner,

    /// Can add and remove members
    Admin,

    /// Regular member
    Member,
}

impl TeamRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TeamRole::Owner => "owner",
            TeamRole::Admin => "admin",
            TeamRole::Member => "member",
        }
    }

    /// Owners and admins can add and remove members
    pub fn can_manage_members(&self) -> bool {
        matches!(self, TeamRole::Owner | TeamRole::Admin)
    }
}

impl FromStr for TeamRole {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "owner" => Ok(TeamRole::Owner),
            "admin" => Ok(TeamRole::Admin),
            "member" => Ok(TeamRole::Member),
            _ => Err(StoreError::InvalidInput(
                "invalid role, expected one of owner, admin, member".to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Team {
    pub id: Uuid,

    /// Unique, case-insensitively
    pub name: String,

    pub owner_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TeamMember {
    pub team_id: Uuid,
    pub user_id: Uuid,
    pub role: TeamRole,
    pub created_at: DateTime<Utc>,
}

/// Trims a team name and checks its length
pub fn normalize_team_name(raw: &str) -> StoreResult<String> {
    let name = raw.trim();
    let len = name.chars().count();
    if len == 0 || len > MAX_TEAM_NAME_LEN {
        return Err(StoreError::InvalidInput(format!(
            "team name must be between 1 and {} characters",
            MAX_TEAM_NAME_LEN
        )));
    }
    Ok(name.to_string())
}

/// Team and membership store
#[async_trait]
pub trait TeamStore: Send + Sync {
    /// Creates a team and its owner membership atomically
    ///
    /// Fails with `Conflict` when the name is taken, ignoring case.
    async fn create_team(&self, owner_id: Uuid, name: &str) -> StoreResult<Team>;

    async fn find_by_id(&self, team_id: Uuid) -> StoreResult<Option<Team>>;

    /// Adds a member, or updates the role of an existing one
    async fn upsert_member(&self, team_id: Uuid, user_id: Uuid, role: TeamRole) -> StoreResult<TeamMember>;

    /// Removes a member, returning whether a row was deleted
    async fn remove_member(&self, team_id: Uuid, user_id: Uuid) -> StoreResult<bool>;

    /// The user's role in the team, if they are a member
    async fn member_role(&self, team_id: Uuid, user_id: Uuid) -> StoreResult<Option<TeamRole>>;

    async fn list_members(&self, team_id: Uuid) -> StoreResult<Vec<TeamMember>>;

    async fn list_teams_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Team>>;
}

/// Postgres-backed [`TeamStore`]
#[derive(Debug, Clone)]
pub struct PgTeamStore {
    pool: PgPool,
}

impl PgTeamStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TeamStore for PgTeamStore {
    async fn create_team(&self, owner_id: Uuid, name: &str) -> StoreResult<Team> {
        let mut tx = self.pool.begin().await?;

        let team = sqlx::query_as::<_, Team>(
            r#"
            INSERT INTO teams (name, owner_id)
            VALUES ($1, $2)
            RETURNING id, name, owner_id, created_at, updated_at
            "#,
        )
        .bind(name)
        .bind(owner_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| conflict_on_unique(e, TEAM_NAME_TAKEN))?;

        sqlx::query(
            r#"
            INSERT INTO team_members (team_id, user_id, role)
            VALUES ($1, $2, 'owner')
            "#,
        )
        .bind(team.id)
        .bind(owner_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(team)
    }

    async fn find_by_id(&self, team_id: Uuid) -> StoreResult<Option<Team>> {
        let team = sqlx::query_as::<_, Team>(
            r#"
            SELECT id, name, owner_id, created_at, updated_at
            FROM teams
            WHERE id = $1
            "#,
        )
        .bind(team_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(team)
    }

    async fn upsert_member(&self, team_id: Uuid, user_id: Uuid, role: TeamRole) -> StoreResult<TeamMember> {
        let member = sqlx::query_as::<_, TeamMember>(
            r#"
            INSERT INTO team_members (team_id, user_id, role)
            VALUES ($1, $2, $3)
            ON CONFLICT (team_id, user_id) DO UPDATE SET role = EXCLUDED.role
            RETURNING team_id, user_id, role, created_at
            "#,
        )
        .bind(team_id)
        .bind(user_id)
        .bind(role)
        .fetch_one(&self.pool)
        .await?;

        Ok(member)
    }

    async fn remove_member(&self, team_id: Uuid, user_id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM team_members WHERE team_id = $1 AND user_id = $2")
            .bind(team_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn member_role(&self, team_id: Uuid, user_id: Uuid) -> StoreResult<Option<TeamRole>> {
        let role = sqlx::query_scalar::<_, TeamRole>(
            "SELECT role FROM team_members WHERE team_id = $1 AND user_id = $2",
        )
        .bind(team_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(role)
    }

    async fn list_members(&self, team_id: Uuid) -> StoreResult<Vec<TeamMember>> {
        let members = sqlx::query_as::<_, TeamMember>(
            r#"
            SELECT team_id, user_id, role, created_at
            FROM team_members
            WHERE team_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(team_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(members)
    }

    async fn list_teams_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Team>> {
        let teams = sqlx::query_as::<_, Team>(
            r#"
            SELECT t.id, t.name, t.owner_id, t.created_at, t.updated_at
            FROM teams t
            JOIN team_members m ON m.team_id = t.id
            WHERE m.user_id = $1
            ORDER BY t.name
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(teams)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_team_role_can_manage_members() {
        assert!(TeamRole::Owner.can_manage_members());
        assert!(TeamRole::Admin.can_manage_members());
        assert!(!TeamRole::Member.can_manage_members());
    }

    #[test]
    fn test_team_role_parse() {
        assert_eq!("Admin".parse::<TeamRole>().unwrap(), TeamRole::Admin);
        assert!("viewer".parse::<TeamRole>().is_err());
    }

    #[test]
    fn test_normalize_team_name() {
        assert_eq!(normalize_team_name("  Platform  ").unwrap(), "Platform");
        assert!(normalize_team_name("   ").is_err());
        assert!(normalize_team_name(&"x".repeat(101)).is_err());
        assert!(normalize_team_name(&"x".repeat(100)).is_ok());
    }
}
