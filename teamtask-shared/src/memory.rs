/// In-memory implementation of every store trait
///
/// Used by unit and integration tests and by `teamtask-api` when it runs
/// without a database. One [`InMemoryStore`] backs all four traits, so a
/// single value can be shared by the credential store, the refresh token
/// ledger, the team store, and the task store.
///
/// Uniqueness rules match the Postgres schema: emails and team names are
/// unique ignoring case, and a team is created together with its owner
/// membership under one lock.
///
/// # Example
///
/// ```
/// use teamtask_shared::memory::InMemoryStore;
/// use teamtask_shared::models::team::TeamStore;
/// use uuid::Uuid;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = InMemoryStore::new();
/// let owner = Uuid::new_v4();
///
/// let team = store.create_team(owner, "Platform").await?;
/// assert!(store.create_team(owner, "PLATFORM").await.is_err());
/// assert!(store.member_role(team.id, owner).await?.is_some());
/// # Ok(())
/// # }
/// ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::refresh_token::{ensure_future_expiry, NewRefreshToken, RefreshToken, RefreshTokenStore};
use crate::models::task::{NewTask, Task, TaskStatus, TaskStore, TaskUpdate};
use crate::models::team::{Team, TeamMember, TeamRole, TeamStore, TEAM_NAME_TAKEN};
use crate::models::user::{NewUser, User, UserStore, UserType, EMAIL_TAKEN};
use crate::models::{StoreError, StoreResult};

#[derive(Debug, Default)]
struct State {
    users: HashMap<Uuid, User>,
    refresh_tokens: HashMap<String, RefreshToken>,
    teams: HashMap<Uuid, Team>,
    members: HashMap<(Uuid, Uuid), TeamMember>,
    tasks: HashMap<Uuid, Task>,
}

/// Shared in-memory store
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Changes a user's type directly, bypassing the API permission checks
    ///
    /// Used to bootstrap admins in tests and local setups.
    pub async fn set_user_type(&self, id: Uuid, user_type: UserType) -> StoreResult<User> {
        self.update_user_type(id, user_type).await
    }

    async fn tasks_matching<F>(&self, predicate: F) -> Vec<Task>
    where
        F: Fn(&Task) -> bool,
    {
        let state = self.state.read().await;
        let mut tasks: Vec<Task> = state.tasks.values().filter(|t| predicate(t)).cloned().collect();
        tasks.sort_by_key(|t| t.due_at);
        tasks
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn create(&self, new_user: NewUser) -> StoreResult<User> {
        let mut state = self.state.write().await;

        let email = new_user.email.to_lowercase();
        if state.users.values().any(|u| u.email == email) {
            return Err(StoreError::Conflict(EMAIL_TAKEN.to_string()));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email,
            password_hash: new_user.password_hash,
            user_type: new_user.user_type,
            created_at: now,
            updated_at: now,
        };
        state.users.insert(user.id, user.clone());

        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let email = email.to_lowercase();
        let state = self.state.read().await;
        Ok(state.users.values().find(|u| u.email == email).cloned())
    }

    async fn update_user_type(&self, id: Uuid, user_type: UserType) -> StoreResult<User> {
        let mut state = self.state.write().await;
        let user = state.users.get_mut(&id).ok_or(StoreError::NotFound("user"))?;
        user.user_type = user_type;
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let user = state.users.get_mut(&id).ok_or(StoreError::NotFound("user"))?;
        user.password_hash = password_hash.to_string();
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn list_all(&self) -> StoreResult<Vec<User>> {
        let state = self.state.read().await;
        let mut users: Vec<User> = state.users.values().cloned().collect();
        users.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(users)
    }
}

#[async_trait]
impl RefreshTokenStore for InMemoryStore {
    async fn issue(&self, token: NewRefreshToken, now: DateTime<Utc>) -> StoreResult<RefreshToken> {
        ensure_future_expiry(token.expires_at, now)?;

        let mut state = self.state.write().await;
        if state.refresh_tokens.contains_key(&token.token_hash) {
            return Err(StoreError::Conflict("refresh token already recorded".to_string()));
        }

        let record = RefreshToken {
            id: Uuid::new_v4(),
            user_id: token.user_id,
            token_hash: token.token_hash,
            issued_at: now,
            expires_at: token.expires_at,
            revoked_at: None,
            user_agent: token.user_agent,
            source_ip: token.source_ip,
        };
        state.refresh_tokens.insert(record.token_hash.clone(), record.clone());

        Ok(record)
    }

    async fn lookup_active(&self, token_hash: &str, now: DateTime<Utc>) -> StoreResult<RefreshToken> {
        self.state
            .read()
            .await
            .refresh_tokens
            .get(token_hash)
            .cloned()
            .ok_or(StoreError::NotFound("refresh token"))?
            .into_active(now)
    }

    async fn revoke(&self, token_hash: &str, now: DateTime<Utc>) -> StoreResult<()> {
        let mut state = self.state.write().await;
        match state.refresh_tokens.get_mut(token_hash) {
            Some(record) if record.revoked_at.is_none() => {
                record.revoked_at = Some(now);
                Ok(())
            }
            _ => Err(StoreError::NotFound("refresh token")),
        }
    }

    async fn revoke_all_for_user(&self, user_id: Uuid, now: DateTime<Utc>) -> StoreResult<u64> {
        let mut state = self.state.write().await;
        let mut revoked = 0;
        for record in state.refresh_tokens.values_mut() {
            if record.user_id == user_id && record.revoked_at.is_none() {
                record.revoked_at = Some(now);
                revoked += 1;
            }
        }
        Ok(revoked)
    }

    async fn purge_expired(&self, cutoff: DateTime<Utc>) -> StoreResult<u64> {
        let mut state = self.state.write().await;
        let before = state.refresh_tokens.len();
        state.refresh_tokens.retain(|_, record| record.expires_at >= cutoff);
        Ok((before - state.refresh_tokens.len()) as u64)
    }
}

#[async_trait]
impl TeamStore for InMemoryStore {
    async fn create_team(&self, owner_id: Uuid, name: &str) -> StoreResult<Team> {
        let mut state = self.state.write().await;

        let lowered = name.to_lowercase();
        if state.teams.values().any(|t| t.name.to_lowercase() == lowered) {
            return Err(StoreError::Conflict(TEAM_NAME_TAKEN.to_string()));
        }

        let now = Utc::now();
        let team = Team {
            id: Uuid::new_v4(),
            name: name.to_string(),
            owner_id,
            created_at: now,
            updated_at: now,
        };
        state.teams.insert(team.id, team.clone());
        state.members.insert(
            (team.id, owner_id),
            TeamMember {
                team_id: team.id,
                user_id: owner_id,
                role: TeamRole::Owner,
                created_at: now,
            },
        );

        Ok(team)
    }

    async fn find_by_id(&self, team_id: Uuid) -> StoreResult<Option<Team>> {
        Ok(self.state.read().await.teams.get(&team_id).cloned())
    }

    async fn upsert_member(&self, team_id: Uuid, user_id: Uuid, role: TeamRole) -> StoreResult<TeamMember> {
        let mut state = self.state.write().await;
        if !state.teams.contains_key(&team_id) {
            return Err(StoreError::NotFound("team"));
        }

        let member = state
            .members
            .entry((team_id, user_id))
            .and_modify(|m| m.role = role)
            .or_insert_with(|| TeamMember {
                team_id,
                user_id,
                role,
                created_at: Utc::now(),
            });

        Ok(member.clone())
    }

    async fn remove_member(&self, team_id: Uuid, user_id: Uuid) -> StoreResult<bool> {
        Ok(self.state.write().await.members.remove(&(team_id, user_id)).is_some())
    }

    async fn member_role(&self, team_id: Uuid, user_id: Uuid) -> StoreResult<Option<TeamRole>> {
        Ok(self
            .state
            .read()
            .await
            .members
            .get(&(team_id, user_id))
            .map(|m| m.role))
    }

    async fn list_members(&self, team_id: Uuid) -> StoreResult<Vec<TeamMember>> {
        let state = self.state.read().await;
        let mut members: Vec<TeamMember> = state
            .members
            .values()
            .filter(|m| m.team_id == team_id)
            .cloned()
            .collect();
        members.sort_by_key(|m| m.created_at);
        Ok(members)
    }

    async fn list_teams_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Team>> {
        let state = self.state.read().await;
        let mut teams: Vec<Team> = state
            .members
            .values()
            .filter(|m| m.user_id == user_id)
            .filter_map(|m| state.teams.get(&m.team_id).cloned())
            .collect();
        teams.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(teams)
    }
}

#[async_trait]
impl TaskStore for InMemoryStore {
    async fn create(&self, task: NewTask) -> StoreResult<Task> {
        let mut state = self.state.write().await;
        if !state.teams.contains_key(&task.team_id) {
            return Err(StoreError::NotFound("team"));
        }

        let now = Utc::now();
        let record = Task {
            id: Uuid::new_v4(),
            team_id: task.team_id,
            title: task.title,
            description: task.description,
            reporter_id: task.reporter_id,
            assignee_id: task.assignee_id,
            due_at: task.due_at,
            reminder_sent_at: None,
            status: TaskStatus::Open,
            created_at: now,
            updated_at: now,
        };
        state.tasks.insert(record.id, record.clone());

        Ok(record)
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Task>> {
        Ok(self.state.read().await.tasks.get(&id).cloned())
    }

    async fn assign(&self, id: Uuid, assignee_id: Uuid) -> StoreResult<Task> {
        let mut state = self.state.write().await;
        let task = state.tasks.get_mut(&id).ok_or(StoreError::NotFound("task"))?;
        task.assignee_id = assignee_id;
        task.updated_at = Utc::now();
        Ok(task.clone())
    }

    async fn update_status(&self, id: Uuid, status: TaskStatus) -> StoreResult<Task> {
        let mut state = self.state.write().await;
        let task = state.tasks.get_mut(&id).ok_or(StoreError::NotFound("task"))?;
        task.status = status;
        task.updated_at = Utc::now();
        Ok(task.clone())
    }

    async fn update_details(&self, id: Uuid, update: TaskUpdate, now: DateTime<Utc>) -> StoreResult<Task> {
        let update = update.validated(now)?;

        let mut state = self.state.write().await;
        let task = state.tasks.get_mut(&id).ok_or(StoreError::NotFound("task"))?;
        if let Some(title) = update.title {
            task.title = title;
        }
        if let Some(description) = update.description {
            task.description = Some(description);
        }
        if let Some(due_at) = update.due_at {
            task.due_at = due_at;
        }
        task.updated_at = now;

        Ok(task.clone())
    }

    async fn delete(&self, id: Uuid) -> StoreResult<()> {
        self.state
            .write()
            .await
            .tasks
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound("task"))
    }

    async fn list_for_team(&self, team_id: Uuid) -> StoreResult<Vec<Task>> {
        Ok(self.tasks_matching(|t| t.team_id == team_id).await)
    }

    async fn list_assigned_in_team(&self, team_id: Uuid, user_id: Uuid) -> StoreResult<Vec<Task>> {
        Ok(self
            .tasks_matching(|t| t.team_id == team_id && t.assignee_id == user_id)
            .await)
    }

    async fn list_reported_in_team(&self, team_id: Uuid, user_id: Uuid) -> StoreResult<Vec<Task>> {
        Ok(self
            .tasks_matching(|t| t.team_id == team_id && t.reporter_id == user_id)
            .await)
    }

    async fn list_by_assignee(&self, user_id: Uuid) -> StoreResult<Vec<Task>> {
        Ok(self.tasks_matching(|t| t.assignee_id == user_id).await)
    }

    async fn list_by_reporter(&self, user_id: Uuid) -> StoreResult<Vec<Task>> {
        Ok(self.tasks_matching(|t| t.reporter_id == user_id).await)
    }

    async fn find_due_for_reminder(&self, from: DateTime<Utc>, before: DateTime<Utc>) -> StoreResult<Vec<Task>> {
        Ok(self
            .tasks_matching(|t| {
                t.due_at > from && t.due_at <= before && t.reminder_sent_at.is_none() && t.status.is_active()
            })
            .await)
    }

    async fn mark_reminder_sent(&self, id: Uuid, when: DateTime<Utc>) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let task = state.tasks.get_mut(&id).ok_or(StoreError::NotFound("task"))?;
        task.reminder_sent_at = Some(when);
        task.updated_at = when;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::refresh::hash_refresh_token;
    use chrono::Duration;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            password_hash: "$argon2id$test".to_string(),
            user_type: UserType::Employee,
        }
    }

    async fn seed_task(store: &InMemoryStore, team_id: Uuid, user: Uuid, due_in: Duration) -> Task {
        TaskStore::create(
            store,
            NewTask {
                team_id,
                title: "Task".to_string(),
                description: None,
                reporter_id: user,
                assignee_id: user,
                due_at: Utc::now() + due_in,
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_update_password_replaces_hash() {
        let store = InMemoryStore::new();
        let user = UserStore::create(&store, new_user("pw@example.com")).await.unwrap();

        store.update_password(user.id, "$argon2id$rotated").await.unwrap();
        let stored = UserStore::find_by_id(&store, user.id).await.unwrap().unwrap();
        assert_eq!(stored.password_hash, "$argon2id$rotated");
        assert!(stored.updated_at >= user.updated_at);

        let missing = store.update_password(Uuid::new_v4(), "$argon2id$x").await;
        assert!(matches!(missing, Err(StoreError::NotFound("user"))));
    }

    #[tokio::test]
    async fn test_email_unique_ignoring_case() {
        let store = InMemoryStore::new();
        UserStore::create(&store, new_user("a@example.com")).await.unwrap();

        let dup = UserStore::create(&store, new_user("A@Example.com")).await;
        assert!(matches!(dup, Err(StoreError::Conflict(_))));

        let found = store.find_by_email("A@EXAMPLE.COM").await.unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn test_list_all_sorted_by_email() {
        let store = InMemoryStore::new();
        UserStore::create(&store, new_user("zed@example.com")).await.unwrap();
        UserStore::create(&store, new_user("amy@example.com")).await.unwrap();

        let emails: Vec<String> = store.list_all().await.unwrap().into_iter().map(|u| u.email).collect();
        assert_eq!(emails, vec!["amy@example.com", "zed@example.com"]);
    }

    #[tokio::test]
    async fn test_update_unknown_user_type() {
        let store = InMemoryStore::new();
        let result = store.update_user_type(Uuid::new_v4(), UserType::Admin).await;
        assert!(matches!(result, Err(StoreError::NotFound("user"))));
    }

    #[tokio::test]
    async fn test_refresh_ledger_lifecycle() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        let user_id = Uuid::new_v4();

        let token = NewRefreshToken::from_raw(user_id, "raw", now + Duration::days(7), None, None);
        store.issue(token, now).await.unwrap();

        let hash = hash_refresh_token("raw");
        assert!(store.lookup_active(&hash, now).await.is_ok());

        store.revoke(&hash, now).await.unwrap();
        assert!(matches!(store.lookup_active(&hash, now).await, Err(StoreError::Revoked)));
        assert!(matches!(store.revoke(&hash, now).await, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_refresh_ledger_rejects_past_expiry_and_reports_expired() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        let user_id = Uuid::new_v4();

        let stale = NewRefreshToken::from_raw(user_id, "stale", now, None, None);
        assert!(matches!(store.issue(stale, now).await, Err(StoreError::InvalidInput(_))));

        let short = NewRefreshToken::from_raw(user_id, "short", now + Duration::seconds(10), None, None);
        store.issue(short, now).await.unwrap();

        let later = now + Duration::seconds(11);
        let result = store.lookup_active(&hash_refresh_token("short"), later).await;
        assert!(matches!(result, Err(StoreError::Expired)));
    }

    #[tokio::test]
    async fn test_purge_expired_keeps_live_rows() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        let user_id = Uuid::new_v4();

        store
            .issue(NewRefreshToken::from_raw(user_id, "old", now + Duration::seconds(1), None, None), now)
            .await
            .unwrap();
        store
            .issue(NewRefreshToken::from_raw(user_id, "new", now + Duration::days(7), None, None), now)
            .await
            .unwrap();

        let purged = store.purge_expired(now + Duration::hours(1)).await.unwrap();
        assert_eq!(purged, 1);
        assert!(store.lookup_active(&hash_refresh_token("new"), now).await.is_ok());
    }

    #[tokio::test]
    async fn test_team_name_unique_ignoring_case() {
        let store = InMemoryStore::new();
        let owner = Uuid::new_v4();

        store.create_team(owner, "Foo").await.unwrap();
        let dup = store.create_team(Uuid::new_v4(), "foo").await;
        assert!(matches!(dup, Err(StoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_member_upsert_and_remove() {
        let store = InMemoryStore::new();
        let owner = Uuid::new_v4();
        let user = Uuid::new_v4();
        let team = store.create_team(owner, "Core").await.unwrap();

        store.upsert_member(team.id, user, TeamRole::Member).await.unwrap();
        let updated = store.upsert_member(team.id, user, TeamRole::Admin).await.unwrap();
        assert_eq!(updated.role, TeamRole::Admin);
        assert_eq!(store.list_members(team.id).await.unwrap().len(), 2);

        assert!(store.remove_member(team.id, user).await.unwrap());
        assert!(!store.remove_member(team.id, user).await.unwrap());
        assert_eq!(store.list_teams_for_user(user).await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_reminder_window() {
        let store = InMemoryStore::new();
        let user = Uuid::new_v4();
        let team = store.create_team(user, "Reminders").await.unwrap();

        let soon = seed_task(&store, team.id, user, Duration::minutes(30)).await;
        seed_task(&store, team.id, user, Duration::hours(5)).await;
        let done = seed_task(&store, team.id, user, Duration::minutes(20)).await;
        store.update_status(done.id, TaskStatus::Done).await.unwrap();

        let now = Utc::now();
        let due = store.find_due_for_reminder(now, now + Duration::hours(1)).await.unwrap();
        assert_eq!(due.iter().map(|t| t.id).collect::<Vec<_>>(), vec![soon.id]);

        store.mark_reminder_sent(soon.id, now).await.unwrap();
        let due = store.find_due_for_reminder(now, now + Duration::hours(1)).await.unwrap();
        assert!(due.is_empty());
    }

    #[tokio::test]
    async fn test_task_listing_filters() {
        let store = InMemoryStore::new();
        let reporter = Uuid::new_v4();
        let assignee = Uuid::new_v4();
        let team = store.create_team(reporter, "Lists").await.unwrap();

        let task = seed_task(&store, team.id, reporter, Duration::hours(10)).await;
        store.assign(task.id, assignee).await.unwrap();

        assert_eq!(store.list_by_assignee(assignee).await.unwrap().len(), 1);
        assert_eq!(store.list_by_reporter(reporter).await.unwrap().len(), 1);
        assert_eq!(store.list_assigned_in_team(team.id, reporter).await.unwrap().len(), 0);
        assert_eq!(store.list_reported_in_team(team.id, reporter).await.unwrap().len(), 1);

        TaskStore::delete(&store, task.id).await.unwrap();
        assert!(matches!(TaskStore::delete(&store, task.id).await, Err(StoreError::NotFound("task"))));
    }
}
