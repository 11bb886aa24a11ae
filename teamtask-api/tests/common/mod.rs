#![allow(dead_code)]

/// Common test utilities for integration tests
///
/// Builds the full router over an in-memory store with fast password
/// hashing, plus helpers for registering users and calling the API.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use teamtask_api::app::{build_router, AppState, Stores};
use teamtask_api::config::Config;
use teamtask_shared::auth::password::PasswordParams;
use teamtask_shared::memory::InMemoryStore;
use teamtask_shared::models::user::UserType;
use tower::ServiceExt;
use uuid::Uuid;

pub const PASSWORD: &str = "correct-horse-battery";

/// Response captured for assertions
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub body: Value,
}

impl TestResponse {
    /// The `error.type` of an error envelope
    pub fn error_type(&self) -> &str {
        self.body["error"]["type"].as_str().unwrap_or_default()
    }

    /// Value of the `refresh_token` cookie set by this response
    pub fn refresh_cookie(&self) -> Option<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find_map(|v| v.strip_prefix("refresh_token="))
            .map(|rest| rest.split(';').next().unwrap_or_default().to_string())
            .filter(|v| !v.is_empty())
    }
}

/// A logged-in user
pub struct TestUser {
    pub id: Uuid,
    pub email: String,
    pub access_token: String,
    pub refresh_token: String,
}

/// Test context containing the router and its backing store
pub struct TestContext {
    pub store: Arc<InMemoryStore>,
    pub app: Router,
}

impl TestContext {
    pub fn new() -> Self {
        let vars: HashMap<&str, &str> = [
            ("DATABASE_URL", "postgresql://localhost/teamtask_test"),
            ("JWT_ACCESS_SECRET", "integration-access-secret-0123456789"),
            ("JWT_REFRESH_SECRET", "integration-refresh-secret-0123456789"),
            ("APP_ENV", "test"),
        ]
        .into_iter()
        .collect();
        let config = Config::from_source(|key| vars.get(key).map(|v| v.to_string())).unwrap();

        let store = Arc::new(InMemoryStore::new());
        let state = AppState::with_password_params(
            Stores::in_memory(store.clone()),
            None,
            config,
            PasswordParams::insecure_fast(),
        )
        .unwrap();

        Self {
            store,
            app: build_router(state),
        }
    }

    /// Sends a request, optionally with a JSON body, bearer token, and cookie
    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        body: Option<Value>,
        bearer: Option<&str>,
        refresh_cookie: Option<&str>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        if let Some(cookie) = refresh_cookie {
            builder = builder.header(header::COOKIE, format!("refresh_token={}", cookie));
        }

        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
        };

        TestResponse { status, headers, body }
    }

    pub async fn get(&self, uri: &str, user: &TestUser) -> TestResponse {
        self.send("GET", uri, None, Some(&user.access_token), None).await
    }

    pub async fn post(&self, uri: &str, body: Value, user: &TestUser) -> TestResponse {
        self.send("POST", uri, Some(body), Some(&user.access_token), None).await
    }

    pub async fn patch(&self, uri: &str, body: Value, user: &TestUser) -> TestResponse {
        self.send("PATCH", uri, Some(body), Some(&user.access_token), None).await
    }

    pub async fn delete(&self, uri: &str, user: &TestUser) -> TestResponse {
        self.send("DELETE", uri, None, Some(&user.access_token), None).await
    }

    pub async fn register(&self, email: &str) -> TestResponse {
        self.send(
            "POST",
            "/auth/register",
            Some(json!({ "email": email, "password": PASSWORD })),
            None,
            None,
        )
        .await
    }

    pub async fn login(&self, email: &str) -> TestResponse {
        self.send(
            "POST",
            "/auth/login",
            Some(json!({ "email": email, "password": PASSWORD })),
            None,
            None,
        )
        .await
    }

    /// Registers and logs in a user
    pub async fn user(&self, email: &str) -> TestUser {
        let registered = self.register(email).await;
        assert_eq!(registered.status, StatusCode::CREATED, "{}", registered.body);
        self.login_user(email).await
    }

    pub async fn login_user(&self, email: &str) -> TestUser {
        let login = self.login(email).await;
        assert_eq!(login.status, StatusCode::OK, "{}", login.body);

        TestUser {
            id: login.body["user"]["id"].as_str().unwrap().parse().unwrap(),
            email: email.to_string(),
            access_token: login.body["access_token"].as_str().unwrap().to_string(),
            refresh_token: login.refresh_cookie().unwrap(),
        }
    }

    /// Registers a user with the given type and logs them in
    pub async fn user_with_type(&self, email: &str, user_type: UserType) -> TestUser {
        let user = self.user(email).await;
        self.store.set_user_type(user.id, user_type).await.unwrap();
        user
    }

    /// Creates a team owned by `owner`, who must be allowed to create teams
    pub async fn team(&self, owner: &TestUser, name: &str) -> Uuid {
        let resp = self.post("/teams", json!({ "name": name }), owner).await;
        assert_eq!(resp.status, StatusCode::CREATED, "{}", resp.body);
        resp.body["id"].as_str().unwrap().parse().unwrap()
    }

    pub async fn add_member(&self, actor: &TestUser, team_id: Uuid, user: &TestUser, role: &str) -> TestResponse {
        self.post(
            &format!("/teams/{}/members", team_id),
            json!({ "user_id": user.id, "role": role }),
            actor,
        )
        .await
    }

    /// Creates a task due tomorrow
    pub async fn task(&self, reporter: &TestUser, team_id: Uuid, assignee: Option<&TestUser>) -> Uuid {
        let mut body = json!({ "title": "Write report", "due_at": in_hours(24) });
        if let Some(assignee) = assignee {
            body["assignee_id"] = json!(assignee.id);
        }
        let resp = self.post(&format!("/teams/{}/tasks", team_id), body, reporter).await;
        assert_eq!(resp.status, StatusCode::CREATED, "{}", resp.body);
        resp.body["id"].as_str().unwrap().parse().unwrap()
    }
}

/// RFC 3339 timestamp `hours` from now
pub fn in_hours(hours: i64) -> String {
    (Utc::now() + Duration::hours(hours)).to_rfc3339()
}
