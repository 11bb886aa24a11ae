/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use teamtask_api::app::{build_router, AppState, Stores};
/// use teamtask_api::config::Config;
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let state = AppState::new(Stores::postgres(pool.clone()), Some(pool), config)?;
/// let app = build_router(state);
/// # Ok(())
/// # }
/// ```

use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::{delete, get, patch, post},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use teamtask_shared::auth::jwt::TokenIssuer;
use teamtask_shared::auth::middleware::require_bearer;
use teamtask_shared::auth::password::PasswordParams;
use teamtask_shared::auth::session::AuthService;
use teamtask_shared::memory::InMemoryStore;
use teamtask_shared::models::refresh_token::{PgRefreshTokenStore, RefreshTokenStore};
use teamtask_shared::models::task::{PgTaskStore, TaskStore};
use teamtask_shared::models::team::{PgTeamStore, TeamStore};
use teamtask_shared::models::user::{PgUserStore, UserStore};
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::config::Config;
use crate::middleware::{security::SecurityHeadersLayer, timeout::request_timeout};
use crate::routes;

/// Store handles used by the handlers
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub refresh_tokens: Arc<dyn RefreshTokenStore>,
    pub teams: Arc<dyn TeamStore>,
    pub tasks: Arc<dyn TaskStore>,
}

impl Stores {
    /// Postgres-backed stores sharing one pool
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            users: Arc::new(PgUserStore::new(pool.clone())),
            refresh_tokens: Arc::new(PgRefreshTokenStore::new(pool.clone())),
            teams: Arc::new(PgTeamStore::new(pool.clone())),
            tasks: Arc::new(PgTaskStore::new(pool)),
        }
    }

    /// All four stores backed by one in-memory store
    pub fn in_memory(store: Arc<InMemoryStore>) -> Self {
        Self {
            users: store.clone(),
            refresh_tokens: store.clone(),
            teams: store.clone(),
            tasks: store,
        }
    }
}

/// Shared application state
///
/// Cloned for each request handler via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub teams: Arc<dyn TeamStore>,
    pub tasks: Arc<dyn TaskStore>,
    pub issuer: Arc<TokenIssuer>,
    pub auth: Arc<AuthService>,

    /// Pool for the health check; `None` when running on in-memory stores
    pub db: Option<PgPool>,

    pub config: Arc<Config>,
}

impl AppState {
    /// Creates application state with production password hashing
    pub fn new(stores: Stores, db: Option<PgPool>, config: Config) -> anyhow::Result<Self> {
        Self::with_password_params(stores, db, config, PasswordParams::default())
    }

    /// Creates application state with explicit Argon2 parameters
    pub fn with_password_params(
        stores: Stores,
        db: Option<PgPool>,
        config: Config,
        params: PasswordParams,
    ) -> anyhow::Result<Self> {
        let issuer = Arc::new(TokenIssuer::new(config.jwt.to_jwt_config())?);

        let auth = AuthService::new(stores.users.clone(), stores.refresh_tokens, issuer.clone())
            .with_policy(config.session_policy)
            .with_password_params(params);

        Ok(Self {
            users: stores.users,
            teams: stores.teams,
            tasks: stores.tasks,
            issuer,
            auth: Arc::new(auth),
            db,
            config: Arc::new(config),
        })
    }

    /// Whether cookies should carry the `Secure` attribute
    pub fn secure_cookies(&self) -> bool {
        self.config.api.production
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── GET  /health
/// ├── /auth
/// │   ├── POST  /register, /login, /refresh, /logout
/// │   ├── POST  /logout-all                         (bearer)
/// │   ├── GET   /users                              (bearer)
/// │   └── PATCH /:user_id/update-usertype           (bearer)
/// ├── /teams                                        (bearer)
/// │   ├── POST, GET /
/// │   ├── GET, POST /:team_id/members
/// │   ├── DELETE    /:team_id/members/:user_id
/// │   ├── POST, GET /:team_id/tasks
/// │   └── GET       /:team_id/tasks/assigned, /:team_id/tasks/reported
/// └── /tasks                                        (bearer)
///     ├── GET /assigned, /reported
///     ├── GET, PATCH, DELETE /:id
///     └── PATCH /:id/assign, /:id/status
/// ```
///
/// # Middleware Stack
///
/// Outermost first: security headers, CORS, compression, tracing, request
/// timeout, then bearer authentication on protected routes.
pub fn build_router(state: AppState) -> Router {
    let bearer = middleware::from_fn_with_state(state.issuer.clone(), require_bearer);

    let public_auth_routes = Router::new()
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login))
        .route("/refresh", post(routes::auth::refresh))
        .route("/logout", post(routes::auth::logout));

    let protected_auth_routes = Router::new()
        .route("/logout-all", post(routes::auth::logout_all))
        .route("/users", get(routes::auth::list_users))
        .route("/:user_id/update-usertype", patch(routes::auth::update_user_type))
        .route_layer(bearer.clone());

    let team_routes = Router::new()
        .route("/", post(routes::teams::create_team).get(routes::teams::list_teams))
        .route(
            "/:team_id/members",
            get(routes::teams::list_members).post(routes::teams::add_member),
        )
        .route("/:team_id/members/:user_id", delete(routes::teams::remove_member))
        .route(
            "/:team_id/tasks",
            post(routes::tasks::create_task).get(routes::tasks::list_team_tasks),
        )
        .route("/:team_id/tasks/assigned", get(routes::tasks::list_team_assigned))
        .route("/:team_id/tasks/reported", get(routes::tasks::list_team_reported))
        .route_layer(bearer.clone());

    let task_routes = Router::new()
        .route("/assigned", get(routes::tasks::list_assigned))
        .route("/reported", get(routes::tasks::list_reported))
        .route(
            "/:id",
            get(routes::tasks::get_task)
                .patch(routes::tasks::update_task)
                .delete(routes::tasks::delete_task),
        )
        .route("/:id/assign", patch(routes::tasks::assign_task))
        .route("/:id/status", patch(routes::tasks::update_status))
        .route_layer(bearer);

    let cors = if state.config.api.cors_origins.iter().any(|o| o == "*") {
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true)
            .max_age(std::time::Duration::from_secs(3600))
    };

    Router::new()
        .route("/health", get(routes::health::health_check))
        .nest("/auth", public_auth_routes.merge(protected_auth_routes))
        .nest("/teams", team_routes)
        .nest("/tasks", task_routes)
        .layer(middleware::from_fn_with_state(
            state.config.api.request_timeout,
            request_timeout,
        ))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}
