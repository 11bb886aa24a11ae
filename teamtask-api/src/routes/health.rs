/// Health check endpoint
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
///
/// # Response
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "database": "connected",
///   "pool": { "active_connections": 1, "idle_connections": 4, "total_connections": 5 }
/// }
/// ```
///
/// `database` is `connected`, `disconnected` (status `degraded`), or
/// `in_memory` when the server runs without Postgres, in which case `pool`
/// is omitted.

use axum::{extract::State, Json};
use serde::Serialize;
use teamtask_shared::db::pool::{get_pool_stats, health_check as database_health_check, PoolStats};

use crate::app::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub database: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool: Option<PoolStats>,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = match &state.db {
        Some(pool) => match database_health_check(pool).await {
            Ok(()) => "connected",
            Err(e) => {
                tracing::warn!(error = %e, "Database health check failed");
                "disconnected"
            }
        },
        None => "in_memory",
    };

    let status = if database == "disconnected" { "degraded" } else { "healthy" };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: database.to_string(),
        pool: state.db.as_ref().map(get_pool_stats),
    })
}
