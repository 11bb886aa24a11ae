/// Per-request deadline
///
/// Every request runs under `REQUEST_TIMEOUT_SECS`. When the deadline passes
/// the handler future is dropped, which cancels any store call it was
/// awaiting, and the client gets a 500 `internal_error` envelope.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::time::Duration;

use crate::error::ApiError;

/// Request timeout middleware
///
/// Use with `axum::middleware::from_fn_with_state`, passing the deadline.
pub async fn request_timeout(
    State(limit): State<Duration>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    tokio::time::timeout(limit, next.run(req)).await.map_err(|_| {
        ApiError::InternalError(format!(
            "{} {} exceeded request timeout of {:?}",
            method, path, limit
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::StatusCode, middleware, routing::get, Router};
    use tower::ServiceExt;

    fn app(limit: Duration) -> Router {
        Router::new()
            .route("/fast", get(|| async { "done" }))
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    "late"
                }),
            )
            .layer(middleware::from_fn_with_state(limit, request_timeout))
    }

    #[tokio::test]
    async fn test_fast_request_passes() {
        let response = app(Duration::from_secs(1))
            .oneshot(Request::builder().uri("/fast").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_request_times_out() {
        let response = app(Duration::from_secs(5))
            .oneshot(Request::builder().uri("/slow").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["type"], "internal_error");
    }
}
