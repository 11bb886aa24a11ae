/// Request extractors
///
/// [`ApiJson`] and [`ApiPath`] wrap axum's `Json` and `Path` so rejections
/// render the uniform error envelope instead of axum's plain-text bodies.
/// [`ClientDevice`] collects the user agent and client IP recorded with each
/// refresh token.

use async_trait::async_trait;
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        ConnectInfo, FromRequest, FromRequestParts,
    },
    http::{header, request::Parts, HeaderMap},
};
use std::convert::Infallible;
use std::net::SocketAddr;
use teamtask_shared::auth::session::DeviceInfo;

use crate::error::ApiError;

/// JSON body extractor with enveloped rejections
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Path extractor with enveloped rejections
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

/// User agent and client IP of the caller
#[derive(Debug, Clone, Default)]
pub struct ClientDevice(pub DeviceInfo);

#[async_trait]
impl<S> FromRequestParts<S> for ClientDevice
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|info| info.0);

        Ok(ClientDevice(DeviceInfo {
            user_agent: header_str(&parts.headers, header::USER_AGENT.as_str()).map(str::to_string),
            source_ip: client_ip(&parts.headers, peer),
        }))
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Client IP from proxy headers, falling back to the socket peer
///
/// `X-Forwarded-For` wins (first entry), then `X-Real-IP`.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    if let Some(forwarded) = header_str(headers, "x-forwarded-for") {
        if let Some(first) = forwarded.split(',').map(str::trim).find(|ip| !ip.is_empty()) {
            return Some(first.to_string());
        }
    }

    header_str(headers, "x-real-ip")
        .map(str::to_string)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
}
