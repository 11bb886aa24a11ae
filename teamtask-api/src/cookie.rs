//! Refresh token cookie
//!
//! The raw refresh token travels only in this cookie: `HttpOnly`,
//! `SameSite=Lax`, `Path=/`, seven days, and `Secure` in production.

use axum::http::{header, HeaderMap, HeaderValue};

use crate::error::ApiError;

pub const REFRESH_COOKIE: &str = "refresh_token";

/// Seven days, matching the refresh token lifetime
pub const REFRESH_COOKIE_MAX_AGE_SECS: i64 = 7 * 24 * 60 * 60;

/// `Set-Cookie` value carrying a refresh token
pub fn refresh_cookie(token: &str, secure: bool) -> Result<HeaderValue, ApiError> {
    build(token, REFRESH_COOKIE_MAX_AGE_SECS, secure)
}

/// `Set-Cookie` value that clears the refresh token
pub fn clear_refresh_cookie(secure: bool) -> Result<HeaderValue, ApiError> {
    build("", 0, secure)
}

fn build(value: &str, max_age: i64, secure: bool) -> Result<HeaderValue, ApiError> {
    let mut cookie = format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        REFRESH_COOKIE, value, max_age
    );
    if secure {
        cookie.push_str("; Secure");
    }

    HeaderValue::from_str(&cookie).map_err(ApiError::internal)
}

/// Reads the refresh token from the request's `Cookie` headers
pub fn read_refresh_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == REFRESH_COOKIE)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
