//! One-way hashing of raw refresh tokens
//!
//! The ledger is keyed by this digest. Raw refresh tokens only ever live in
//! the client's cookie.

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of a raw refresh token
pub fn hash_refresh_token(raw_token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw_token.as_bytes());
    format!("{:x}", hasher.finalize())
}
