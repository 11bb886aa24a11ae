//! # TeamTask Shared Library
//!
//! This crate contains the domain types, stores, and authentication core used
//! by the TeamTask API server and maintenance worker.
//!
//! ## Module Organization
//!
//! - `models`: Domain models and their store traits (Postgres-backed)
//! - `memory`: In-memory store implementations for tests and local runs
//! - `auth`: Token issuer, session service, bearer guard, and permission checks
//! - `db`: Connection pool and migrations
//! - `error`: The JSON error envelope shared by every HTTP surface

pub mod auth;
pub mod db;
pub mod error;
pub mod memory;
pub mod models;

/// Current version of the TeamTask shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
