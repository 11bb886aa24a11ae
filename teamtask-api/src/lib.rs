//! # TeamTask API Server Library
//!
//! HTTP surface for teams and tasks: registration and sessions, team
//! membership, and task assignment.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration management
//! - `cookie`: Refresh token cookie handling
//! - `error`: Error handling and HTTP response mapping
//! - `extract`: Request extractors with enveloped rejections
//! - `middleware`: Security headers and request timeout
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod cookie;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod routes;
