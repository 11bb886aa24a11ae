/// Middleware modules for the API server
///
/// - `security`: Security response headers
/// - `timeout`: Per-request deadline
///
/// Bearer authentication lives in `teamtask_shared::auth::middleware`.

pub mod security;
pub mod timeout;
