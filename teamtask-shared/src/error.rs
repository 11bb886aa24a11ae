/// Uniform error envelope
///
/// Every error leaving the HTTP surface has the same JSON shape:
///
/// ```json
/// { "error": { "type": "forbidden", "message": "not a member of this team" } }
/// ```
///
/// The API error type and the bearer guard both render through this struct so
/// the shape cannot drift between them.

use serde::{Deserialize, Serialize};

/// Outer error envelope
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

/// Error kind and human-readable message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    /// Error kind, e.g. `bad_request` or `unauthorized`
    #[serde(rename = "type")]
    pub kind: String,

    /// Message safe to show to clients
    pub message: String,
}

impl ErrorEnvelope {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorBody {
                kind: kind.into(),
                message: message.into(),
            },
        }
    }
}
