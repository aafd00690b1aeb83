//! Model-service errors.
//!
//! Backends map their native failures into [`LlmError`]. Only these end a
//! conversation turn early; tool and adapter failures travel back to the
//! model as tool results instead.
//!
//! Nothing here is retried. A failed call is reported once.

use serde_json::Value;

/// Why a model-service call failed.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum LlmError {
    /// Transport failure or unexpected status. `status` is `None` when no
    /// response arrived.
    #[error("HTTP error (status={status:?}): {message}")]
    Http {
        /// Response status, if any.
        status: Option<http::StatusCode>,
        /// What went wrong.
        message: String,
    },

    /// The credential was missing or refused (401/403).
    #[error("Authentication error: {0}")]
    Auth(String),

    /// The service rejected the request as malformed (400).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The response body or stream could not be decoded.
    #[error("Response format error: {message}")]
    ResponseFormat {
        /// What could not be decoded.
        message: String,
        /// The offending body, when it is available.
        raw: String,
    },

    /// A value did not satisfy a JSON schema.
    #[error("Schema validation error: {message}")]
    SchemaValidation {
        /// Every violation, joined.
        message: String,
        /// The schema checked against.
        schema: Value,
        /// The rejected value.
        actual: Value,
    },

    /// The call did not finish before its deadline.
    #[error("Operation timed out after {elapsed_ms}ms")]
    Timeout {
        /// Time waited before giving up.
        elapsed_ms: u64,
    },

    /// The model kept requesting tools past the per-turn limit.
    #[error("Turn exceeded {limit} model iterations")]
    IterationLimit {
        /// The configured maximum.
        limit: u32,
    },
}

impl From<serde_json::Error> for LlmError {
    fn from(err: serde_json::Error) -> Self {
        Self::ResponseFormat {
            message: err.to_string(),
            raw: String::new(),
        }
    }
}
