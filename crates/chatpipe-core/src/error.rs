//! Error types for `chatpipe` core library.

use thiserror::Error;

/// Result type alias using `chatpipe` Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for `chatpipe` operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Rules file could not be read or parsed
    #[error("Failed to load rules from {path}: {reason}")]
    Rules { path: String, reason: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
