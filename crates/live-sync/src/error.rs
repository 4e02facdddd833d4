//! Error types for the live sync crate.

use thiserror::Error;

/// Result type alias for live sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors that can occur while building or feeding the sync client.
///
/// Transport failures of an open stream are not represented here: the
/// connection manager handles them internally with backoff reconnection and
/// never surfaces them to the caller.
#[derive(Debug, Error)]
pub enum SyncError {
    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
