//! Error types for kingdomsync

use thiserror::Error;

/// Main error type for kingdomsync operations
///
/// Fetch failures never escape the synchronizer; they surface here only at
/// the session boundary and in `SyncEvent::FetchFailed` messages.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Transport-level failure (connection refused, reset, DNS, timeout)
    #[error("Network error: {0}")]
    Network(String),

    /// Server answered with a non-2xx status
    #[error("HTTP {status} from {path}")]
    HttpStatus {
        /// Endpoint path that was requested
        path: String,
        /// Status code returned
        status: u16,
    },

    /// Response body was not valid JSON
    #[error("Invalid JSON from {path}: {message}")]
    InvalidJson {
        /// Endpoint path that was requested
        path: String,
        /// Parser message
        message: String,
    },

    /// A resource name did not match any known key
    #[error("Unknown resource: {0}")]
    UnknownResource(String),

    /// A resolve category name did not match any known event
    #[error("Unknown resolve event: {0}")]
    UnknownResolveEvent(String),

    /// The auth collaborator reports an error-bearing or closed session
    #[error("Session error: {0}")]
    Session(String),

    /// A caller-supplied side effect failed before the refresh fetches
    #[error("Side effect failed: {0}")]
    SideEffect(String),

    /// A fixture file could not be loaded
    #[error("Fixture error: {0}")]
    Fixture(String),

    /// General I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error during serialization/deserialization
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SyncError {
    /// Whether this error means the session itself is no longer usable
    pub fn is_session_error(&self) -> bool {
        matches!(self, SyncError::Session(_))
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        SyncError::Network(err.to_string())
    }
}

/// Result type alias using SyncError
pub type SyncResult<T> = Result<T, SyncError>;
