//! Error types for the remote sync crate.

use thiserror::Error;

/// Result type alias for remote sync operations.
pub type Result<T> = std::result::Result<T, ConnectError>;

/// Errors raised at the remote API boundary.
///
/// The offline store absorbs these during `get`/`set`; they propagate only
/// to direct client callers such as the login/registration flow, which have
/// no offline fallback.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Structured error response from the backend
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Authentication error (malformed token)
    #[error("Authentication error: {0}")]
    Auth(String),
}

impl ConnectError {
    /// Create an API error from status and message
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Create an auth error
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    /// HTTP status if this is an API error.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}
