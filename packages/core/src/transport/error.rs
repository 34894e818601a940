//! Transport Error Types

use thiserror::Error;

/// Errors from the rules-server transport
///
/// Transport failures are never retried by the mutation pipeline; the caller
/// may retry manually. Version conflicts are not errors at this layer - they
/// are a regular [`CommitOutcome`](crate::transport::CommitOutcome) variant.
#[derive(Debug, Error)]
pub enum TransportError {
    /// HTTP request failed (connect, timeout, TLS, ...)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body failed to parse
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Server returned a non-success, non-conflict status
    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    /// Response shape did not match the protocol
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl TransportError {
    /// Create a server error from a status code and body text
    pub fn server(status: u16, message: impl Into<String>) -> Self {
        Self::Server {
            status,
            message: message.into(),
        }
    }

    /// Create an invalid response error
    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }
}

/// Result type for transport operations
pub type Result<T> = std::result::Result<T, TransportError>;
