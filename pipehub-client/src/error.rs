//! Error types for provider clients

use thiserror::Error;

/// Result type alias for provider operations
pub type Result<T> = std::result::Result<T, ProviderError>;

/// Errors that can occur while talking to an external CI/CD provider
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Provider unreachable, timed out or refused the request
    #[error("Failed to connect to provider: {0}")]
    Connection(String),

    /// Provider answered with a non-success status code
    #[error("Provider error (status {status}): {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Body or reason returned by the provider
        message: String,
    },

    /// Provider answered but the payload could not be shaped
    #[error("Invalid data received from provider: {0}")]
    Data(String),

    /// The upstream resource (build, job, workflow) does not exist
    #[error("Upstream resource not found: {0}")]
    NotFound(String),

    /// The caller asked for something the provider cannot express
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The client could not be built for this application
    #[error("Client configuration error: {0}")]
    Configuration(String),
}

impl ProviderError {
    /// Create a status error from code and message
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    /// Whether this error is an upstream 404
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Whether the provider refused access (missing scope or permission)
    pub fn is_forbidden(&self) -> bool {
        matches!(self, Self::Status { status, .. } if *status == 401 || *status == 403)
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return Self::Data(err.to_string());
        }
        if err.is_timeout() {
            return Self::Connection(format!("request timed out: {}", err));
        }
        Self::Connection(err.to_string())
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        Self::Data(err.to_string())
    }
}
