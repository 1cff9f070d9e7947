//! Service Module
//!
//! Business logic layer for the orchestrator.
//! Services resolve the caller's access, then orchestrate between the stores
//! and the provider clients.

pub mod access;
pub mod build;
pub mod pipeline;

use pipehub_client::ProviderError;
use thiserror::Error;

use crate::repository::RepositoryError;

// Re-export for convenience
pub use access as access_service;
pub use build as build_service;
pub use pipeline as pipeline_service;

/// Service error type
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Local resource absent, or not visible to the caller
    #[error("{0} not found")]
    NotFound(String),

    /// The provider has no such build or job
    #[error("Upstream resource not found: {0}")]
    UpstreamNotFound(String),

    #[error("{0}")]
    Connection(String),

    #[error("{0}")]
    Data(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Authentication required")]
    Unauthorized,

    #[error("Administrator access required")]
    Forbidden,

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Configuration(String),

    #[error("Database error: {0}")]
    Database(#[source] RepositoryError),
}

impl From<RepositoryError> for ServiceError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Conflict(msg) => ServiceError::Conflict(msg),
            other => ServiceError::Database(other),
        }
    }
}

impl From<ProviderError> for ServiceError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Connection(_) | ProviderError::Status { .. } => {
                ServiceError::Connection(err.to_string())
            }
            ProviderError::Data(_) => ServiceError::Data(err.to_string()),
            ProviderError::NotFound(what) => ServiceError::UpstreamNotFound(what),
            ProviderError::InvalidRequest(msg) => ServiceError::Validation(msg),
            ProviderError::Configuration(msg) => ServiceError::Configuration(msg),
        }
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;
