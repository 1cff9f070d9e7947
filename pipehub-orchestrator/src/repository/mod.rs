//! Repository Module
//!
//! Data access layer for the orchestrator.
//! Each store is a trait with a Postgres implementation so the sync pass,
//! services and handlers can run against in-memory stores in tests.

pub mod application;
#[cfg(test)]
pub mod memory;
pub mod pipeline;
pub mod user;

use thiserror::Error;

// Re-export traits and implementations
pub use application::{ApplicationStore, PgApplicationStore};
pub use pipeline::{PgPipelineStore, PipelineStore};
pub use user::{PgUserStore, UserStore};

/// Repository error type
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// A write violated a uniqueness constraint
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A stored value could not be mapped onto the domain model
    #[error("Invalid stored data: {0}")]
    InvalidData(String),

    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                RepositoryError::Conflict(db.message().to_string())
            }
            _ => RepositoryError::Database(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, RepositoryError>;
