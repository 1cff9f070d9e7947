//! API Error Handling
//!
//! Unified error types and conversion for API responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::service::ServiceError;

/// API error type
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    Conflict(String),
    BadGateway(String),
    InternalError(String),
    /// Store failure; the message is logged, never returned
    DatabaseError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::BadGateway(msg) => {
                tracing::warn!("Upstream data error: {}", msg);
                (StatusCode::BAD_GATEWAY, msg)
            }
            ApiError::DatabaseError(msg) => {
                tracing::error!("Database error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        let message = err.to_string();
        match err {
            ServiceError::NotFound(_) | ServiceError::UpstreamNotFound(_) => {
                ApiError::NotFound(message)
            }
            ServiceError::Connection(_) | ServiceError::Validation(_) => {
                ApiError::BadRequest(message)
            }
            ServiceError::Data(_) => ApiError::BadGateway(message),
            ServiceError::Conflict(_) => ApiError::Conflict(message),
            ServiceError::Unauthorized => ApiError::Unauthorized(message),
            ServiceError::Forbidden => ApiError::Forbidden(message),
            ServiceError::Configuration(_) => ApiError::InternalError(message),
            ServiceError::Database(_) => ApiError::DatabaseError(message),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
