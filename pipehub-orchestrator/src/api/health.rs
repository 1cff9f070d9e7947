//! Health Check API Handler
//!
//! Liveness endpoint for monitoring; outside the authenticated layer.

use axum::{http::StatusCode, response::IntoResponse};

/// GET /health
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
