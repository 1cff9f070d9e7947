//! Application API Handlers

use axum::{
    Extension, Json,
    extract::{Path, State},
};
use pipehub_core::dto::build::ConnectionStatus;

use crate::api::AppState;
use crate::api::error::ApiResult;
use crate::service::access::AccessSnapshot;
use crate::service::build_service;

/// GET /applications/{id}/connection
/// Probe the application's provider with its stored credentials
pub async fn check_connection(
    State(state): State<AppState>,
    Extension(access): Extension<AccessSnapshot>,
    Path(id): Path<i64>,
) -> ApiResult<Json<ConnectionStatus>> {
    tracing::info!("Checking connection of application {}", id);

    let status = build_service::check_connection(state.builds(), &access, id).await?;

    Ok(Json(status))
}
