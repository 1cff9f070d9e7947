//! Pipeline API Handlers
//!
//! HTTP endpoints for the pipeline mirror.

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use pipehub_core::domain::pipeline::Pipeline;
use pipehub_core::dto::pipeline::CreatePipeline;

use crate::api::AppState;
use crate::api::error::ApiResult;
use crate::service::access::AccessSnapshot;
use crate::service::pipeline_service;

/// GET /pipelines
/// List the pipelines visible to the caller
pub async fn list_pipelines(
    State(state): State<AppState>,
    Extension(access): Extension<AccessSnapshot>,
) -> ApiResult<Json<Vec<Pipeline>>> {
    tracing::debug!("Listing pipelines for user {}", access.user_id);

    let pipelines = pipeline_service::list_pipelines(state.pipelines.as_ref(), &access).await?;

    Ok(Json(pipelines))
}

/// POST /pipelines
/// Create a pipeline by hand
pub async fn create_pipeline(
    State(state): State<AppState>,
    Extension(access): Extension<AccessSnapshot>,
    Json(req): Json<CreatePipeline>,
) -> ApiResult<(StatusCode, Json<Pipeline>)> {
    tracing::info!("Creating pipeline: {}", req.name);

    let pipeline = pipeline_service::create_pipeline(
        state.pipelines.as_ref(),
        state.applications.as_ref(),
        &access,
        req,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(pipeline)))
}

/// GET /pipelines/{id}
pub async fn get_pipeline(
    State(state): State<AppState>,
    Extension(access): Extension<AccessSnapshot>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Pipeline>> {
    tracing::debug!("Getting pipeline: {}", id);

    let pipeline = pipeline_service::get_pipeline(state.pipelines.as_ref(), &access, id).await?;

    Ok(Json(pipeline))
}
