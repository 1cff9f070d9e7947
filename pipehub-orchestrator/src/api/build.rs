//! Build API Handlers
//!
//! Build, parameter and log endpoints, forwarded to the pipeline's provider.

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use pipehub_core::domain::build::{Build, BuildDetail, JobLog};
use pipehub_core::domain::parameter::PipelineParameter;
use pipehub_core::dto::build::StartBuild;

use crate::api::AppState;
use crate::api::error::ApiResult;
use crate::service::access::AccessSnapshot;
use crate::service::build_service;

/// GET /pipelines/{id}/builds
pub async fn list_builds(
    State(state): State<AppState>,
    Extension(access): Extension<AccessSnapshot>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Vec<Build>>> {
    let builds = build_service::list_builds(state.builds(), &access, id).await?;
    Ok(Json(builds))
}

/// POST /pipelines/{id}/builds
/// Start a build with the given parameter map
pub async fn start_build(
    State(state): State<AppState>,
    Extension(access): Extension<AccessSnapshot>,
    Path(id): Path<i64>,
    Json(req): Json<StartBuild>,
) -> ApiResult<StatusCode> {
    build_service::start_build(state.builds(), &access, id, req).await?;
    Ok(StatusCode::ACCEPTED)
}

/// GET /pipelines/{id}/builds/{build_id}
pub async fn get_build(
    State(state): State<AppState>,
    Extension(access): Extension<AccessSnapshot>,
    Path((id, build_id)): Path<(i64, String)>,
) -> ApiResult<Json<BuildDetail>> {
    let detail = build_service::get_build(state.builds(), &access, id, &build_id).await?;
    Ok(Json(detail))
}

/// POST /pipelines/{id}/builds/{build_id}/retry
pub async fn retry_build(
    State(state): State<AppState>,
    Extension(access): Extension<AccessSnapshot>,
    Path((id, build_id)): Path<(i64, String)>,
) -> ApiResult<StatusCode> {
    build_service::retry_build(state.builds(), &access, id, &build_id).await?;
    Ok(StatusCode::ACCEPTED)
}

/// POST /pipelines/{id}/builds/{build_id}/cancel
pub async fn cancel_build(
    State(state): State<AppState>,
    Extension(access): Extension<AccessSnapshot>,
    Path((id, build_id)): Path<(i64, String)>,
) -> ApiResult<StatusCode> {
    build_service::cancel_build(state.builds(), &access, id, &build_id).await?;
    Ok(StatusCode::ACCEPTED)
}

/// GET /pipelines/{id}/parameters
pub async fn get_parameters(
    State(state): State<AppState>,
    Extension(access): Extension<AccessSnapshot>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Vec<PipelineParameter>>> {
    let parameters = build_service::get_parameters(state.builds(), &access, id).await?;
    Ok(Json(parameters))
}

/// GET /pipelines/{id}/jobs/{job_id}/log
pub async fn get_job_log(
    State(state): State<AppState>,
    Extension(access): Extension<AccessSnapshot>,
    Path((id, job_id)): Path<(i64, String)>,
) -> ApiResult<Json<JobLog>> {
    let log = build_service::get_job_log(state.builds(), &access, id, &job_id).await?;
    Ok(Json(log))
}
