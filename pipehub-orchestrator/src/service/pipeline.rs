//! Pipeline Service
//!
//! Business logic for the pipeline mirror as seen by one caller.

use pipehub_core::domain::pipeline::Pipeline;
use pipehub_core::dto::pipeline::CreatePipeline;

use super::access::AccessSnapshot;
use super::{Result, ServiceError};
use crate::repository::{ApplicationStore, PipelineStore};

/// List the pipelines the caller may see
pub async fn list_pipelines(
    pipelines: &dyn PipelineStore,
    access: &AccessSnapshot,
) -> Result<Vec<Pipeline>> {
    if access.is_admin() {
        return Ok(pipelines.list_all().await?);
    }

    if access.pipeline_ids.is_empty() {
        return Ok(vec![]);
    }

    let mut ids: Vec<i64> = access.pipeline_ids.iter().copied().collect();
    ids.sort_unstable();

    Ok(pipelines.list_by_ids(&ids).await?)
}

/// Get a pipeline by ID.
///
/// A pipeline the caller may not see is reported exactly like a missing one.
pub async fn get_pipeline(
    pipelines: &dyn PipelineStore,
    access: &AccessSnapshot,
    id: i64,
) -> Result<Pipeline> {
    let not_found = || ServiceError::NotFound(format!("Pipeline {}", id));

    if !access.can_see(id) {
        tracing::debug!("User {} has no access to pipeline {}", access.user_id, id);
        return Err(not_found());
    }

    pipelines.find_by_id(id).await?.ok_or_else(not_found)
}

/// Create a pipeline by hand (admin only)
pub async fn create_pipeline(
    pipelines: &dyn PipelineStore,
    applications: &dyn ApplicationStore,
    access: &AccessSnapshot,
    req: CreatePipeline,
) -> Result<Pipeline> {
    access.require_admin()?;

    let req = normalize_pipeline_request(req)?;

    if applications.find_by_id(req.application_id).await?.is_none() {
        return Err(ServiceError::Validation(format!(
            "Application {} does not exist",
            req.application_id
        )));
    }

    let pipeline = pipelines.create(req).await.map_err(|e| {
        tracing::warn!("Manual pipeline create rejected: {}", e);
        ServiceError::from(e)
    })?;

    tracing::info!(
        "Pipeline created: {} ({}) for application {}",
        pipeline.name,
        pipeline.id,
        pipeline.application_id
    );

    Ok(pipeline)
}

// =============================================================================
// Validation
// =============================================================================

fn normalize_pipeline_request(req: CreatePipeline) -> Result<CreatePipeline> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(ServiceError::Validation(
            "Pipeline name cannot be empty".to_string(),
        ));
    }

    if name.len() > 255 {
        return Err(ServiceError::Validation(
            "Pipeline name is too long (max 255 characters)".to_string(),
        ));
    }

    let project_id = req.project_id.trim();
    if project_id.is_empty() {
        return Err(ServiceError::Validation(
            "Pipeline project_id cannot be empty".to_string(),
        ));
    }

    Ok(CreatePipeline {
        name: name.to_string(),
        application_id: req.application_id,
        project_id: project_id.to_string(),
    })
}
