//! Build Service
//!
//! Request-path operations forwarded to the provider behind a pipeline.
//! Every call resolves pipeline → application → client afresh, so
//! credential changes apply on the next request.

use pipehub_client::{ClientManager, ProviderClient};
use pipehub_core::domain::build::{Build, BuildDetail, JobLog};
use pipehub_core::domain::parameter::PipelineParameter;
use pipehub_core::domain::pipeline::Pipeline;
use pipehub_core::dto::build::{ConnectionStatus, StartBuild};

use super::access::AccessSnapshot;
use super::pipeline::get_pipeline;
use super::{Result, ServiceError};
use crate::repository::{ApplicationStore, PipelineStore};

/// Stores and clients a build operation needs
#[derive(Clone, Copy)]
pub struct BuildContext<'a> {
    pub applications: &'a dyn ApplicationStore,
    pub pipelines: &'a dyn PipelineStore,
    pub clients: &'a ClientManager,
}

impl BuildContext<'_> {
    /// Resolve a visible pipeline and a client for its application
    async fn open(
        &self,
        access: &AccessSnapshot,
        pipeline_id: i64,
    ) -> Result<(Pipeline, Box<dyn ProviderClient>)> {
        let pipeline = get_pipeline(self.pipelines, access, pipeline_id).await?;

        let application = self
            .applications
            .find_by_id(pipeline.application_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Application {}", pipeline.application_id)))?;

        let client = self.clients.create_client(&application)?;
        Ok((pipeline, client))
    }
}

pub async fn list_builds(
    ctx: BuildContext<'_>,
    access: &AccessSnapshot,
    pipeline_id: i64,
) -> Result<Vec<Build>> {
    let (pipeline, client) = ctx.open(access, pipeline_id).await?;
    Ok(client.list_builds(&pipeline).await?)
}

pub async fn get_build(
    ctx: BuildContext<'_>,
    access: &AccessSnapshot,
    pipeline_id: i64,
    build_id: &str,
) -> Result<BuildDetail> {
    let (pipeline, client) = ctx.open(access, pipeline_id).await?;
    Ok(client.get_build(&pipeline, build_id).await?)
}

pub async fn start_build(
    ctx: BuildContext<'_>,
    access: &AccessSnapshot,
    pipeline_id: i64,
    req: StartBuild,
) -> Result<()> {
    if req.parameters.keys().any(|k| k.trim().is_empty()) {
        return Err(ServiceError::Validation(
            "Parameter names cannot be empty".to_string(),
        ));
    }

    let (pipeline, client) = ctx.open(access, pipeline_id).await?;
    client.start_build(&pipeline, &req.parameters).await?;

    tracing::info!(
        "User {} started a build of pipeline {} ({} parameter(s))",
        access.user_id,
        pipeline.id,
        req.parameters.len()
    );
    Ok(())
}

pub async fn retry_build(
    ctx: BuildContext<'_>,
    access: &AccessSnapshot,
    pipeline_id: i64,
    build_id: &str,
) -> Result<()> {
    let (pipeline, client) = ctx.open(access, pipeline_id).await?;
    client.retry_build(&pipeline, build_id).await?;

    tracing::info!(
        "User {} retried build {} of pipeline {}",
        access.user_id,
        build_id,
        pipeline.id
    );
    Ok(())
}

pub async fn cancel_build(
    ctx: BuildContext<'_>,
    access: &AccessSnapshot,
    pipeline_id: i64,
    build_id: &str,
) -> Result<()> {
    let (pipeline, client) = ctx.open(access, pipeline_id).await?;
    client.cancel_build(&pipeline, build_id).await?;

    tracing::info!(
        "User {} canceled build {} of pipeline {}",
        access.user_id,
        build_id,
        pipeline.id
    );
    Ok(())
}

/// Parameter schema with protected values blanked
pub async fn get_parameters(
    ctx: BuildContext<'_>,
    access: &AccessSnapshot,
    pipeline_id: i64,
) -> Result<Vec<PipelineParameter>> {
    let (pipeline, client) = ctx.open(access, pipeline_id).await?;
    let parameters = client.get_parameters(&pipeline).await?;

    Ok(parameters.into_iter().map(PipelineParameter::redacted).collect())
}

pub async fn get_job_log(
    ctx: BuildContext<'_>,
    access: &AccessSnapshot,
    pipeline_id: i64,
    job_id: &str,
) -> Result<JobLog> {
    let (pipeline, client) = ctx.open(access, pipeline_id).await?;
    Ok(client.get_job_log(&pipeline, job_id).await?)
}

/// Probe an application's provider (admin only).
///
/// An unreachable provider is a connection error, not a `false` status.
pub async fn check_connection(
    ctx: BuildContext<'_>,
    access: &AccessSnapshot,
    application_id: i64,
) -> Result<ConnectionStatus> {
    access.require_admin()?;

    let application = ctx
        .applications
        .find_by_id(application_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Application {}", application_id)))?;

    let client = ctx.clients.create_client(&application)?;
    if !client.check_connection().await {
        tracing::warn!(
            "Connection check failed for application {} ({})",
            application.name,
            application.id
        );
        return Err(ServiceError::Connection(format!(
            "Application {} is not accessible",
            application.name
        )));
    }

    Ok(ConnectionStatus {
        application_id,
        connected: true,
    })
}
