//! Provider client capability contract

use async_trait::async_trait;
use pipehub_core::domain::application::ProviderType;
use pipehub_core::domain::build::{Build, BuildDetail, JobLog};
use pipehub_core::domain::parameter::PipelineParameter;
use pipehub_core::domain::pipeline::Pipeline;
use pipehub_core::dto::pipeline::FetchedPipeline;
use regex::Regex;
use serde_json::Value as JsonValue;
use std::collections::HashMap;

use crate::error::Result;

/// Operations every external CI/CD client supports.
///
/// Discovery (`list_pipelines*`) feeds the sync pass; the build operations
/// back the request path. Implementations never let raw transport errors
/// escape: failures surface as [`ProviderError`](crate::ProviderError).
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Kind of provider this client talks to
    fn provider_type(&self) -> ProviderType;

    /// Probe the provider with the stored credentials.
    ///
    /// Returns false on any failure instead of erroring.
    async fn check_connection(&self) -> bool;

    /// Enumerate every pipeline visible to the credentials
    async fn list_pipelines(&self) -> Result<Vec<FetchedPipeline>>;

    /// Enumerate pipelines whose name contains a match of `pattern`
    async fn list_pipelines_by_pattern(&self, pattern: &Regex) -> Result<Vec<FetchedPipeline>> {
        let pipelines = self.list_pipelines().await?;
        Ok(filter_by_pattern(pipelines, pattern))
    }

    /// Most recent builds of a pipeline
    async fn list_builds(&self, pipeline: &Pipeline) -> Result<Vec<Build>>;

    /// One build with its stages and execution log
    async fn get_build(&self, pipeline: &Pipeline, build_id: &str) -> Result<BuildDetail>;

    /// Trigger a new build with the given parameters
    async fn start_build(
        &self,
        pipeline: &Pipeline,
        parameters: &HashMap<String, JsonValue>,
    ) -> Result<()>;

    async fn retry_build(&self, pipeline: &Pipeline, build_id: &str) -> Result<()>;

    async fn cancel_build(&self, pipeline: &Pipeline, build_id: &str) -> Result<()>;

    /// Declared inputs of the pipeline; protected values are blanked
    async fn get_parameters(&self, pipeline: &Pipeline) -> Result<Vec<PipelineParameter>>;

    /// Log of a single job inside a build
    async fn get_job_log(&self, pipeline: &Pipeline, job_id: &str) -> Result<JobLog>;
}

/// Keep pipelines whose name contains a match (search, not full match)
pub fn filter_by_pattern(pipelines: Vec<FetchedPipeline>, pattern: &Regex) -> Vec<FetchedPipeline> {
    pipelines
        .into_iter()
        .filter(|p| pattern.is_match(&p.name))
        .collect()
}
