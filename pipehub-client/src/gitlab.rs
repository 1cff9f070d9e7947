//! GitLab client
//!
//! Projects are the pipelines; GitLab pipelines are the builds and their jobs
//! are the stages. Authenticates with a `PRIVATE-TOKEN` header against the
//! REST v4 API (`base_url` points at `.../api/v4`).

use async_trait::async_trait;
use pipehub_core::domain::application::{Application, ProviderType};
use pipehub_core::domain::build::{Build, BuildDetail, BuildStatus, JobLog, Stage};
use pipehub_core::domain::parameter::PipelineParameter;
use pipehub_core::domain::pipeline::Pipeline;
use pipehub_core::dto::pipeline::FetchedPipeline;
use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, HashMap};

use crate::ProviderSettings;
use crate::error::{ProviderError, Result};
use crate::normalize::{
    log_lines, numeric_id, parse_optional_timestamp, parse_parameters_file, parse_timestamp,
    value_to_string,
};
use crate::provider::ProviderClient;
use crate::transport::{HttpTransport, parse_json};

const PAGE_SIZE: usize = 100;
const DEFAULT_BRANCH: &str = "main";

/// Client for one GitLab instance
#[derive(Debug, Clone)]
pub struct GitLabClient {
    http: HttpTransport,
    application_id: i64,
}

impl GitLabClient {
    pub fn new(
        base_url: impl Into<String>,
        token: &str,
        application_id: i64,
        settings: &ProviderSettings,
    ) -> Result<Self> {
        let mut token = HeaderValue::from_str(token)
            .map_err(|_| ProviderError::Configuration("invalid GitLab token".to_string()))?;
        token.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert("private-token", token);

        Ok(Self {
            http: HttpTransport::new(base_url, headers, settings)?,
            application_id,
        })
    }

    pub fn from_application(application: &Application, settings: &ProviderSettings) -> Result<Self> {
        Self::new(
            application.base_url.clone(),
            &application.credentials.secret,
            application.id,
            settings,
        )
    }

    fn project_path(pipeline: &Pipeline) -> Result<String> {
        let project = numeric_id(&pipeline.project_id, "project id")?;
        Ok(format!("projects/{}", project))
    }

    /// Project variables; a token without maintainer access gets none
    async fn variables(&self, project: &str) -> Result<Vec<PipelineParameter>> {
        let variables: Vec<Variable> = match self.http.get_json(&format!("{}/variables", project)).await {
            Ok(variables) => variables,
            Err(e) if e.is_forbidden() || e.is_not_found() => {
                tracing::debug!("Skipping variables of {}: {}", project, e);
                return Ok(vec![]);
            }
            Err(e) => return Err(e),
        };

        Ok(variables
            .into_iter()
            .map(|v| {
                if v.protected || v.masked {
                    PipelineParameter::protected(v.key, "string")
                } else {
                    PipelineParameter::new(v.key, "string", JsonValue::String(v.value))
                }
            })
            .collect())
    }

    /// `parameters.json` at the repository root, when present
    async fn parameters_file(&self, project: &str) -> Result<Vec<PipelineParameter>> {
        let path = format!("{}/repository/files/parameters.json/raw?ref=HEAD", project);
        match self.http.get_text(&path).await {
            Ok(content) => parse_parameters_file(&content),
            Err(ProviderError::NotFound(_)) => Ok(vec![]),
            Err(e) => Err(e),
        }
    }

    async fn post(&self, path: &str) -> Result<()> {
        self.http.send(self.http.request(Method::POST, path)).await?;
        Ok(())
    }
}

#[async_trait]
impl ProviderClient for GitLabClient {
    fn provider_type(&self) -> ProviderType {
        ProviderType::GitLab
    }

    async fn check_connection(&self) -> bool {
        self.http.probe("user").await
    }

    async fn list_pipelines(&self) -> Result<Vec<FetchedPipeline>> {
        let mut pipelines = Vec::new();
        let mut page = 1;

        loop {
            let response = self
                .http
                .get(&format!(
                    "projects?per_page={}&page={}&order_by=id&sort=asc",
                    PAGE_SIZE, page
                ))
                .await?;
            let next = next_page(response.headers());
            let projects: Vec<Project> = parse_json(response).await?;

            pipelines.extend(projects.into_iter().map(|p| {
                FetchedPipeline::new(
                    p.id.to_string(),
                    p.name,
                    self.application_id,
                    ProviderType::GitLab,
                )
            }));

            match next {
                Some(n) if n > page => page = n,
                _ => break,
            }
        }

        tracing::debug!(
            "GitLab {} reported {} project(s)",
            self.http.base_url(),
            pipelines.len()
        );

        Ok(pipelines)
    }

    async fn list_builds(&self, pipeline: &Pipeline) -> Result<Vec<Build>> {
        let project = Self::project_path(pipeline)?;

        let runs_path = format!("{}/pipelines?per_page={}", project, PAGE_SIZE);
        let jobs_path = format!("{}/jobs?per_page={}", project, PAGE_SIZE);

        let (runs, jobs): (Vec<PipelineSummary>, Vec<Job>) = tokio::try_join!(
            self.http.get_json(&runs_path),
            self.http.get_json(&jobs_path),
        )?;

        let mut jobs_by_run: HashMap<i64, Vec<Job>> = HashMap::new();
        for job in jobs {
            jobs_by_run.entry(job.pipeline.id).or_default().push(job);
        }

        runs.into_iter()
            .map(|run| {
                let jobs = jobs_by_run.remove(&run.id).unwrap_or_default();
                to_build(&pipeline.name, run, jobs)
            })
            .collect()
    }

    async fn get_build(&self, pipeline: &Pipeline, build_id: &str) -> Result<BuildDetail> {
        let project = Self::project_path(pipeline)?;
        let run_id = numeric_id(build_id, "pipeline id")?;

        let run_path = format!("{}/pipelines/{}", project, run_id);
        let jobs_path = format!("{}/jobs", run_path);

        let (run, jobs): (PipelineSummary, Vec<Job>) = tokio::try_join!(
            self.http.get_json(&run_path),
            self.http.get_json(&jobs_path),
        )?;

        Ok(BuildDetail {
            build: to_build(&pipeline.name, run, jobs)?,
            log: vec![],
        })
    }

    async fn start_build(
        &self,
        pipeline: &Pipeline,
        parameters: &HashMap<String, JsonValue>,
    ) -> Result<()> {
        let project = Self::project_path(pipeline)?;
        let branch = parameters
            .get("branch")
            .map(value_to_string)
            .filter(|b| !b.is_empty())
            .unwrap_or_else(|| DEFAULT_BRANCH.to_string());

        let request = PipelineRequest {
            variables: parameters
                .iter()
                .filter(|(k, _)| k.as_str() != "branch")
                .map(|(k, v)| VariableInput {
                    key: k.clone(),
                    value: value_to_string(v),
                })
                .collect(),
        };

        self.http
            .send(
                self.http
                    .request(Method::POST, &format!("{}/pipeline", project))
                    .query(&[("ref", branch.as_str())])
                    .json(&request),
            )
            .await?;

        tracing::info!("Started GitLab pipeline for project {} on {}", project, branch);
        Ok(())
    }

    async fn retry_build(&self, pipeline: &Pipeline, build_id: &str) -> Result<()> {
        let project = Self::project_path(pipeline)?;
        let run_id = numeric_id(build_id, "pipeline id")?;

        self.post(&format!("{}/pipelines/{}/retry", project, run_id))
            .await?;
        tracing::info!("Retried GitLab pipeline {} of {}", run_id, project);
        Ok(())
    }

    async fn cancel_build(&self, pipeline: &Pipeline, build_id: &str) -> Result<()> {
        let project = Self::project_path(pipeline)?;
        let run_id = numeric_id(build_id, "pipeline id")?;

        self.post(&format!("{}/pipelines/{}/cancel", project, run_id))
            .await?;
        tracing::info!("Canceled GitLab pipeline {} of {}", run_id, project);
        Ok(())
    }

    async fn get_parameters(&self, pipeline: &Pipeline) -> Result<Vec<PipelineParameter>> {
        let project = Self::project_path(pipeline)?;

        let branches_path = format!("{}/repository/branches", project);

        let (branches, variables, file): (Vec<Branch>, _, _) = tokio::try_join!(
            self.http.get_json(&branches_path),
            self.variables(&project),
            self.parameters_file(&project),
        )?;

        let mut parameters = vec![PipelineParameter::choice(
            "branch",
            branches.into_iter().map(|b| b.name),
        )];
        parameters.extend(variables);
        parameters.extend(file);

        Ok(parameters)
    }

    async fn get_job_log(&self, pipeline: &Pipeline, job_id: &str) -> Result<JobLog> {
        let project = Self::project_path(pipeline)?;
        let job_id = numeric_id(job_id, "job id")?;

        let job_path = format!("{}/jobs/{}", project, job_id);
        let trace_path = format!("{}/trace", job_path);

        let (job, trace): (Job, String) = tokio::try_join!(
            self.http.get_json(&job_path),
            self.http.get_text(&trace_path),
        )?;

        Ok(JobLog {
            id: job.id.to_string(),
            name: job.name,
            status: map_status(&job.status),
            log: log_lines(&trace),
        })
    }
}

/// Page number advertised in `X-Next-Page`; empty on the last page
fn next_page(headers: &HeaderMap) -> Option<u32> {
    headers
        .get("x-next-page")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

/// Shape one GitLab pipeline and its jobs.
///
/// Only the latest job of each stage counts (retried jobs stay listed), and
/// the build duration is the sum of those stage durations.
fn to_build(pipeline_name: &str, run: PipelineSummary, jobs: Vec<Job>) -> Result<Build> {
    let mut latest: BTreeMap<String, Job> = BTreeMap::new();
    for job in jobs {
        match latest.get(&job.stage) {
            Some(current) if current.id >= job.id => {}
            _ => {
                latest.insert(job.stage.clone(), job);
            }
        }
    }

    let mut stage_jobs: Vec<Job> = latest.into_values().collect();
    stage_jobs.sort_by_key(|j| j.id);

    let commit_message = stage_jobs
        .iter()
        .rev()
        .find_map(|j| j.commit.as_ref().map(|c| c.title.clone()));

    let stages: Vec<Stage> = stage_jobs
        .into_iter()
        .map(|job| Stage {
            id: job.id.to_string(),
            name: job.stage,
            status: map_status(&job.status),
            started_at: parse_optional_timestamp(job.started_at.as_deref()),
            duration_seconds: job.duration.unwrap_or(0.0) as i64,
        })
        .collect();

    Ok(Build {
        id: run.id.to_string(),
        name: format!("{} - #{}", pipeline_name, run.id),
        status: map_status(&run.status),
        duration_seconds: stages.iter().map(|s| s.duration_seconds).sum(),
        created_at: parse_timestamp(&run.created_at)?,
        commit_message,
        stages,
    })
}

/// Map a GitLab pipeline or job status
pub(crate) fn map_status(status: &str) -> BuildStatus {
    match status {
        "created" | "waiting_for_resource" | "preparing" | "pending" | "scheduled" => {
            BuildStatus::Pending
        }
        "running" => BuildStatus::Running,
        "success" => BuildStatus::Success,
        "failed" => BuildStatus::Failed,
        "canceled" | "canceling" => BuildStatus::Canceled,
        "skipped" => BuildStatus::Skipped,
        "manual" => BuildStatus::Manual,
        _ => BuildStatus::Unknown,
    }
}

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct Project {
    id: i64,
    name: String,
}

#[derive(Debug, Deserialize)]
struct PipelineSummary {
    id: i64,
    status: String,
    created_at: String,
}

#[derive(Debug, Deserialize)]
struct Job {
    id: i64,
    name: String,
    stage: String,
    status: String,
    started_at: Option<String>,
    duration: Option<f64>,
    pipeline: JobPipeline,
    commit: Option<Commit>,
}

#[derive(Debug, Deserialize)]
struct JobPipeline {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct Commit {
    title: String,
}

#[derive(Debug, Deserialize)]
struct Branch {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Variable {
    key: String,
    #[serde(default)]
    value: String,
    #[serde(default)]
    protected: bool,
    #[serde(default)]
    masked: bool,
}

#[derive(Debug, Serialize)]
struct PipelineRequest {
    variables: Vec<VariableInput>,
}

#[derive(Debug, Serialize)]
struct VariableInput {
    key: String,
    value: String,
}
