//! GitHub Actions client
//!
//! Every workflow of every repository visible to the token is a pipeline,
//! named `[repo] workflow` and keyed by the repository id. Workflow runs are
//! the builds and their jobs are the stages.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use futures::future::try_join_all;
use pipehub_core::domain::application::{Application, ProviderType};
use pipehub_core::domain::build::{Build, BuildDetail, BuildStatus, JobLog, Stage};
use pipehub_core::domain::parameter::PipelineParameter;
use pipehub_core::domain::pipeline::Pipeline;
use pipehub_core::dto::pipeline::FetchedPipeline;
use reqwest::Method;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;

use crate::ProviderSettings;
use crate::error::{ProviderError, Result};
use crate::normalize::{
    log_lines, numeric_id, parse_optional_timestamp, parse_parameters_file, parse_timestamp,
    seconds_between, value_to_string,
};
use crate::provider::ProviderClient;
use crate::transport::HttpTransport;

const PAGE_SIZE: usize = 100;
const RUNS_PER_PAGE: usize = 20;
const DEFAULT_BRANCH: &str = "main";

/// Client for github.com or a GitHub Enterprise API root
#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: HttpTransport,
    application_id: i64,
}

impl GitHubClient {
    pub fn new(
        base_url: impl Into<String>,
        token: &str,
        application_id: i64,
        settings: &ProviderSettings,
    ) -> Result<Self> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| ProviderError::Configuration("invalid GitHub token".to_string()))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));

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

    async fn workflows(&self, repo_id: i64) -> Result<Vec<Workflow>> {
        let list: Option<WorkflowList> = self
            .http
            .get_json_optional(&format!("repositories/{}/actions/workflows", repo_id))
            .await?;
        Ok(list.map(|l| l.workflows).unwrap_or_default())
    }

    /// Resolve the workflow behind a `[repo] workflow` pipeline
    async fn find_workflow(&self, pipeline: &Pipeline) -> Result<(String, Workflow)> {
        let repo = repository_path(pipeline)?;
        let name = workflow_name(&pipeline.name)?;

        let list: WorkflowList = self
            .http
            .get_json(&format!("{}/actions/workflows", repo))
            .await?;

        let workflow = list
            .workflows
            .into_iter()
            .find(|w| w.name == name)
            .ok_or_else(|| ProviderError::NotFound(format!("workflow '{}'", name)))?;

        Ok((repo, workflow))
    }

    /// Fetch a run through its pipeline.
    ///
    /// A run of another workflow in the same repository is reported as
    /// missing, so one pipeline's builds are never reachable through another.
    async fn pipeline_run(&self, pipeline: &Pipeline, run_id: i64) -> Result<(String, WorkflowRun)> {
        let (repo, workflow) = self.find_workflow(pipeline).await?;

        let run: WorkflowRun = self
            .http
            .get_json(&format!("{}/actions/runs/{}", repo, run_id))
            .await?;

        if run.workflow_id != workflow.id {
            tracing::debug!(
                "Run {} belongs to workflow {}, not {} ({})",
                run_id,
                run.workflow_id,
                workflow.name,
                workflow.id
            );
            return Err(ProviderError::NotFound(format!("run {}", run_id)));
        }

        Ok((repo, run))
    }

    async fn run_jobs(&self, repo: &str, run_id: i64) -> Result<Vec<WorkflowJob>> {
        let list: JobList = self
            .http
            .get_json(&format!("{}/actions/runs/{}/jobs", repo, run_id))
            .await?;
        Ok(list.jobs)
    }

    /// Repository Actions variables; skipped when the token lacks access
    async fn variables(&self, repo: &str) -> Result<Vec<PipelineParameter>> {
        let list: VariableList = match self
            .http
            .get_json(&format!("{}/actions/variables", repo))
            .await
        {
            Ok(list) => list,
            Err(e) if e.is_forbidden() || e.is_not_found() => {
                tracing::debug!("Skipping variables of {}: {}", repo, e);
                return Ok(vec![]);
            }
            Err(e) => return Err(e),
        };

        Ok(list
            .variables
            .into_iter()
            .map(|v| PipelineParameter::new(v.name, "string", JsonValue::String(v.value)))
            .collect())
    }

    /// `parameters.json` through the contents API (base64 payload)
    async fn parameters_file(&self, repo: &str) -> Result<Vec<PipelineParameter>> {
        let file: Option<ContentFile> = self
            .http
            .get_json_optional(&format!("{}/contents/parameters.json", repo))
            .await?;

        match file {
            Some(file) => parse_parameters_file(&file.decode()?),
            None => Ok(vec![]),
        }
    }

    async fn post(&self, path: &str) -> Result<()> {
        self.http.send(self.http.request(Method::POST, path)).await?;
        Ok(())
    }
}

#[async_trait]
impl ProviderClient for GitHubClient {
    fn provider_type(&self) -> ProviderType {
        ProviderType::GitHub
    }

    async fn check_connection(&self) -> bool {
        self.http.probe("user").await
    }

    async fn list_pipelines(&self) -> Result<Vec<FetchedPipeline>> {
        let mut repositories = Vec::new();
        let mut page = 1;

        loop {
            let batch: Vec<Repository> = self
                .http
                .get_json(&format!("user/repos?per_page={}&page={}", PAGE_SIZE, page))
                .await?;
            let last = batch.len() < PAGE_SIZE;
            repositories.extend(batch);

            if last {
                break;
            }
            page += 1;
        }

        let workflows = try_join_all(repositories.iter().map(|r| self.workflows(r.id))).await?;

        let pipelines: Vec<FetchedPipeline> = repositories
            .iter()
            .zip(workflows)
            .flat_map(|(repo, workflows)| {
                workflows.into_iter().map(move |w| {
                    FetchedPipeline::new(
                        repo.id.to_string(),
                        format!("[{}] {}", repo.name, w.name),
                        self.application_id,
                        ProviderType::GitHub,
                    )
                })
            })
            .collect();

        tracing::debug!(
            "GitHub {} reported {} workflow(s) across {} repositories",
            self.http.base_url(),
            pipelines.len(),
            repositories.len()
        );

        Ok(pipelines)
    }

    async fn list_builds(&self, pipeline: &Pipeline) -> Result<Vec<Build>> {
        let (repo, workflow) = self.find_workflow(pipeline).await?;

        let runs: RunList = self
            .http
            .get_json(&format!(
                "{}/actions/workflows/{}/runs?per_page={}",
                repo, workflow.id, RUNS_PER_PAGE
            ))
            .await?;

        let jobs = try_join_all(
            runs.workflow_runs
                .iter()
                .map(|run| self.run_jobs(&repo, run.id)),
        )
        .await?;

        runs.workflow_runs
            .into_iter()
            .zip(jobs)
            .map(|(run, jobs)| to_build(&pipeline.name, run, jobs))
            .collect()
    }

    async fn get_build(&self, pipeline: &Pipeline, build_id: &str) -> Result<BuildDetail> {
        let (repo, run) = self.pipeline_run(pipeline, parse_run_id(build_id)?).await?;
        let jobs = self.run_jobs(&repo, run.id).await?;

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
        let (repo, workflow) = self.find_workflow(pipeline).await?;

        let branch = parameters
            .get("branch")
            .map(value_to_string)
            .filter(|b| !b.is_empty())
            .unwrap_or_else(|| DEFAULT_BRANCH.to_string());

        let dispatch = Dispatch {
            git_ref: branch,
            inputs: parameters
                .iter()
                .filter(|(k, _)| k.as_str() != "branch")
                .map(|(k, v)| (k.clone(), value_to_string(v)))
                .collect(),
        };

        self.http
            .send(
                self.http
                    .request(
                        Method::POST,
                        &format!("{}/actions/workflows/{}/dispatches", repo, workflow.id),
                    )
                    .json(&dispatch),
            )
            .await?;

        tracing::info!(
            "Dispatched workflow {} of {} on {}",
            workflow.name,
            repo,
            dispatch.git_ref
        );
        Ok(())
    }

    async fn retry_build(&self, pipeline: &Pipeline, build_id: &str) -> Result<()> {
        let (repo, run) = self.pipeline_run(pipeline, parse_run_id(build_id)?).await?;

        self.post(&format!("{}/actions/runs/{}/rerun", repo, run.id))
            .await?;
        tracing::info!("Re-ran workflow run {} of {}", run.id, repo);
        Ok(())
    }

    async fn cancel_build(&self, pipeline: &Pipeline, build_id: &str) -> Result<()> {
        let (repo, run) = self.pipeline_run(pipeline, parse_run_id(build_id)?).await?;

        self.post(&format!("{}/actions/runs/{}/cancel", repo, run.id))
            .await?;
        tracing::info!("Canceled workflow run {} of {}", run.id, repo);
        Ok(())
    }

    async fn get_parameters(&self, pipeline: &Pipeline) -> Result<Vec<PipelineParameter>> {
        let repo = repository_path(pipeline)?;
        let branches_path = format!("{}/branches", repo);

        let (branches, variables, file): (Vec<Branch>, _, _) = tokio::try_join!(
            self.http.get_json(&branches_path),
            self.variables(&repo),
            self.parameters_file(&repo),
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
        let repo = repository_path(pipeline)?;
        let job_id = numeric_id(job_id, "job id")?;
        let job_path = format!("{}/actions/jobs/{}", repo, job_id);

        let job: WorkflowJob = self.http.get_json(&job_path).await?;
        let run_id = job
            .run_id
            .ok_or_else(|| ProviderError::Data(format!("job {} has no run_id", job_id)))?;
        self.pipeline_run(pipeline, run_id).await?;

        let logs = self.http.get_text(&format!("{}/logs", job_path)).await?;

        Ok(JobLog {
            id: job.id.to_string(),
            status: map_status(&job.status, job.conclusion.as_deref()),
            name: job.name,
            log: log_lines(&logs),
        })
    }
}

fn repository_path(pipeline: &Pipeline) -> Result<String> {
    let repo = numeric_id(&pipeline.project_id, "repository id")?;
    Ok(format!("repositories/{}", repo))
}

fn parse_run_id(build_id: &str) -> Result<i64> {
    numeric_id(build_id, "run id")?
        .parse()
        .map_err(|_| ProviderError::InvalidRequest(format!("run id out of range: {}", build_id)))
}

/// Workflow part of a `[repo] workflow` pipeline name
pub(crate) fn workflow_name(pipeline_name: &str) -> Result<&str> {
    pipeline_name
        .split_once("] ")
        .map(|(_, workflow)| workflow)
        .filter(|w| !w.is_empty())
        .ok_or_else(|| {
            ProviderError::InvalidRequest(format!(
                "'{}' is not a GitHub workflow pipeline name",
                pipeline_name
            ))
        })
}

/// Map a run or job status; the conclusion wins once the run has finished
pub(crate) fn map_status(status: &str, conclusion: Option<&str>) -> BuildStatus {
    match conclusion {
        Some("success") => BuildStatus::Success,
        Some("failure") | Some("timed_out") | Some("startup_failure") => BuildStatus::Failed,
        Some("cancelled") => BuildStatus::Canceled,
        Some("skipped") | Some("neutral") | Some("stale") => BuildStatus::Skipped,
        Some("action_required") => BuildStatus::Manual,
        Some(_) => BuildStatus::Unknown,
        None => match status {
            "queued" | "waiting" | "requested" | "pending" => BuildStatus::Pending,
            "in_progress" => BuildStatus::Running,
            _ => BuildStatus::Unknown,
        },
    }
}

fn to_build(pipeline_name: &str, run: WorkflowRun, jobs: Vec<WorkflowJob>) -> Result<Build> {
    let stages: Vec<Stage> = jobs
        .into_iter()
        .map(|job| Stage {
            id: job.id.to_string(),
            status: map_status(&job.status, job.conclusion.as_deref()),
            started_at: parse_optional_timestamp(job.started_at.as_deref()),
            duration_seconds: seconds_between(job.started_at.as_deref(), job.completed_at.as_deref()),
            name: job.name,
        })
        .collect();

    Ok(Build {
        id: run.id.to_string(),
        name: format!("{} - #{}", pipeline_name, run.run_number),
        status: map_status(&run.status, run.conclusion.as_deref()),
        duration_seconds: stages.iter().map(|s| s.duration_seconds).sum(),
        created_at: parse_timestamp(&run.created_at)?,
        commit_message: run
            .head_commit
            .and_then(|c| c.message.lines().next().map(str::to_string)),
        stages,
    })
}

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct Repository {
    id: i64,
    name: String,
}

#[derive(Debug, Deserialize)]
struct WorkflowList {
    #[serde(default)]
    workflows: Vec<Workflow>,
}

#[derive(Debug, Deserialize)]
struct Workflow {
    id: i64,
    name: String,
}

#[derive(Debug, Deserialize)]
struct RunList {
    #[serde(default)]
    workflow_runs: Vec<WorkflowRun>,
}

#[derive(Debug, Deserialize)]
struct WorkflowRun {
    id: i64,
    workflow_id: i64,
    run_number: i64,
    status: String,
    conclusion: Option<String>,
    created_at: String,
    head_commit: Option<HeadCommit>,
}

#[derive(Debug, Deserialize)]
struct HeadCommit {
    message: String,
}

#[derive(Debug, Deserialize)]
struct JobList {
    #[serde(default)]
    jobs: Vec<WorkflowJob>,
}

#[derive(Debug, Deserialize)]
struct WorkflowJob {
    id: i64,
    #[serde(default)]
    run_id: Option<i64>,
    name: String,
    status: String,
    conclusion: Option<String>,
    started_at: Option<String>,
    completed_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Branch {
    name: String,
}

#[derive(Debug, Deserialize)]
struct VariableList {
    #[serde(default)]
    variables: Vec<Variable>,
}

#[derive(Debug, Deserialize)]
struct Variable {
    name: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct ContentFile {
    content: String,
}

impl ContentFile {
    /// The contents API wraps base64 at 60 columns
    fn decode(&self) -> Result<String> {
        let compact: String = self.content.split_whitespace().collect();
        let bytes = STANDARD
            .decode(compact)
            .map_err(|e| ProviderError::Data(format!("invalid base64 content: {}", e)))?;
        String::from_utf8(bytes).map_err(|e| ProviderError::Data(e.to_string()))
    }
}

#[derive(Debug, Serialize)]
struct Dispatch {
    #[serde(rename = "ref")]
    git_ref: String,
    inputs: HashMap<String, String>,
}
