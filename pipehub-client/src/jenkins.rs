//! Jenkins client
//!
//! Talks to the Jenkins JSON API with basic auth (user + API token).
//! Mutating requests carry a crumb from the CSRF crumb issuer when one is
//! enabled on the server.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use pipehub_core::domain::application::{Application, ProviderType};
use pipehub_core::domain::build::{Build, BuildDetail, BuildStatus, JobLog, Stage};
use pipehub_core::domain::parameter::PipelineParameter;
use pipehub_core::domain::pipeline::Pipeline;
use pipehub_core::dto::pipeline::FetchedPipeline;
use reqwest::Method;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::collections::HashMap;

use crate::ProviderSettings;
use crate::error::{ProviderError, Result};
use crate::normalize::{log_lines, numeric_id, value_to_string};
use crate::provider::ProviderClient;
use crate::transport::HttpTransport;

const FOLDER_CLASS: &str = "com.cloudbees.hudson.plugins.folder.Folder";
const PARAMETERS_PROPERTY_CLASS: &str = "hudson.model.ParametersDefinitionProperty";
const PASSWORD_PARAMETER: &str = "PasswordParameterDefinition";

/// Client for one Jenkins controller
#[derive(Debug, Clone)]
pub struct JenkinsClient {
    http: HttpTransport,
    application_id: i64,
}

impl JenkinsClient {
    pub fn new(
        base_url: impl Into<String>,
        user: &str,
        token: &str,
        application_id: i64,
        settings: &ProviderSettings,
    ) -> Result<Self> {
        let credentials = STANDARD.encode(format!("{}:{}", user, token));
        let mut auth = HeaderValue::from_str(&format!("Basic {}", credentials))
            .map_err(|_| ProviderError::Configuration("invalid Jenkins credentials".to_string()))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        Ok(Self {
            http: HttpTransport::without_redirects(base_url, headers, settings)?,
            application_id,
        })
    }

    pub fn from_application(application: &Application, settings: &ProviderSettings) -> Result<Self> {
        let user = application.credentials.user.as_deref().ok_or_else(|| {
            ProviderError::Configuration(format!(
                "Jenkins application {} has no user configured",
                application.name
            ))
        })?;

        Self::new(
            application.base_url.clone(),
            user,
            &application.credentials.secret,
            application.id,
            settings,
        )
    }

    /// Fetch a CSRF crumb; `None` when the crumb issuer is disabled
    async fn crumb(&self) -> Result<Option<(HeaderName, HeaderValue)>> {
        let crumb: Option<Crumb> = self.http.get_json_optional("crumbIssuer/api/json").await?;

        crumb
            .map(|c| {
                let name = HeaderName::from_bytes(c.crumb_request_field.as_bytes())
                    .map_err(|e| ProviderError::Data(format!("invalid crumb header: {}", e)))?;
                let value = HeaderValue::from_str(&c.crumb)
                    .map_err(|e| ProviderError::Data(format!("invalid crumb value: {}", e)))?;
                Ok((name, value))
            })
            .transpose()
    }

    /// POST guarded by a crumb, with optional form parameters.
    ///
    /// Jenkins answers most actions with a redirect to the job page, which
    /// counts as accepted and is not followed.
    async fn post(&self, path: &str, form: Option<&[(String, String)]>) -> Result<()> {
        let mut request = self.http.request(Method::POST, path);

        if let Some((name, value)) = self.crumb().await? {
            request = request.header(name, value);
        }
        if let Some(form) = form {
            request = request.form(form);
        }

        self.http.send_accepting_redirect(request).await
    }

    /// Trigger a job, with parameters when the job declares any
    async fn trigger(&self, pipeline: &Pipeline, parameters: Vec<(String, String)>) -> Result<()> {
        let job = job_path(&pipeline.project_id);
        let declared = self.get_parameters(pipeline).await?;

        if declared.is_empty() {
            self.post(&format!("{}/build", job), None).await
        } else {
            self.post(&format!("{}/buildWithParameters", job), Some(&parameters))
                .await
        }
    }

    async fn build_info(&self, job: &str, number: &str) -> Result<BuildInfo> {
        self.http
            .get_json(&format!(
                "{}/{}/api/json?tree=number,duration,fullDisplayName,result,timestamp",
                job, number
            ))
            .await
    }

    async fn console_log(&self, job: &str, number: &str) -> Result<Vec<String>> {
        let text = self
            .http
            .get_text(&format!("{}/{}/consoleText", job, number))
            .await?;
        Ok(log_lines(&text))
    }

    /// Stages from the pipeline-stage view API; freestyle jobs have none
    async fn stages(&self, job: &str, number: &str) -> Result<Vec<Stage>> {
        let description: Option<RunDescription> = self
            .http
            .get_json_optional(&format!("{}/{}/wfapi/describe", job, number))
            .await?;

        Ok(description
            .map(|d| d.stages.into_iter().map(Stage::from).collect())
            .unwrap_or_default())
    }
}

#[async_trait]
impl ProviderClient for JenkinsClient {
    fn provider_type(&self) -> ProviderType {
        ProviderType::Jenkins
    }

    async fn check_connection(&self) -> bool {
        self.http.probe("whoAmI/api/json").await
    }

    async fn list_pipelines(&self) -> Result<Vec<FetchedPipeline>> {
        let tree: JobTree = self
            .http
            .get_json("api/json?tree=jobs[fullName,jobs[fullName]]")
            .await?;

        let mut pipelines = Vec::new();
        for job in tree.jobs {
            if job.class == FOLDER_CLASS {
                for child in job.jobs.into_iter().filter(|c| c.class != FOLDER_CLASS) {
                    pipelines.push(self.fetched(child.full_name));
                }
            } else {
                pipelines.push(self.fetched(job.full_name));
            }
        }

        tracing::debug!(
            "Jenkins {} reported {} job(s)",
            self.http.base_url(),
            pipelines.len()
        );

        Ok(pipelines)
    }

    async fn list_builds(&self, pipeline: &Pipeline) -> Result<Vec<Build>> {
        let job = job_path(&pipeline.project_id);
        let history: JobBuilds = self
            .http
            .get_json(&format!(
                "{}/api/json?tree=name,builds[number,result,timestamp,duration]",
                job
            ))
            .await?;

        Ok(history
            .builds
            .into_iter()
            .map(|b| Build {
                id: b.number.to_string(),
                name: format!("{} - #{}", history.name, b.number),
                status: map_result(b.result.as_deref()),
                duration_seconds: b.duration / 1000,
                created_at: b.timestamp / 1000,
                commit_message: None,
                stages: vec![],
            })
            .collect())
    }

    async fn get_build(&self, pipeline: &Pipeline, build_id: &str) -> Result<BuildDetail> {
        let number = numeric_id(build_id, "build id")?;
        let job = job_path(&pipeline.project_id);

        let (info, log, stages) = tokio::try_join!(
            self.build_info(&job, number),
            self.console_log(&job, number),
            self.stages(&job, number),
        )?;

        Ok(BuildDetail {
            build: Build {
                id: info.number.to_string(),
                name: info.full_display_name,
                status: map_result(info.result.as_deref()),
                duration_seconds: info.duration / 1000,
                created_at: info.timestamp / 1000,
                commit_message: None,
                stages,
            },
            log,
        })
    }

    async fn start_build(
        &self,
        pipeline: &Pipeline,
        parameters: &HashMap<String, JsonValue>,
    ) -> Result<()> {
        let form = parameters
            .iter()
            .map(|(k, v)| (k.clone(), value_to_string(v)))
            .collect();

        self.trigger(pipeline, form).await?;
        tracing::info!("Started Jenkins job {}", pipeline.project_id);
        Ok(())
    }

    /// Jenkins has no native retry; the job is re-triggered with the
    /// parameters the original build ran with.
    async fn retry_build(&self, pipeline: &Pipeline, build_id: &str) -> Result<()> {
        let number = numeric_id(build_id, "build id")?;
        let job = job_path(&pipeline.project_id);

        let actions: BuildActions = self
            .http
            .get_json(&format!(
                "{}/{}/api/json?tree=actions[parameters[name,value]]",
                job, number
            ))
            .await?;

        let form = actions
            .actions
            .into_iter()
            .flat_map(|a| a.parameters)
            .map(|p| (p.name, value_to_string(&p.value)))
            .collect();

        self.trigger(pipeline, form).await?;
        tracing::info!("Retried Jenkins job {} build #{}", pipeline.project_id, number);
        Ok(())
    }

    async fn cancel_build(&self, pipeline: &Pipeline, build_id: &str) -> Result<()> {
        let number = numeric_id(build_id, "build id")?;
        let job = job_path(&pipeline.project_id);

        self.post(&format!("{}/{}/stop", job, number), None).await?;
        tracing::info!("Stopped Jenkins job {} build #{}", pipeline.project_id, number);
        Ok(())
    }

    async fn get_parameters(&self, pipeline: &Pipeline) -> Result<Vec<PipelineParameter>> {
        let job = job_path(&pipeline.project_id);
        let properties: JobProperties = self
            .http
            .get_json(&format!(
                "{}/api/json?tree=property[parameterDefinitions[name,type,description,choices,defaultParameterValue[value]]]",
                job
            ))
            .await?;

        Ok(properties
            .property
            .into_iter()
            .filter(|p| p.class == PARAMETERS_PROPERTY_CLASS)
            .flat_map(|p| p.parameter_definitions)
            .map(ParameterDefinition::into_parameter)
            .collect())
    }

    async fn get_job_log(&self, pipeline: &Pipeline, job_id: &str) -> Result<JobLog> {
        let detail = self.get_build(pipeline, job_id).await?;

        Ok(JobLog {
            id: detail.build.id,
            name: detail.build.name,
            status: detail.build.status,
            log: detail.log,
        })
    }
}

impl JenkinsClient {
    fn fetched(&self, full_name: String) -> FetchedPipeline {
        FetchedPipeline::new(
            full_name.clone(),
            full_name,
            self.application_id,
            ProviderType::Jenkins,
        )
    }
}

/// URL path of a job from its full name (`team/api` -> `job/team/job/api`)
pub(crate) fn job_path(full_name: &str) -> String {
    full_name
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| format!("job/{}", urlencoding::encode(s)))
        .collect::<Vec<_>>()
        .join("/")
}

/// Map a Jenkins build result; `null` means the build is still running
pub(crate) fn map_result(result: Option<&str>) -> BuildStatus {
    match result {
        None => BuildStatus::Running,
        Some("SUCCESS") => BuildStatus::Success,
        Some("FAILURE") | Some("UNSTABLE") => BuildStatus::Failed,
        Some("ABORTED") => BuildStatus::Canceled,
        Some("NOT_BUILT") => BuildStatus::Skipped,
        Some(_) => BuildStatus::Unknown,
    }
}

/// Map a pipeline-stage API status
pub(crate) fn map_stage_status(status: &str) -> BuildStatus {
    match status {
        "SUCCESS" => BuildStatus::Success,
        "FAILED" | "UNSTABLE" => BuildStatus::Failed,
        "IN_PROGRESS" => BuildStatus::Running,
        "ABORTED" => BuildStatus::Canceled,
        "NOT_EXECUTED" => BuildStatus::Skipped,
        "PAUSED_PENDING_INPUT" => BuildStatus::Manual,
        "QUEUED" => BuildStatus::Pending,
        _ => BuildStatus::Unknown,
    }
}

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct Crumb {
    crumb: String,
    #[serde(rename = "crumbRequestField")]
    crumb_request_field: String,
}

#[derive(Debug, Deserialize)]
struct JobTree {
    #[serde(default)]
    jobs: Vec<JobNode>,
}

#[derive(Debug, Deserialize)]
struct JobNode {
    #[serde(rename = "_class", default)]
    class: String,
    #[serde(rename = "fullName")]
    full_name: String,
    #[serde(default)]
    jobs: Vec<JobNode>,
}

#[derive(Debug, Deserialize)]
struct JobBuilds {
    name: String,
    #[serde(default)]
    builds: Vec<BuildSummary>,
}

#[derive(Debug, Deserialize)]
struct BuildSummary {
    number: i64,
    result: Option<String>,
    timestamp: i64,
    #[serde(default)]
    duration: i64,
}

#[derive(Debug, Deserialize)]
struct BuildInfo {
    number: i64,
    #[serde(rename = "fullDisplayName")]
    full_display_name: String,
    result: Option<String>,
    timestamp: i64,
    #[serde(default)]
    duration: i64,
}

#[derive(Debug, Deserialize)]
struct RunDescription {
    #[serde(default)]
    stages: Vec<StageDescription>,
}

#[derive(Debug, Deserialize)]
struct StageDescription {
    id: String,
    name: String,
    status: String,
    #[serde(rename = "startTimeMillis")]
    start_time_millis: Option<i64>,
    #[serde(rename = "durationMillis", default)]
    duration_millis: i64,
}

impl From<StageDescription> for Stage {
    fn from(stage: StageDescription) -> Self {
        Stage {
            id: stage.id,
            name: stage.name,
            status: map_stage_status(&stage.status),
            started_at: stage.start_time_millis.filter(|t| *t > 0).map(|t| t / 1000),
            duration_seconds: stage.duration_millis / 1000,
        }
    }
}

#[derive(Debug, Deserialize)]
struct BuildActions {
    #[serde(default)]
    actions: Vec<BuildAction>,
}

#[derive(Debug, Deserialize)]
struct BuildAction {
    #[serde(default)]
    parameters: Vec<BuildParameterValue>,
}

#[derive(Debug, Deserialize)]
struct BuildParameterValue {
    name: String,
    #[serde(default)]
    value: JsonValue,
}

#[derive(Debug, Deserialize)]
struct JobProperties {
    #[serde(default)]
    property: Vec<JobProperty>,
}

#[derive(Debug, Deserialize)]
struct JobProperty {
    #[serde(rename = "_class", default)]
    class: String,
    #[serde(rename = "parameterDefinitions", default)]
    parameter_definitions: Vec<ParameterDefinition>,
}

#[derive(Debug, Deserialize)]
struct ParameterDefinition {
    name: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    choices: Option<Vec<String>>,
    #[serde(rename = "defaultParameterValue", default)]
    default_value: Option<DefaultValue>,
}

#[derive(Debug, Deserialize)]
struct DefaultValue {
    #[serde(default)]
    value: JsonValue,
}

impl ParameterDefinition {
    /// `ChoiceParameterDefinition` -> `choice`
    fn short_kind(&self) -> String {
        let lower = self.kind.to_ascii_lowercase();
        match lower.split_once("parameter") {
            Some((prefix, _)) if !prefix.is_empty() => prefix.to_string(),
            _ => lower,
        }
    }

    fn into_parameter(self) -> PipelineParameter {
        let kind = self.short_kind();
        let description = self.description.filter(|d| !d.is_empty());

        if self.kind == PASSWORD_PARAMETER {
            return PipelineParameter::protected(self.name, kind).with_description(description);
        }

        let value = match self.choices {
            Some(choices) => JsonValue::Array(choices.into_iter().map(JsonValue::String).collect()),
            None => self.default_value.map(|d| d.value).unwrap_or(JsonValue::Null),
        };

        PipelineParameter::new(self.name, kind, value).with_description(description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(base_url: &str) -> JenkinsClient {
        JenkinsClient::new(base_url, "ci", "token", 1, &ProviderSettings::default()).unwrap()
    }

    fn pipeline(full_name: &str) -> Pipeline {
        Pipeline {
            id: 10,
            name: full_name.to_string(),
            application_id: 1,
            project_id: full_name.to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_job_path_nests_folders() {
        assert_eq!(job_path("api"), "job/api");
        assert_eq!(job_path("team/api"), "job/team/job/api");
        assert_eq!(job_path("team/my job"), "job/team/job/my%20job");
        assert_eq!(job_path("api-v2.1/release#1?x"), "job/api-v2.1/job/release%231%3Fx");
    }

    #[test]
    fn test_result_mapping() {
        assert_eq!(map_result(None), BuildStatus::Running);
        assert_eq!(map_result(Some("SUCCESS")), BuildStatus::Success);
        assert_eq!(map_result(Some("FAILURE")), BuildStatus::Failed);
        assert_eq!(map_result(Some("ABORTED")), BuildStatus::Canceled);
        assert_eq!(map_result(Some("SOMETHING")), BuildStatus::Unknown);
    }

    #[tokio::test]
    async fn test_list_pipelines_expands_folders_one_level() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/json"))
            .and(header("authorization", "Basic Y2k6dG9rZW4="))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jobs": [
                    {"_class": "org.jenkinsci.plugins.workflow.job.WorkflowJob", "fullName": "prod-api"},
                    {"_class": FOLDER_CLASS, "fullName": "team", "jobs": [
                        {"_class": "hudson.model.FreeStyleProject", "fullName": "team/build"},
                        {"_class": FOLDER_CLASS, "fullName": "team/nested"}
                    ]}
                ]
            })))
            .mount(&server)
            .await;

        let pipelines = test_client(&server.uri()).list_pipelines().await.unwrap();
        let names: Vec<_> = pipelines.iter().map(|p| p.name.as_str()).collect();

        assert_eq!(names, vec!["prod-api", "team/build"]);
        assert_eq!(pipelines[1].native_id, "team/build");
        assert!(pipelines.iter().all(|p| p.application_id == 1));
        assert!(pipelines.iter().all(|p| p.provider_type == ProviderType::Jenkins));
    }

    #[tokio::test]
    async fn test_list_pipelines_rejects_malformed_payload() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"jobs": "nope"})))
            .mount(&server)
            .await;

        let err = test_client(&server.uri()).list_pipelines().await.unwrap_err();
        assert!(matches!(err, ProviderError::Data(_)));
    }

    #[tokio::test]
    async fn test_list_builds_normalizes_results() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/job/team/job/api/api/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "api",
                "builds": [
                    {"number": 8, "result": null, "timestamp": 1_700_000_100_000i64, "duration": 0},
                    {"number": 7, "result": "SUCCESS", "timestamp": 1_700_000_000_000i64, "duration": 65_500}
                ]
            })))
            .mount(&server)
            .await;

        let builds = test_client(&server.uri())
            .list_builds(&pipeline("team/api"))
            .await
            .unwrap();

        assert_eq!(builds.len(), 2);
        assert_eq!(builds[0].status, BuildStatus::Running);
        assert_eq!(builds[1].id, "7");
        assert_eq!(builds[1].name, "api - #7");
        assert_eq!(builds[1].status, BuildStatus::Success);
        assert_eq!(builds[1].duration_seconds, 65);
        assert_eq!(builds[1].created_at, 1_700_000_000);
    }

    #[tokio::test]
    async fn test_get_build_includes_log_and_stages() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/job/api/7/api/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "number": 7,
                "fullDisplayName": "api #7",
                "result": "FAILURE",
                "timestamp": 1_700_000_000_000i64,
                "duration": 3_000
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/job/api/7/consoleText"))
            .respond_with(ResponseTemplate::new(200).set_body_string("Started\n\x1b[31mBoom\x1b[0m\n"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/job/api/7/wfapi/describe"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "stages": [
                    {"id": "6", "name": "Build", "status": "SUCCESS", "startTimeMillis": 1_700_000_001_000i64, "durationMillis": 1_000},
                    {"id": "12", "name": "Test", "status": "FAILED", "startTimeMillis": 1_700_000_002_000i64, "durationMillis": 2_000}
                ]
            })))
            .mount(&server)
            .await;

        let detail = test_client(&server.uri())
            .get_build(&pipeline("api"), "7")
            .await
            .unwrap();

        assert_eq!(detail.build.status, BuildStatus::Failed);
        assert_eq!(detail.build.duration_seconds, 3);
        assert_eq!(detail.log, vec!["Started", "Boom"]);
        assert_eq!(detail.build.stages.len(), 2);
        assert_eq!(detail.build.stages[1].status, BuildStatus::Failed);
        assert_eq!(detail.build.stages[1].started_at, Some(1_700_000_002));
    }

    #[tokio::test]
    async fn test_get_build_without_stage_view() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/job/api/3/api/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "number": 3,
                "fullDisplayName": "api #3",
                "result": "SUCCESS",
                "timestamp": 1_700_000_000_000i64,
                "duration": 1_000
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/job/api/3/consoleText"))
            .respond_with(ResponseTemplate::new(200).set_body_string("done"))
            .mount(&server)
            .await;

        let detail = test_client(&server.uri())
            .get_build(&pipeline("api"), "3")
            .await
            .unwrap();

        assert!(detail.build.stages.is_empty());
        assert_eq!(detail.log, vec!["done"]);
    }

    #[tokio::test]
    async fn test_get_parameters_protects_passwords() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/job/deploy/api/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "property": [
                    {"_class": "jenkins.model.BuildDiscarderProperty"},
                    {"_class": PARAMETERS_PROPERTY_CLASS, "parameterDefinitions": [
                        {"name": "ENV", "type": "ChoiceParameterDefinition", "description": "",
                         "choices": ["dev", "prod"], "defaultParameterValue": {"value": "dev"}},
                        {"name": "TOKEN", "type": "PasswordParameterDefinition",
                         "defaultParameterValue": {"value": "s3cr3t"}},
                        {"name": "VERSION", "type": "StringParameterDefinition",
                         "description": "Release version", "defaultParameterValue": {"value": "1.0"}}
                    ]}
                ]
            })))
            .mount(&server)
            .await;

        let params = test_client(&server.uri())
            .get_parameters(&pipeline("deploy"))
            .await
            .unwrap();

        assert_eq!(params.len(), 3);
        assert_eq!(params[0].kind, "choice");
        assert_eq!(params[0].value, json!(["dev", "prod"]));
        assert_eq!(params[0].description, None);
        assert_eq!(params[1].kind, "password");
        assert!(params[1].protected);
        assert_eq!(params[1].value, json!(""));
        assert_eq!(params[2].value, json!("1.0"));
        assert_eq!(params[2].description.as_deref(), Some("Release version"));
    }

    #[tokio::test]
    async fn test_start_build_sends_crumb_and_parameters() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/crumbIssuer/api/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "crumb": "abc123",
                "crumbRequestField": "Jenkins-Crumb"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/job/deploy/api/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "property": [{"_class": PARAMETERS_PROPERTY_CLASS, "parameterDefinitions": [
                    {"name": "ENV", "type": "StringParameterDefinition", "defaultParameterValue": {"value": "dev"}}
                ]}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/job/deploy/buildWithParameters"))
            .and(header("Jenkins-Crumb", "abc123"))
            .and(body_string_contains("ENV=prod"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let params = HashMap::from([("ENV".to_string(), json!("prod"))]);
        test_client(&server.uri())
            .start_build(&pipeline("deploy"), &params)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_start_build_without_crumb_issuer() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/crumbIssuer/api/json"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/job/nightly/api/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"property": []})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/job/nightly/build"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        test_client(&server.uri())
            .start_build(&pipeline("nightly"), &HashMap::new())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_retry_replays_original_parameters() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/crumbIssuer/api/json"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/job/deploy/5/api/json"))
            .and(query_param("tree", "actions[parameters[name,value]]"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "actions": [{}, {"parameters": [{"name": "ENV", "value": "staging"}]}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/job/deploy/api/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "property": [{"_class": PARAMETERS_PROPERTY_CLASS, "parameterDefinitions": [
                    {"name": "ENV", "type": "StringParameterDefinition", "defaultParameterValue": {"value": "dev"}}
                ]}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/job/deploy/buildWithParameters"))
            .and(body_string_contains("ENV=staging"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        test_client(&server.uri())
            .retry_build(&pipeline("deploy"), "5")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_cancel_missing_build_is_upstream_not_found() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/crumbIssuer/api/json"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/job/api/99/stop"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = test_client(&server.uri())
            .cancel_build(&pipeline("api"), "99")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_cancel_redirect_counts_as_accepted() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/crumbIssuer/api/json"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/job/api/7/stop"))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("Location", format!("{}/job/api/", server.uri()).as_str()),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/job/api/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .expect(0)
            .mount(&server)
            .await;

        test_client(&server.uri())
            .cancel_build(&pipeline("api"), "7")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_check_connection() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/whoAmI/api/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "ci"})))
            .mount(&server)
            .await;

        assert!(test_client(&server.uri()).check_connection().await);
        assert!(!test_client("http://127.0.0.1:9").check_connection().await);
    }
}
