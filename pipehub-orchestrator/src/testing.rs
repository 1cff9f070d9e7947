//! Fixtures and a scriptable provider shared by the orchestrator tests

use async_trait::async_trait;
use chrono::Utc;
use pipehub_client::{ClientManager, ProviderClient, ProviderError, ProviderSettings};
use pipehub_core::domain::application::{
    Application, ApplicationStatus, Credentials, ProviderType,
};
use pipehub_core::domain::build::{Build, BuildDetail, BuildStatus, JobLog};
use pipehub_core::domain::parameter::PipelineParameter;
use pipehub_core::domain::pipeline::Pipeline;
use pipehub_core::domain::user::{AccessLevel, User, UserStatus};
use pipehub_core::dto::pipeline::FetchedPipeline;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn application(id: i64, provider_type: ProviderType, pattern: Option<&str>) -> Application {
    Application {
        id,
        name: format!("app-{}", id),
        provider_type,
        base_url: format!("http://provider-{}.invalid", id),
        credentials: Credentials {
            user: Some("bot".to_string()),
            secret: "secret".to_string(),
        },
        regex_pattern: pattern.map(str::to_string),
        status: ApplicationStatus::Active,
        created_at: Utc::now(),
    }
}

pub fn pipeline(id: i64, name: &str, application_id: i64) -> Pipeline {
    Pipeline {
        id,
        name: name.to_string(),
        application_id,
        project_id: id.to_string(),
        created_at: Utc::now(),
    }
}

pub fn user(id: i64, email: &str, access_level: AccessLevel) -> User {
    User {
        id,
        email: email.to_string(),
        first_name: None,
        last_name: None,
        status: UserStatus::Active,
        access_level,
    }
}

pub fn build(id: &str, status: BuildStatus) -> Build {
    Build {
        id: id.to_string(),
        name: format!("build #{}", id),
        status,
        duration_seconds: 12,
        created_at: 1_700_000_000,
        commit_message: None,
        stages: vec![],
    }
}

/// What a [`FakeProvider`] answers for one application
#[derive(Clone)]
pub enum Upstream {
    Pipelines(Vec<(&'static str, &'static str)>),
    Unreachable,
    Slow(Duration, Vec<(&'static str, &'static str)>),
}

/// Provider double driven by an [`Upstream`] script.
///
/// Build operations answer from fixed data and record the calls they get.
pub struct FakeProvider {
    application_id: i64,
    upstream: Upstream,
    calls: Arc<Mutex<Vec<String>>>,
}

impl FakeProvider {
    fn fetched(&self, entries: &[(&str, &str)]) -> Vec<FetchedPipeline> {
        entries
            .iter()
            .map(|(native_id, name)| {
                FetchedPipeline::new(*native_id, *name, self.application_id, ProviderType::Jenkins)
            })
            .collect()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ProviderClient for FakeProvider {
    fn provider_type(&self) -> ProviderType {
        ProviderType::Jenkins
    }

    async fn check_connection(&self) -> bool {
        !matches!(self.upstream, Upstream::Unreachable)
    }

    async fn list_pipelines(&self) -> pipehub_client::Result<Vec<FetchedPipeline>> {
        match &self.upstream {
            Upstream::Pipelines(entries) => Ok(self.fetched(entries)),
            Upstream::Unreachable => Err(ProviderError::Connection(format!(
                "application {} is unreachable",
                self.application_id
            ))),
            Upstream::Slow(delay, entries) => {
                tokio::time::sleep(*delay).await;
                Ok(self.fetched(entries))
            }
        }
    }

    async fn list_builds(&self, pipeline: &Pipeline) -> pipehub_client::Result<Vec<Build>> {
        self.record(format!("list_builds {}", pipeline.project_id));
        Ok(vec![build("2", BuildStatus::Running), build("1", BuildStatus::Success)])
    }

    async fn get_build(
        &self,
        pipeline: &Pipeline,
        build_id: &str,
    ) -> pipehub_client::Result<BuildDetail> {
        self.record(format!("get_build {} {}", pipeline.project_id, build_id));
        if build_id == "404" {
            return Err(ProviderError::NotFound(format!("build {}", build_id)));
        }
        Ok(BuildDetail {
            build: build(build_id, BuildStatus::Success),
            log: vec!["done".to_string()],
        })
    }

    async fn start_build(
        &self,
        pipeline: &Pipeline,
        parameters: &HashMap<String, JsonValue>,
    ) -> pipehub_client::Result<()> {
        let mut keys: Vec<_> = parameters.keys().cloned().collect();
        keys.sort();
        self.record(format!("start_build {} {}", pipeline.project_id, keys.join(",")));
        Ok(())
    }

    async fn retry_build(&self, pipeline: &Pipeline, build_id: &str) -> pipehub_client::Result<()> {
        self.record(format!("retry_build {} {}", pipeline.project_id, build_id));
        Ok(())
    }

    async fn cancel_build(&self, pipeline: &Pipeline, build_id: &str) -> pipehub_client::Result<()> {
        self.record(format!("cancel_build {} {}", pipeline.project_id, build_id));
        Ok(())
    }

    async fn get_parameters(
        &self,
        _pipeline: &Pipeline,
    ) -> pipehub_client::Result<Vec<PipelineParameter>> {
        Ok(vec![
            PipelineParameter::choice("branch", ["main", "release"]),
            PipelineParameter::protected("TOKEN", "password"),
        ])
    }

    async fn get_job_log(&self, _pipeline: &Pipeline, job_id: &str) -> pipehub_client::Result<JobLog> {
        if job_id == "0" {
            return Err(ProviderError::Data("unexpected job payload".to_string()));
        }
        Ok(JobLog {
            id: job_id.to_string(),
            name: "test".to_string(),
            status: BuildStatus::Failed,
            log: vec!["boom".to_string()],
        })
    }
}

/// Client manager whose Jenkins factory hands out [`FakeProvider`]s.
///
/// Applications missing from `upstreams` get an empty pipeline list.
pub fn fake_manager(
    upstreams: HashMap<i64, Upstream>,
    calls: Arc<Mutex<Vec<String>>>,
) -> ClientManager {
    ClientManager::new(ProviderSettings::default()).with_factory(
        ProviderType::Jenkins,
        move |app: &Application,
              _settings: &ProviderSettings|
              -> pipehub_client::Result<Box<dyn ProviderClient>> {
            Ok(Box::new(FakeProvider {
                application_id: app.id,
                upstream: upstreams
                    .get(&app.id)
                    .cloned()
                    .unwrap_or(Upstream::Pipelines(vec![])),
                calls: Arc::clone(&calls),
            }))
        },
    )
}
