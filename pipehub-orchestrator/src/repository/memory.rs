//! In-memory stores used by the sync, service and API tests

use async_trait::async_trait;
use chrono::Utc;
use pipehub_core::domain::application::Application;
use pipehub_core::domain::pipeline::Pipeline;
use pipehub_core::domain::user::User;
use pipehub_core::dto::pipeline::CreatePipeline;
use std::collections::HashSet;
use std::sync::Mutex;

use super::{ApplicationStore, PipelineStore, RepositoryError, Result, UserStore};

#[derive(Default)]
pub struct MemoryApplicationStore {
    applications: Mutex<Vec<Application>>,
}

impl MemoryApplicationStore {
    pub fn new(applications: Vec<Application>) -> Self {
        Self {
            applications: Mutex::new(applications),
        }
    }
}

#[async_trait]
impl ApplicationStore for MemoryApplicationStore {
    async fn list_all(&self) -> Result<Vec<Application>> {
        Ok(self.applications.lock().unwrap().clone())
    }

    async fn list_active(&self) -> Result<Vec<Application>> {
        Ok(self
            .applications
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.is_active())
            .cloned()
            .collect())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Application>> {
        Ok(self
            .applications
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.id == id)
            .cloned())
    }
}

#[derive(Default)]
struct PipelineTable {
    rows: Vec<Pipeline>,
    next_id: i64,
}

impl PipelineTable {
    fn conflicts(&self, req: &CreatePipeline) -> bool {
        self.rows
            .iter()
            .any(|p| p.name == req.name && p.application_id == req.application_id)
    }

    fn insert(&mut self, req: &CreatePipeline) -> Pipeline {
        self.next_id += 1;
        let pipeline = Pipeline {
            id: self.next_id,
            name: req.name.clone(),
            application_id: req.application_id,
            project_id: req.project_id.clone(),
            created_at: Utc::now(),
        };
        self.rows.push(pipeline.clone());
        pipeline
    }
}

/// Pipeline store enforcing the `(name, application_id)` uniqueness
#[derive(Default)]
pub struct MemoryPipelineStore {
    table: Mutex<PipelineTable>,
}

impl MemoryPipelineStore {
    pub fn new(pipelines: Vec<Pipeline>) -> Self {
        let next_id = pipelines.iter().map(|p| p.id).max().unwrap_or(0);
        Self {
            table: Mutex::new(PipelineTable {
                rows: pipelines,
                next_id,
            }),
        }
    }

    pub fn snapshot(&self) -> Vec<Pipeline> {
        self.table.lock().unwrap().rows.clone()
    }
}

#[async_trait]
impl PipelineStore for MemoryPipelineStore {
    async fn list_all(&self) -> Result<Vec<Pipeline>> {
        Ok(self.snapshot())
    }

    async fn list_by_application_ids(&self, application_ids: &[i64]) -> Result<Vec<Pipeline>> {
        Ok(self
            .snapshot()
            .into_iter()
            .filter(|p| application_ids.contains(&p.application_id))
            .collect())
    }

    async fn list_by_ids(&self, ids: &[i64]) -> Result<Vec<Pipeline>> {
        Ok(self
            .snapshot()
            .into_iter()
            .filter(|p| ids.contains(&p.id))
            .collect())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Pipeline>> {
        Ok(self.snapshot().into_iter().find(|p| p.id == id))
    }

    async fn create(&self, req: CreatePipeline) -> Result<Pipeline> {
        let mut table = self.table.lock().unwrap();
        if table.conflicts(&req) {
            return Err(RepositoryError::Conflict(format!(
                "pipeline {} already exists for application {}",
                req.name, req.application_id
            )));
        }
        Ok(table.insert(&req))
    }

    async fn create_bulk(&self, reqs: &[CreatePipeline]) -> Result<u64> {
        let mut table = self.table.lock().unwrap();

        let mut seen = HashSet::new();
        for req in reqs {
            if table.conflicts(req) || !seen.insert((req.name.as_str(), req.application_id)) {
                return Err(RepositoryError::Conflict(format!(
                    "pipeline {} already exists for application {}",
                    req.name, req.application_id
                )));
            }
        }

        for req in reqs {
            table.insert(req);
        }
        Ok(reqs.len() as u64)
    }

    async fn delete_bulk(&self, ids: &[i64]) -> Result<u64> {
        let mut table = self.table.lock().unwrap();
        let before = table.rows.len();
        table.rows.retain(|p| !ids.contains(&p.id));
        Ok((before - table.rows.len()) as u64)
    }
}

#[derive(Default)]
pub struct MemoryUserStore {
    users: Vec<User>,
    /// (role_id, user_id)
    members: Vec<(i64, i64)>,
    /// (role_id, pipeline_id)
    grants: Vec<(i64, i64)>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, user: User) -> Self {
        self.users.push(user);
        self
    }

    /// Put the user in a role that grants the given pipelines
    pub fn with_role(mut self, role_id: i64, user_id: i64, pipeline_ids: &[i64]) -> Self {
        self.members.push((role_id, user_id));
        self.grants
            .extend(pipeline_ids.iter().map(|pipeline_id| (role_id, *pipeline_id)));
        self
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self
            .users
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn role_ids(&self, user_id: i64) -> Result<Vec<i64>> {
        Ok(self
            .members
            .iter()
            .filter(|(_, user)| *user == user_id)
            .map(|(role, _)| *role)
            .collect())
    }

    async fn pipeline_ids_for_roles(&self, role_ids: &[i64]) -> Result<Vec<i64>> {
        let mut ids: Vec<i64> = self
            .grants
            .iter()
            .filter(|(role, _)| role_ids.contains(role))
            .map(|(_, pipeline)| *pipeline)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }
}
