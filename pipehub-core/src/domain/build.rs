//! Normalized build types
//!
//! Every provider client maps its native vocabulary into these shapes so the
//! request path can be written once for all providers.

use serde::{Deserialize, Serialize};

/// Build or stage status shared by all providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildStatus {
    Pending,
    Running,
    Success,
    Failed,
    Canceled,
    Skipped,
    Manual,
    Unknown,
}

/// One stage (GitLab job, GitHub job, Jenkins pipeline stage) of a build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    pub id: String,
    pub name: String,
    pub status: BuildStatus,
    /// Unix seconds
    pub started_at: Option<i64>,
    pub duration_seconds: i64,
}

/// One upstream execution of a pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Build {
    pub id: String,
    pub name: String,
    pub status: BuildStatus,
    pub duration_seconds: i64,
    /// Unix seconds
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_message: Option<String>,
    pub stages: Vec<Stage>,
}

/// A build together with its execution log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildDetail {
    #[serde(flatten)]
    pub build: Build,
    pub log: Vec<String>,
}

/// Log of a single job (stage) inside a build
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobLog {
    pub id: String,
    pub name: String,
    pub status: BuildStatus,
    pub log: Vec<String>,
}
