//! Pipeline domain types

use serde::{Deserialize, Serialize};

/// Local mirror of one upstream job, project or workflow.
///
/// Rows are unique on `(name, application_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pipeline {
    pub id: i64,
    pub name: String,
    pub application_id: i64,
    /// Provider-native identifier (Jenkins full name, GitLab project id,
    /// GitHub repository id)
    pub project_id: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}
