//! Application Repository
//!
//! Read-only access to the configured provider connections.

use async_trait::async_trait;
use pipehub_core::domain::application::{
    Application, ApplicationStatus, Credentials, ProviderType,
};
use sqlx::PgPool;

use super::{RepositoryError, Result};

#[async_trait]
pub trait ApplicationStore: Send + Sync {
    async fn list_all(&self) -> Result<Vec<Application>>;

    /// Applications whose status is active
    async fn list_active(&self) -> Result<Vec<Application>>;

    async fn find_by_id(&self, id: i64) -> Result<Option<Application>>;
}

/// Postgres implementation of ApplicationStore
#[derive(Debug, Clone)]
pub struct PgApplicationStore {
    pool: PgPool,
}

impl PgApplicationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const SELECT_APPLICATIONS: &str = r#"
    SELECT id, name, type, base_url, auth_user, auth_secret,
           regex_pattern, status, created_at
    FROM applications
"#;

#[async_trait]
impl ApplicationStore for PgApplicationStore {
    async fn list_all(&self) -> Result<Vec<Application>> {
        let rows = sqlx::query_as::<_, ApplicationRow>(&format!("{} ORDER BY id", SELECT_APPLICATIONS))
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Application::try_from).collect()
    }

    async fn list_active(&self) -> Result<Vec<Application>> {
        let rows = sqlx::query_as::<_, ApplicationRow>(&format!(
            "{} WHERE status = 'active' ORDER BY id",
            SELECT_APPLICATIONS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Application::try_from).collect()
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Application>> {
        let row = sqlx::query_as::<_, ApplicationRow>(&format!("{} WHERE id = $1", SELECT_APPLICATIONS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Application::try_from).transpose()
    }
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct ApplicationRow {
    id: i64,
    name: String,
    #[sqlx(rename = "type")]
    provider_type: String,
    base_url: String,
    auth_user: Option<String>,
    auth_secret: String,
    regex_pattern: Option<String>,
    status: String,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl TryFrom<ApplicationRow> for Application {
    type Error = RepositoryError;

    fn try_from(row: ApplicationRow) -> Result<Self> {
        let provider_type: ProviderType = row.provider_type.parse().map_err(|e| {
            RepositoryError::InvalidData(format!("application {}: {}", row.id, e))
        })?;
        let status: ApplicationStatus = row.status.parse().map_err(|e| {
            RepositoryError::InvalidData(format!("application {}: {}", row.id, e))
        })?;

        Ok(Application {
            id: row.id,
            name: row.name,
            provider_type,
            base_url: row.base_url,
            credentials: Credentials {
                user: row.auth_user,
                secret: row.auth_secret,
            },
            regex_pattern: row.regex_pattern,
            status,
            created_at: row.created_at,
        })
    }
}
