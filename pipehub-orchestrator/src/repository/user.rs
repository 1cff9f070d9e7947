//! User Repository
//!
//! Users and the role graph that grants them pipelines.

use async_trait::async_trait;
use pipehub_core::domain::user::{AccessLevel, User, UserStatus};
use sqlx::PgPool;

use super::{RepositoryError, Result};

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Roles the user is a member of
    async fn role_ids(&self, user_id: i64) -> Result<Vec<i64>>;

    /// Pipelines granted to any of the given roles, without duplicates
    async fn pipeline_ids_for_roles(&self, role_ids: &[i64]) -> Result<Vec<i64>>;
}

/// Postgres implementation of UserStore
#[derive(Debug, Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, email, first_name, last_name, status, access_level
            FROM users
            WHERE LOWER(email) = LOWER($1)
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    async fn role_ids(&self, user_id: i64) -> Result<Vec<i64>> {
        let ids = sqlx::query_scalar::<_, i64>(
            "SELECT role_id FROM access_role_members WHERE user_id = $1 ORDER BY role_id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    async fn pipeline_ids_for_roles(&self, role_ids: &[i64]) -> Result<Vec<i64>> {
        if role_ids.is_empty() {
            return Ok(vec![]);
        }

        let ids = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT DISTINCT pipeline_id
            FROM access_role_pipelines
            WHERE role_id = ANY($1)
            ORDER BY pipeline_id
            "#,
        )
        .bind(role_ids.to_vec())
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    email: String,
    first_name: Option<String>,
    last_name: Option<String>,
    status: String,
    access_level: String,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self> {
        let status: UserStatus = row
            .status
            .parse()
            .map_err(|e| RepositoryError::InvalidData(format!("user {}: {}", row.id, e)))?;
        let access_level: AccessLevel = row
            .access_level
            .parse()
            .map_err(|e| RepositoryError::InvalidData(format!("user {}: {}", row.id, e)))?;

        Ok(User {
            id: row.id,
            email: row.email,
            first_name: row.first_name,
            last_name: row.last_name,
            status,
            access_level,
        })
    }
}
