//! Pipeline Repository
//!
//! Handles all database operations related to mirrored pipelines.
//! `(name, application_id)` is unique; violations surface as
//! [`RepositoryError::Conflict`](super::RepositoryError::Conflict).

use async_trait::async_trait;
use pipehub_core::domain::pipeline::Pipeline;
use pipehub_core::dto::pipeline::CreatePipeline;
use sqlx::{PgPool, Postgres, QueryBuilder};

use super::Result;

#[async_trait]
pub trait PipelineStore: Send + Sync {
    async fn list_all(&self) -> Result<Vec<Pipeline>>;

    async fn list_by_application_ids(&self, application_ids: &[i64]) -> Result<Vec<Pipeline>>;

    async fn list_by_ids(&self, ids: &[i64]) -> Result<Vec<Pipeline>>;

    async fn find_by_id(&self, id: i64) -> Result<Option<Pipeline>>;

    async fn create(&self, req: CreatePipeline) -> Result<Pipeline>;

    /// Insert all rows or none; returns the number of rows inserted
    async fn create_bulk(&self, reqs: &[CreatePipeline]) -> Result<u64>;

    /// Delete the given ids; returns the number of rows deleted
    async fn delete_bulk(&self, ids: &[i64]) -> Result<u64>;
}

/// Postgres implementation of PipelineStore
#[derive(Debug, Clone)]
pub struct PgPipelineStore {
    pool: PgPool,
}

impl PgPipelineStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PipelineStore for PgPipelineStore {
    async fn list_all(&self) -> Result<Vec<Pipeline>> {
        let rows = sqlx::query_as::<_, PipelineRow>(
            r#"
            SELECT id, name, application_id, project_id, created_at
            FROM pipelines
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn list_by_application_ids(&self, application_ids: &[i64]) -> Result<Vec<Pipeline>> {
        if application_ids.is_empty() {
            return Ok(vec![]);
        }

        let rows = sqlx::query_as::<_, PipelineRow>(
            r#"
            SELECT id, name, application_id, project_id, created_at
            FROM pipelines
            WHERE application_id = ANY($1)
            ORDER BY id
            "#,
        )
        .bind(application_ids.to_vec())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn list_by_ids(&self, ids: &[i64]) -> Result<Vec<Pipeline>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        let rows = sqlx::query_as::<_, PipelineRow>(
            r#"
            SELECT id, name, application_id, project_id, created_at
            FROM pipelines
            WHERE id = ANY($1)
            ORDER BY id
            "#,
        )
        .bind(ids.to_vec())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Pipeline>> {
        let row = sqlx::query_as::<_, PipelineRow>(
            r#"
            SELECT id, name, application_id, project_id, created_at
            FROM pipelines
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into()))
    }

    async fn create(&self, req: CreatePipeline) -> Result<Pipeline> {
        let row = sqlx::query_as::<_, PipelineRow>(
            r#"
            INSERT INTO pipelines (name, application_id, project_id)
            VALUES ($1, $2, $3)
            RETURNING id, name, application_id, project_id, created_at
            "#,
        )
        .bind(&req.name)
        .bind(req.application_id)
        .bind(&req.project_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn create_bulk(&self, reqs: &[CreatePipeline]) -> Result<u64> {
        if reqs.is_empty() {
            return Ok(0);
        }

        // A single statement, so a uniqueness violation rejects the whole batch
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO pipelines (name, application_id, project_id) ");
        builder.push_values(reqs, |mut row, req| {
            row.push_bind(req.name.clone())
                .push_bind(req.application_id)
                .push_bind(req.project_id.clone());
        });

        let result = builder.build().execute(&self.pool).await?;

        Ok(result.rows_affected())
    }

    async fn delete_bulk(&self, ids: &[i64]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query("DELETE FROM pipelines WHERE id = ANY($1)")
            .bind(ids.to_vec())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct PipelineRow {
    id: i64,
    name: String,
    application_id: i64,
    project_id: String,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl From<PipelineRow> for Pipeline {
    fn from(row: PipelineRow) -> Self {
        Pipeline {
            id: row.id,
            name: row.name,
            application_id: row.application_id,
            project_id: row.project_id,
            created_at: row.created_at,
        }
    }
}
