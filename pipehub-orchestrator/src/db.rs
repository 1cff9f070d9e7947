use sqlx::{PgPool, postgres::PgPoolOptions};
use std::time::Duration;

pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
}

const APPLICATIONS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS applications (
        id BIGSERIAL PRIMARY KEY,
        name VARCHAR(255) NOT NULL,
        type VARCHAR(32) NOT NULL,
        base_url TEXT NOT NULL,
        auth_user VARCHAR(255),
        auth_secret TEXT NOT NULL DEFAULT '',
        regex_pattern TEXT,
        status VARCHAR(16) NOT NULL DEFAULT 'active',
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        CONSTRAINT applications_name_key UNIQUE (name)
    )
"#;

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    // Provider connections
    sqlx::query(APPLICATIONS_TABLE).execute(pool).await?;

    // Tables created before application names were unique
    sqlx::query(
        r#"
        DO $$
        BEGIN
            IF NOT EXISTS (
                SELECT 1 FROM pg_constraint WHERE conname = 'applications_name_key'
            ) THEN
                ALTER TABLE applications
                    ADD CONSTRAINT applications_name_key UNIQUE (name);
            END IF;
        END
        $$
        "#,
    )
    .execute(pool)
    .await?;

    // Mirrored pipelines
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS pipelines (
            id BIGSERIAL PRIMARY KEY,
            name VARCHAR(255) NOT NULL,
            application_id BIGINT NOT NULL REFERENCES applications(id) ON DELETE CASCADE,
            project_id VARCHAR(255) NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            CONSTRAINT pipelines_name_application_key UNIQUE (name, application_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id BIGSERIAL PRIMARY KEY,
            email VARCHAR(255) NOT NULL UNIQUE,
            first_name VARCHAR(255),
            last_name VARCHAR(255),
            status VARCHAR(16) NOT NULL DEFAULT 'active',
            access_level VARCHAR(16) NOT NULL DEFAULT 'user'
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Role graph: users -> roles -> pipelines
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS access_roles (
            id BIGSERIAL PRIMARY KEY,
            name VARCHAR(255) NOT NULL UNIQUE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS access_role_members (
            role_id BIGINT NOT NULL REFERENCES access_roles(id) ON DELETE CASCADE,
            user_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            PRIMARY KEY (role_id, user_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS access_role_pipelines (
            role_id BIGINT NOT NULL REFERENCES access_roles(id) ON DELETE CASCADE,
            pipeline_id BIGINT NOT NULL REFERENCES pipelines(id) ON DELETE CASCADE,
            PRIMARY KEY (role_id, pipeline_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_pipelines_application_id ON pipelines(application_id)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_applications_status ON applications(status)")
        .execute(pool)
        .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_access_role_members_user_id ON access_role_members(user_id)",
    )
    .execute(pool)
    .await?;

    tracing::info!("Database migrations completed");

    Ok(())
}
