use anyhow::Context;
use axum::http::HeaderName;
use pipehub_client::{ClientManager, ProviderSettings};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod api;
pub mod config;
pub mod db;
pub mod repository;
pub mod service;
pub mod shutdown;
pub mod sync;
#[cfg(test)]
mod testing;

use crate::api::AppState;
use crate::config::Config;
use crate::repository::{PgApplicationStore, PgPipelineStore, PgUserStore};
use crate::sync::SyncScheduler;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pipehub_orchestrator=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Pipehub Orchestrator...");

    let config = Config::from_env()?;
    config.validate()?;

    tracing::info!("Connecting to database...");

    // Create database connection pool
    let pool = db::create_pool(&config.database_url)
        .await
        .context("Failed to create database pool")?;

    tracing::info!("Database connection pool created");

    // Run migrations
    db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;

    let applications = Arc::new(PgApplicationStore::new(pool.clone()));
    let pipelines = Arc::new(PgPipelineStore::new(pool.clone()));
    let clients = Arc::new(ClientManager::with_default_factories(ProviderSettings {
        request_timeout: config.provider_timeout,
        ..ProviderSettings::default()
    }));

    let shutdown = shutdown::install_signal_handler();

    // Background pipeline sync
    let scheduler = SyncScheduler::new(
        applications.clone(),
        pipelines.clone(),
        clients.clone(),
        config.sync_interval,
        config.application_fetch_timeout,
    );
    let sync_handle = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { scheduler.run(shutdown).await })
    };

    // Build router with all API endpoints
    let app = api::create_router(AppState {
        applications,
        pipelines,
        users: Arc::new(PgUserStore::new(pool)),
        clients,
        session_header: HeaderName::from_bytes(config.session_user_header.as_bytes())
            .context("Invalid SESSION_USER_HEADER")?,
    });

    tracing::info!("Listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    let server_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { server_shutdown.cancelled().await })
        .await
        .context("Server error")?;

    // The server also stops on errors; make sure the sync loop follows
    shutdown.cancel();
    match tokio::time::timeout(config.shutdown_grace_period, sync_handle).await {
        Ok(Ok(())) => tracing::info!("Pipeline sync shut down cleanly"),
        Ok(Err(e)) => tracing::error!("Pipeline sync task failed: {}", e),
        Err(_) => tracing::warn!(
            "Pipeline sync did not stop within {:?}, abandoning it",
            config.shutdown_grace_period
        ),
    }

    tracing::info!("Pipehub Orchestrator stopped");
    Ok(())
}
