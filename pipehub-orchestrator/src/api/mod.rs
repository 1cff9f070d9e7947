//! API Module
//!
//! HTTP API layer for the orchestrator.
//! Each submodule handles endpoints for a specific domain.

pub mod application;
pub mod auth;
pub mod build;
pub mod error;
pub mod health;
pub mod pipeline;

use axum::{
    Router,
    http::HeaderName,
    middleware,
    routing::{get, post},
};
use pipehub_client::ClientManager;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::repository::{ApplicationStore, PipelineStore, UserStore};
use crate::service::build::BuildContext;

/// Shared state of every handler
#[derive(Clone)]
pub struct AppState {
    pub applications: Arc<dyn ApplicationStore>,
    pub pipelines: Arc<dyn PipelineStore>,
    pub users: Arc<dyn UserStore>,
    pub clients: Arc<ClientManager>,
    /// Header carrying the authenticated user's email
    pub session_header: HeaderName,
}

impl AppState {
    pub fn builds(&self) -> BuildContext<'_> {
        BuildContext {
            applications: self.applications.as_ref(),
            pipelines: self.pipelines.as_ref(),
            clients: self.clients.as_ref(),
        }
    }
}

/// Create the main API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    let admin_routes = Router::new()
        .route("/pipelines", post(pipeline::create_pipeline))
        .route(
            "/applications/{id}/connection",
            get(application::check_connection),
        )
        .route_layer(middleware::from_fn(auth::admin_guard));

    let authenticated = Router::new()
        // Pipeline endpoints
        .route("/pipelines", get(pipeline::list_pipelines))
        .route("/pipelines/{id}", get(pipeline::get_pipeline))
        .route("/pipelines/{id}/parameters", get(build::get_parameters))
        // Build endpoints
        .route(
            "/pipelines/{id}/builds",
            get(build::list_builds).post(build::start_build),
        )
        .route("/pipelines/{id}/builds/{build_id}", get(build::get_build))
        .route(
            "/pipelines/{id}/builds/{build_id}/retry",
            post(build::retry_build),
        )
        .route(
            "/pipelines/{id}/builds/{build_id}/cancel",
            post(build::cancel_build),
        )
        .route("/pipelines/{id}/jobs/{job_id}/log", get(build::get_job_log))
        .merge(admin_routes)
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_session,
        ));

    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .merge(authenticated)
        // Add state and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
