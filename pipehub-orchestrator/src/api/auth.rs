//! Request authentication middleware
//!
//! The caller is authenticated upstream; the session user's email arrives in
//! the configured header. `require_session` resolves it into an
//! [`AccessSnapshot`] stored in the request extensions, and `admin_guard`
//! reads that snapshot back on administrative routes.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::api::AppState;
use crate::api::error::ApiError;
use crate::service::access::{self, AccessSnapshot};

/// Resolve the session user, or reject with 401
pub async fn require_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let email = request
        .headers()
        .get(&state.session_header)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
        .ok_or_else(|| ApiError::Unauthorized("Authentication required".to_string()))?;

    let snapshot = access::resolve(state.users.as_ref(), &email).await?;
    tracing::debug!(
        "Request by user {} ({} visible pipeline(s), admin: {})",
        snapshot.user_id,
        snapshot.pipeline_ids.len(),
        snapshot.is_admin()
    );

    request.extensions_mut().insert(snapshot);
    Ok(next.run(request).await)
}

/// Reject non-admins with 403; must run inside [`require_session`]
pub async fn admin_guard(request: Request, next: Next) -> Result<Response, ApiError> {
    let snapshot = request
        .extensions()
        .get::<AccessSnapshot>()
        .ok_or_else(|| ApiError::Unauthorized("Authentication required".to_string()))?;

    if !snapshot.is_admin() {
        tracing::warn!(
            "Access denied for user {}: admin access required for {}",
            snapshot.user_id,
            request.uri().path()
        );
        return Err(ApiError::Forbidden(
            "Administrator access required".to_string(),
        ));
    }

    Ok(next.run(request).await)
}
