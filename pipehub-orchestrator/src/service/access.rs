//! Access Service
//!
//! Resolves who is calling and which pipelines they may see. The snapshot is
//! rebuilt on every request from the User → Role → Pipeline graph.

use pipehub_core::domain::user::AccessLevel;
use std::collections::HashSet;

use super::{Result, ServiceError};
use crate::repository::UserStore;

/// Request-scoped view of the caller's access
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessSnapshot {
    pub user_id: i64,
    pub email: String,
    pub access_level: AccessLevel,
    pub role_ids: Vec<i64>,
    /// Pipelines granted through roles; ignored for admins
    pub pipeline_ids: HashSet<i64>,
}

impl AccessSnapshot {
    pub fn is_admin(&self) -> bool {
        self.access_level == AccessLevel::Admin
    }

    /// Whether the caller may see the pipeline with this id
    pub fn can_see(&self, pipeline_id: i64) -> bool {
        self.is_admin() || self.pipeline_ids.contains(&pipeline_id)
    }

    pub fn require_admin(&self) -> Result<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(ServiceError::Forbidden)
        }
    }
}

/// Build the snapshot for the user behind `email`.
///
/// Unknown and inactive users are both rejected as unauthenticated.
pub async fn resolve(users: &dyn UserStore, email: &str) -> Result<AccessSnapshot> {
    let email = email.trim();
    if email.is_empty() {
        return Err(ServiceError::Unauthorized);
    }

    let user = match users.find_by_email(email).await? {
        Some(user) if user.is_active() => user,
        Some(_) => {
            tracing::debug!("Rejecting inactive user {}", email);
            return Err(ServiceError::Unauthorized);
        }
        None => {
            tracing::debug!("Rejecting unknown user {}", email);
            return Err(ServiceError::Unauthorized);
        }
    };

    let role_ids = users.role_ids(user.id).await?;
    let pipeline_ids = if user.access_level == AccessLevel::Admin {
        HashSet::new()
    } else {
        users
            .pipeline_ids_for_roles(&role_ids)
            .await?
            .into_iter()
            .collect()
    };

    Ok(AccessSnapshot {
        user_id: user.id,
        email: user.email,
        access_level: user.access_level,
        role_ids,
        pipeline_ids,
    })
}
