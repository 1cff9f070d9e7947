//! Pipeline DTOs

use serde::{Deserialize, Serialize};

use crate::domain::application::ProviderType;

/// Request to create a pipeline row.
///
/// Used both by the manual create endpoint and by the sync pass when it
/// inserts newly discovered pipelines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePipeline {
    pub name: String,
    pub application_id: i64,
    pub project_id: String,
}

/// A pipeline as reported by a provider during one sync pass.
///
/// Never persisted as is; it becomes a [`CreatePipeline`] when new.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchedPipeline {
    pub native_id: String,
    pub name: String,
    pub application_id: i64,
    pub provider_type: ProviderType,
}

impl FetchedPipeline {
    pub fn new(
        native_id: impl Into<String>,
        name: impl Into<String>,
        application_id: i64,
        provider_type: ProviderType,
    ) -> Self {
        Self {
            native_id: native_id.into(),
            name: name.into(),
            application_id,
            provider_type,
        }
    }

    pub fn to_create(&self) -> CreatePipeline {
        CreatePipeline {
            name: self.name.clone(),
            application_id: self.application_id,
            project_id: self.native_id.clone(),
        }
    }
}
