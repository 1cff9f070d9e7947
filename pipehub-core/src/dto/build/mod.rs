//! Build DTOs

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Request to start a new build of a pipeline
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StartBuild {
    #[serde(default)]
    pub parameters: HashMap<String, serde_json::Value>,
}

/// Result of probing an application's provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub application_id: i64,
    pub connected: bool,
}
