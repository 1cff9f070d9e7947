//! Pipeline parameter schema

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// One declared input of a pipeline.
///
/// `value` holds the default for plain parameters and the list of options for
/// choice parameters. Protected parameters never carry their value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineParameter {
    pub key: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub value: JsonValue,
    pub protected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl PipelineParameter {
    pub fn new(key: impl Into<String>, kind: impl Into<String>, value: JsonValue) -> Self {
        Self {
            key: key.into(),
            kind: kind.into(),
            value,
            protected: false,
            description: None,
        }
    }

    /// A parameter whose value must not leave the provider
    pub fn protected(key: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            kind: kind.into(),
            value: JsonValue::String(String::new()),
            protected: true,
            description: None,
        }
    }

    /// Choice parameter listing the given options
    pub fn choice<I, S>(key: impl Into<String>, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let options = options
            .into_iter()
            .map(|o| JsonValue::String(o.into()))
            .collect();
        Self::new(key, "choice", JsonValue::Array(options))
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    /// Drops the value when the parameter is protected
    pub fn redacted(mut self) -> Self {
        if self.protected {
            self.value = JsonValue::String(String::new());
        }
        self
    }
}
