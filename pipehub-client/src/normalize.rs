//! Helpers shared by the provider clients to build the normalized shapes

use pipehub_core::domain::parameter::PipelineParameter;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::sync::OnceLock;

use crate::error::{ProviderError, Result};

fn ansi_escape() -> &'static Regex {
    static ANSI: OnceLock<Regex> = OnceLock::new();
    ANSI.get_or_init(|| {
        Regex::new(r"(\x9B|\x1B\[)[0-?]*[ -/]*[@-~]").expect("ANSI escape pattern is valid")
    })
}

/// Remove terminal color/control sequences
pub fn strip_ansi(text: &str) -> String {
    ansi_escape().replace_all(text, "").into_owned()
}

/// Split a raw job log into clean lines
pub fn log_lines(text: &str) -> Vec<String> {
    strip_ansi(text).lines().map(str::to_string).collect()
}

/// Parse an RFC 3339 timestamp into unix seconds
pub fn parse_timestamp(value: &str) -> Result<i64> {
    chrono::DateTime::parse_from_rfc3339(value)
        .map(|t| t.timestamp())
        .map_err(|e| ProviderError::Data(format!("invalid timestamp '{}': {}", value, e)))
}

/// Lenient variant for optional fields
pub fn parse_optional_timestamp(value: Option<&str>) -> Option<i64> {
    value.and_then(|v| parse_timestamp(v).ok())
}

/// Whole seconds between two RFC 3339 timestamps, 0 when either is missing
pub fn seconds_between(start: Option<&str>, end: Option<&str>) -> i64 {
    match (parse_optional_timestamp(start), parse_optional_timestamp(end)) {
        (Some(start), Some(end)) if end > start => end - start,
        _ => 0,
    }
}

/// Validate that an identifier used in a URL path is numeric
pub fn numeric_id<'a>(value: &'a str, what: &str) -> Result<&'a str> {
    if !value.is_empty() && value.chars().all(|c| c.is_ascii_digit()) {
        Ok(value)
    } else {
        Err(ProviderError::InvalidRequest(format!(
            "{} must be numeric, got '{}'",
            what, value
        )))
    }
}

/// Render a parameter value the way form/variable APIs expect it
pub fn value_to_string(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        JsonValue::Null => String::new(),
        other => other.to_string(),
    }
}

// =============================================================================
// parameters.json
// =============================================================================

/// Optional `parameters.json` checked into a repository to describe inputs
#[derive(Debug, Deserialize)]
struct ParametersFile {
    #[serde(default)]
    parameters: Vec<ParameterEntry>,
}

#[derive(Debug, Deserialize)]
struct ParameterEntry {
    id: String,
    #[serde(rename = "type", default = "default_kind")]
    kind: String,
    #[serde(default)]
    value: JsonValue,
    #[serde(default)]
    description: Option<String>,
}

fn default_kind() -> String {
    "string".to_string()
}

/// Parse a `parameters.json` document.
///
/// The `branch` entry is skipped since every client already declares it.
pub fn parse_parameters_file(content: &str) -> Result<Vec<PipelineParameter>> {
    let file: ParametersFile = serde_json::from_str(content)
        .map_err(|e| ProviderError::Data(format!("invalid parameters.json: {}", e)))?;

    Ok(file
        .parameters
        .into_iter()
        .filter(|p| p.id != "branch")
        .map(|p| PipelineParameter::new(p.id, p.kind, p.value).with_description(p.description))
        .collect())
}
