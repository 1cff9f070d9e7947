//! Application domain types
//!
//! An application is one configured external CI/CD system together with the
//! credentials used to reach it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of external CI/CD system behind an application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    Jenkins,
    GitLab,
    GitHub,
    /// Reserved; no client is shipped for it yet
    AzureDevOps,
}

impl ProviderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderType::Jenkins => "jenkins",
            ProviderType::GitLab => "gitlab",
            ProviderType::GitHub => "github",
            ProviderType::AzureDevOps => "azuredevops",
        }
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "jenkins" => Ok(ProviderType::Jenkins),
            "gitlab" => Ok(ProviderType::GitLab),
            "github" => Ok(ProviderType::GitHub),
            "azuredevops" => Ok(ProviderType::AzureDevOps),
            other => Err(format!("unknown provider type: {}", other)),
        }
    }
}

/// Whether the application takes part in synchronization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Active,
    Inactive,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Active => "active",
            ApplicationStatus::Inactive => "inactive",
        }
    }
}

impl FromStr for ApplicationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "active" => Ok(ApplicationStatus::Active),
            "inactive" => Ok(ApplicationStatus::Inactive),
            other => Err(format!("unknown application status: {}", other)),
        }
    }
}

/// User/secret pair used to authenticate against the provider.
///
/// The secret is an API token for every provider. Jenkins also needs the
/// user name; GitLab and GitHub ignore it.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub user: Option<String>,
    #[serde(skip_serializing, default)]
    pub secret: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// A configured external CI/CD system
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Application {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub provider_type: ProviderType,
    pub base_url: String,
    pub credentials: Credentials,
    pub regex_pattern: Option<String>,
    pub status: ApplicationStatus,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Application {
    pub fn is_active(&self) -> bool {
        self.status == ApplicationStatus::Active
    }

    /// The declared name filter, ignoring blank patterns
    pub fn pattern(&self) -> Option<&str> {
        self.regex_pattern
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }
}
