//! Client construction per provider type

use pipehub_core::domain::application::{Application, ProviderType};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{ProviderError, Result};
use crate::github::GitHubClient;
use crate::gitlab::GitLabClient;
use crate::jenkins::JenkinsClient;
use crate::provider::ProviderClient;

/// Settings shared by every client the manager builds
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    /// Upper bound for a single provider request
    pub request_timeout: Duration,
    /// Sent with every request (GitHub rejects requests without one)
    pub user_agent: String,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(3),
            user_agent: format!("pipehub/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Builds a client for one application
pub trait ClientFactory: Send + Sync {
    fn create_client(
        &self,
        application: &Application,
        settings: &ProviderSettings,
    ) -> Result<Box<dyn ProviderClient>>;
}

impl<F> ClientFactory for F
where
    F: Fn(&Application, &ProviderSettings) -> Result<Box<dyn ProviderClient>> + Send + Sync,
{
    fn create_client(
        &self,
        application: &Application,
        settings: &ProviderSettings,
    ) -> Result<Box<dyn ProviderClient>> {
        self(application, settings)
    }
}

pub struct JenkinsFactory;

impl ClientFactory for JenkinsFactory {
    fn create_client(
        &self,
        application: &Application,
        settings: &ProviderSettings,
    ) -> Result<Box<dyn ProviderClient>> {
        Ok(Box::new(JenkinsClient::from_application(application, settings)?))
    }
}

pub struct GitLabFactory;

impl ClientFactory for GitLabFactory {
    fn create_client(
        &self,
        application: &Application,
        settings: &ProviderSettings,
    ) -> Result<Box<dyn ProviderClient>> {
        Ok(Box::new(GitLabClient::from_application(application, settings)?))
    }
}

pub struct GitHubFactory;

impl ClientFactory for GitHubFactory {
    fn create_client(
        &self,
        application: &Application,
        settings: &ProviderSettings,
    ) -> Result<Box<dyn ProviderClient>> {
        Ok(Box::new(GitHubClient::from_application(application, settings)?))
    }
}

/// Picks the factory registered for an application's provider type.
///
/// Clients are built fresh on every call from the application passed in, so
/// credential or URL changes take effect on the next request.
#[derive(Clone)]
pub struct ClientManager {
    factories: HashMap<ProviderType, Arc<dyn ClientFactory>>,
    settings: ProviderSettings,
}

impl ClientManager {
    /// Manager with no factories registered
    pub fn new(settings: ProviderSettings) -> Self {
        Self {
            factories: HashMap::new(),
            settings,
        }
    }

    /// Manager wired with the Jenkins, GitLab and GitHub clients.
    ///
    /// Azure DevOps is a reserved type with no client.
    pub fn with_default_factories(settings: ProviderSettings) -> Self {
        Self::new(settings)
            .with_factory(ProviderType::Jenkins, JenkinsFactory)
            .with_factory(ProviderType::GitLab, GitLabFactory)
            .with_factory(ProviderType::GitHub, GitHubFactory)
    }

    /// Register or replace the factory for a provider type
    pub fn register(&mut self, provider_type: ProviderType, factory: impl ClientFactory + 'static) {
        self.factories.insert(provider_type, Arc::new(factory));
    }

    pub fn with_factory(mut self, provider_type: ProviderType, factory: impl ClientFactory + 'static) -> Self {
        self.register(provider_type, factory);
        self
    }

    pub fn create_client(&self, application: &Application) -> Result<Box<dyn ProviderClient>> {
        let factory = self.factories.get(&application.provider_type).ok_or_else(|| {
            ProviderError::Configuration(format!(
                "no client registered for provider type {}",
                application.provider_type
            ))
        })?;

        factory.create_client(application, &self.settings)
    }
}

impl Default for ClientManager {
    fn default() -> Self {
        Self::with_default_factories(ProviderSettings::default())
    }
}
