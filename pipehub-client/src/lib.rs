//! PipeHub provider clients
//!
//! One async client per external CI/CD system, all behind the
//! [`ProviderClient`] trait so the sync pass and the request path never care
//! which provider they talk to. Every client normalizes builds, stages and
//! statuses into the shapes from `pipehub_core::domain::build`.
//!
//! # Example
//!
//! ```no_run
//! use pipehub_client::{ClientManager, ProviderSettings};
//! # use pipehub_core::domain::application::Application;
//!
//! # async fn run(application: Application) -> pipehub_client::Result<()> {
//! let manager = ClientManager::with_default_factories(ProviderSettings::default());
//! let client = manager.create_client(&application)?;
//!
//! for pipeline in client.list_pipelines().await? {
//!     println!("{} ({})", pipeline.name, pipeline.native_id);
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod github;
pub mod gitlab;
pub mod jenkins;
pub mod manager;
mod normalize;
pub mod provider;
mod transport;

// Re-export commonly used types
pub use error::{ProviderError, Result};
pub use github::GitHubClient;
pub use gitlab::GitLabClient;
pub use jenkins::JenkinsClient;
pub use manager::{ClientFactory, ClientManager, ProviderSettings};
pub use provider::{ProviderClient, filter_by_pattern};
pub use regex::Regex;
