//! Shared HTTP plumbing for the provider clients
//!
//! Wraps a configured reqwest client and a base URL, and turns every
//! transport failure, status code and payload problem into a [`ProviderError`].

use reqwest::header::HeaderMap;
use reqwest::redirect::Policy;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::ProviderSettings;
use crate::error::{ProviderError, Result};

/// Base URL plus an HTTP client carrying the provider credentials
#[derive(Debug, Clone)]
pub(crate) struct HttpTransport {
    /// Base URL of the provider API (e.g., "https://gitlab.example.com/api/v4")
    base_url: String,
    /// HTTP client instance
    client: Client,
}

impl HttpTransport {
    /// Create a transport whose requests always carry `headers`
    pub fn new(
        base_url: impl Into<String>,
        headers: HeaderMap,
        settings: &ProviderSettings,
    ) -> Result<Self> {
        let client = build_client(headers, settings, Policy::default())?;
        Ok(Self::with_client(base_url, client))
    }

    /// Like [`new`](Self::new) but redirects are returned to the caller
    /// instead of being followed
    pub fn without_redirects(
        base_url: impl Into<String>,
        headers: HeaderMap,
        settings: &ProviderSettings,
    ) -> Result<Self> {
        let client = build_client(headers, settings, Policy::none())?;
        Ok(Self::with_client(base_url, client))
    }

    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for a path relative to the base URL
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client.request(method, self.url(path))
    }

    /// Send a request and fail on any non-success status
    pub async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await?;
        check_status(response).await
    }

    /// Send a request where a 3xx answer also means the action was accepted
    pub async fn send_accepting_redirect(&self, request: RequestBuilder) -> Result<()> {
        let response = request.send().await?;
        let status = response.status();

        if status.is_redirection() {
            tracing::debug!("{} answered {}, not following", response.url(), status);
            return Ok(());
        }

        check_status(response).await?;
        Ok(())
    }

    pub async fn get(&self, path: &str) -> Result<Response> {
        self.send(self.request(Method::GET, path)).await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.get(path).await?;
        parse_json(response).await
    }

    pub async fn get_text(&self, path: &str) -> Result<String> {
        let response = self.get(path).await?;
        Ok(response.text().await?)
    }

    /// Like [`get_json`](Self::get_json) but maps an upstream 404 to `None`
    pub async fn get_json_optional<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        match self.get_json(path).await {
            Ok(value) => Ok(Some(value)),
            Err(ProviderError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Issue a GET and report whether it answered 200. Never fails.
    pub async fn probe(&self, path: &str) -> bool {
        match self.request(Method::GET, path).send().await {
            Ok(response) => response.status() == StatusCode::OK,
            Err(e) => {
                tracing::debug!("Connection probe to {} failed: {}", self.base_url, e);
                false
            }
        }
    }
}

fn build_client(headers: HeaderMap, settings: &ProviderSettings, redirect: Policy) -> Result<Client> {
    Client::builder()
        .default_headers(headers)
        .user_agent(settings.user_agent.clone())
        .timeout(settings.request_timeout)
        .redirect(redirect)
        .build()
        .map_err(|e| ProviderError::Configuration(format!("failed to build HTTP client: {}", e)))
}

// =============================================================================
// Response Handlers
// =============================================================================

/// Check the status code and turn failures into provider errors
pub(crate) async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();

    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().to_string();
    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());

    if status == StatusCode::NOT_FOUND {
        return Err(ProviderError::NotFound(url));
    }

    Err(ProviderError::status(status.as_u16(), error_text))
}

/// Deserialize a JSON body, classifying failures as data errors
pub(crate) async fn parse_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let body = response.text().await?;
    serde_json::from_str(&body)
        .map_err(|e| ProviderError::Data(format!("Failed to parse JSON response: {}", e)))
}
