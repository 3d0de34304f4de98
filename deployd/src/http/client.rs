//! HTTP client for the source-control REST API

use reqwest::{header, Client, StatusCode};
use scm_models::models::ErrorResponse;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::{debug, error};

use crate::errors::PlatformError;

const USER_AGENT: &str = concat!("deployd/", env!("CARGO_PKG_VERSION"));

/// HTTP client for the source-control host
pub struct HttpClient {
    client: Client,
    base_url: String,
}

impl HttpClient {
    /// Create a new HTTP client
    pub fn new(base_url: &str) -> Result<Self, PlatformError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Make an authenticated GET request
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        token: &SecretString,
    ) -> Result<T, PlatformError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .header(header::AUTHORIZATION, format!("token {}", token.expose_secret()))
            .header(header::ACCEPT, "application/vnd.github.v3+json")
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.message)
                .unwrap_or(body);
            error!("HTTP GET {} failed: {} - {}", path, status, message);

            return Err(match status {
                StatusCode::NOT_FOUND => PlatformError::NotFound(message),
                _ => PlatformError::SourceControlError(format!("{}: {}", status, message)),
            });
        }

        let body = response.json().await?;
        Ok(body)
    }
}
