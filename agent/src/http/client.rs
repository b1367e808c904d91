//! HTTP client implementation

use std::time::Duration;

use reqwest::{header, Client, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error};
use url::Url;

use crate::errors::AgentError;

/// HTTP client for the outbound collaborators
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    base_url: Url,
}

impl HttpClient {
    /// Create a new HTTP client with a per-request timeout
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, AgentError> {
        let client = Client::builder().timeout(timeout).build()?;

        // A trailing slash keeps the last path segment when joining
        let base_url = Url::parse(&format!("{}/", base_url.trim_end_matches('/')))?;

        Ok(Self { client, base_url })
    }

    /// Resolve a path relative to the base URL
    pub fn url(&self, path: &str) -> Result<Url, AgentError> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    /// Make a JSON POST request, optionally with a bearer token
    pub async fn post_json<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        token: Option<&SecretString>,
        body: &B,
    ) -> Result<T, AgentError> {
        let url = self.url(path)?;
        debug!("POST {}", url);

        let mut request = self.client.post(url).json(body);
        if let Some(token) = token {
            request = request.header(
                header::AUTHORIZATION,
                format!("Bearer {}", token.expose_secret()),
            );
        }

        let response = request.send().await?;
        Self::parse("POST", response).await
    }

    /// Make a form-encoded POST request
    ///
    /// `path` may carry a secret (e.g. a send key), so neither the log line nor
    /// a returned transport error includes the request URL.
    pub async fn post_form<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        form: &B,
    ) -> Result<T, AgentError> {
        let url = self.url(path)?;
        debug!("POST {} (form)", self.base_url);

        let response = self
            .client
            .post(url)
            .form(form)
            .send()
            .await
            .map_err(|e| AgentError::HttpError(e.without_url()))?;
        Self::parse("POST", response).await.map_err(redact_url)
    }

    async fn parse<T: DeserializeOwned>(method: &str, response: Response) -> Result<T, AgentError> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("HTTP {} failed: {} - {}", method, status, body);
            return Err(AgentError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.json().await?;
        Ok(body)
    }
}

/// Drop the request URL from a reqwest error
fn redact_url(err: AgentError) -> AgentError {
    match err {
        AgentError::HttpError(e) => AgentError::HttpError(e.without_url()),
        other => other,
    }
}
