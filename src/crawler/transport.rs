//! Transport to the GraphQL search endpoint
//!
//! The transport only moves bytes. Status classification, GraphQL error
//! handling and retries live in [`PagedFetcher`](crate::crawler::PagedFetcher).

use crate::config::GithubConfig;
use reqwest::header::ACCEPT;
use reqwest::Client;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Header carrying the remaining request quota
pub const RATE_LIMIT_REMAINING_HEADER: &str = "x-ratelimit-remaining";

/// Header GitHub sends with secondary rate limit responses
pub const RETRY_AFTER_HEADER: &str = "retry-after";

/// Response as received from the endpoint, before any interpretation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,

    /// Value of the `X-RateLimit-Remaining` header, if present and numeric
    pub rate_limit_remaining: Option<u32>,

    /// Value of the `Retry-After` header in seconds, if present and numeric
    pub retry_after_secs: Option<u64>,

    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            rate_limit_remaining: None,
            retry_after_secs: None,
            body: body.into(),
        }
    }

    pub fn with_retry_after(mut self, secs: u64) -> Self {
        self.retry_after_secs = Some(secs);
        self
    }
}

/// Failures raised before any HTTP status was received
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Sends one GraphQL payload and returns the raw response
pub trait Transport: Send + Sync {
    fn post(
        &self,
        payload: &serde_json::Value,
    ) -> impl Future<Output = Result<RawResponse, TransportError>> + Send;
}

/// Builds the HTTP client used for GraphQL requests
///
/// # Arguments
///
/// * `config` - Endpoint and identity configuration
///
/// # Returns
///
/// * `Ok(Client)` - Client with user agent, timeouts and compression set
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &GithubConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// `reqwest` transport authenticating with a bearer token
#[derive(Debug, Clone)]
pub struct GraphQlTransport {
    client: Client,
    endpoint: String,
    token: String,
}

impl GraphQlTransport {
    /// Creates a transport for the configured endpoint
    pub fn new(config: &GithubConfig, token: impl Into<String>) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(config)?,
            endpoint: config.api_url.clone(),
            token: token.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Transport for GraphQlTransport {
    async fn post(&self, payload: &serde_json::Value) -> Result<RawResponse, TransportError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .header(ACCEPT, "application/json")
            .json(payload)
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = response.status().as_u16();
        let rate_limit_remaining = numeric_header(&response, RATE_LIMIT_REMAINING_HEADER);
        let retry_after_secs = numeric_header(&response, RETRY_AFTER_HEADER);

        let body = response.text().await.map_err(classify_reqwest_error)?;

        Ok(RawResponse {
            status,
            rate_limit_remaining,
            retry_after_secs,
            body,
        })
    }
}

fn numeric_header<T: std::str::FromStr>(response: &reqwest::Response, name: &str) -> Option<T> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

fn classify_reqwest_error(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout(error.to_string())
    } else {
        TransportError::Network(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn github_config() -> GithubConfig {
        GithubConfig {
            api_url: "https://api.github.com/graphql".to_string(),
            token_env: "GITHUB_TOKEN".to_string(),
            user_agent: "forge-census-test/1.0".to_string(),
            request_timeout_secs: 5,
        }
    }

    #[test]
    fn test_build_http_client() {
        assert!(build_http_client(&github_config()).is_ok());
    }

    #[test]
    fn test_transport_keeps_endpoint() {
        let transport = GraphQlTransport::new(&github_config(), "token").unwrap();
        assert_eq!(transport.endpoint(), "https://api.github.com/graphql");
    }

    #[test]
    fn test_raw_response_new() {
        let raw = RawResponse::new(200, "{}");
        assert_eq!(raw.status, 200);
        assert_eq!(raw.rate_limit_remaining, None);
        assert_eq!(raw.retry_after_secs, None);
        assert_eq!(raw.with_retry_after(30).retry_after_secs, Some(30));
    }
}
