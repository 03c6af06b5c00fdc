use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use super::rate_limit::{parse_retry_after, RateLimitStatus};
use super::GitHubError;

pub const DEFAULT_ENDPOINT: &str = "https://api.github.com/graphql";

/// Raw outcome of one HTTP round trip. Non-2xx statuses are returned here,
/// not as errors, so the client can classify them.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub rate_limit: Option<RateLimitStatus>,
    pub retry_after: Option<Duration>,
    pub body: String,
}

/// Sends a GraphQL request body and returns the raw response.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post(&self, body: &serde_json::Value) -> Result<TransportResponse, GitHubError>;
}

pub struct ReqwestTransport {
    client: reqwest::Client,
    endpoint: String,
    token: String,
}

impl ReqwestTransport {
    pub fn new(endpoint: impl Into<String>, token: impl Into<String>) -> Result<Self, GitHubError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("gh-metrics/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            token: token.into(),
        })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn post(&self, body: &serde_json::Value) -> Result<TransportResponse, GitHubError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?;

        let status = response.status().as_u16();
        let rate_limit = RateLimitStatus::from_headers(response.headers());
        let retry_after = parse_retry_after(response.headers());
        let body = response.text().await?;
        debug!(
            status,
            bytes = body.len(),
            limit = rate_limit.as_ref().map(|r| r.limit),
            remaining = rate_limit.as_ref().map(|r| r.remaining),
            "graphql response"
        );

        Ok(TransportResponse {
            status,
            rate_limit,
            retry_after,
            body,
        })
    }
}
