pub mod batch;
pub mod client;
pub mod parse;
pub mod rate_limit;
pub mod transport;
pub mod types;

pub use batch::QueryBatcher;
pub use client::{ClientSettings, GitHubClient};
pub use rate_limit::RetryPolicy;
pub use types::{MemberType, OrgMember, PullRequestRecord, ReviewRecord, UserActivity};

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GitHubError {
    #[error("Authentication failed: {0}. Pass a valid token with --token or set GITHUB_TOKEN")]
    Authentication(String),

    #[error("Cannot access organization '{org}': {reason}")]
    OrganizationAccess { org: String, reason: String },

    #[error("GitHub rate limit exceeded: reset is {}s away, maximum wait is {}s", .wait.as_secs(), .max_wait.as_secs())]
    RateLimitExceeded { wait: Duration, max_wait: Duration },

    #[error("GitHub kept rate limiting requests after {retries} retries; try again later")]
    RateLimitRetriesExhausted { retries: u32 },

    #[error("GitHub rejected the query: {0}")]
    QueryRejected(String),

    #[error("GitHub API returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("GitHub API request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Failed to parse GitHub response: {0}")]
    Parse(String),
}

impl GitHubError {
    /// Transient failures worth retrying with backoff.
    pub fn is_transient(&self) -> bool {
        match self {
            GitHubError::Request(_) => true,
            GitHubError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for GitHubError {
    fn from(err: serde_json::Error) -> Self {
        GitHubError::Parse(err.to_string())
    }
}

#[cfg(test)]
pub(crate) mod fake;
