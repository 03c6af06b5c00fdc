use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::github::batch::DEFAULT_BATCH_SIZE;
use crate::github::transport::DEFAULT_ENDPOINT;
use crate::github::{ClientSettings, RetryPolicy};

pub const DEFAULT_CONFIG_FILE: &str = ".gh-metrics.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level configuration loaded from .gh-metrics.toml.
/// All fields are optional; the tool works with zero config.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub github: GitHubConfig,

    /// Rate-limit backoff policy
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    #[serde(default)]
    pub batch: BatchConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GitHubConfig {
    /// GitHub API token. Used only when neither --token nor GITHUB_TOKEN is set.
    pub token: Option<String>,
    /// GraphQL endpoint, e.g. for GitHub Enterprise Server
    pub endpoint: Option<String>,
    /// Nodes per page, 1..=100
    pub page_size: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RateLimitConfig {
    /// Longest acceptable wait for a rate-limit reset, in seconds
    pub max_wait_secs: Option<u64>,
    pub max_attempts: Option<u32>,
    /// Remaining-quota floor that triggers waiting for the reset
    pub min_remaining: Option<u32>,
    pub backoff_base_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BatchConfig {
    /// Users per batched query
    pub size: Option<usize>,
}

impl Config {
    /// Load configuration from `path`, or from .gh-metrics.toml in the
    /// current directory when no path is given. A missing default file yields
    /// the default config; a missing explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
        match path {
            Some(path) => Self::load_from(path),
            None => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                if path.exists() {
                    Self::load_from(path)
                } else {
                    Ok(Config::default())
                }
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Resolve the GitHub token: the --token flag wins, then GITHUB_TOKEN,
    /// then the config file.
    pub fn github_token(&self, flag: Option<String>) -> Option<String> {
        self.resolve_token(flag, std::env::var("GITHUB_TOKEN").ok())
    }

    fn resolve_token(&self, flag: Option<String>, env: Option<String>) -> Option<String> {
        let non_empty = |t: &String| !t.trim().is_empty();
        flag.filter(non_empty)
            .or_else(|| env.filter(non_empty))
            .or_else(|| self.github.token.clone().filter(non_empty))
    }

    pub fn endpoint(&self) -> &str {
        self.github.endpoint.as_deref().unwrap_or(DEFAULT_ENDPOINT)
    }

    pub fn batch_size(&self) -> usize {
        self.batch.size.unwrap_or(DEFAULT_BATCH_SIZE).max(1)
    }

    pub fn client_settings(&self) -> ClientSettings {
        let defaults = RetryPolicy::default();
        let limits = &self.rate_limit;
        ClientSettings {
            page_size: self.github.page_size.unwrap_or(100).clamp(1, 100),
            retry: RetryPolicy {
                max_wait: limits
                    .max_wait_secs
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.max_wait),
                max_attempts: limits.max_attempts.unwrap_or(defaults.max_attempts),
                min_remaining: limits.min_remaining.unwrap_or(defaults.min_remaining),
                backoff_base: limits
                    .backoff_base_ms
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.backoff_base),
            },
        }
    }
}
