use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use std::time::Duration;

use super::GitHubError;

/// Bounded retry behaviour for rate limits and transient failures.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Longest single wait the client accepts before giving up
    pub max_wait: Duration,
    /// Retries per request, shared by rate-limit and transient retries
    pub max_attempts: u32,
    /// Throttle pre-emptively once remaining quota drops to this value
    pub min_remaining: u32,
    /// Base delay for exponential backoff
    pub backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_wait: Duration::from_secs(900),
            max_attempts: 3,
            min_remaining: 10,
            backoff_base: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Reject waits above the ceiling.
    pub fn check_wait(&self, wait: Duration) -> Result<Duration, GitHubError> {
        if wait > self.max_wait {
            return Err(GitHubError::RateLimitExceeded {
                wait,
                max_wait: self.max_wait,
            });
        }
        Ok(wait)
    }

    /// Backoff before retry number `attempt` (0-based), capped at `max_wait`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        exponential_jitter_backoff(self.backoff_base, attempt, self.max_wait, 0.2)
    }
}

/// Quota state reported by the `x-ratelimit-*` headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub limit: u32,
    pub remaining: u32,
    pub reset: DateTime<Utc>,
}

impl RateLimitStatus {
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let number = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<i64>().ok())
        };
        let limit = number("x-ratelimit-limit")?;
        let remaining = number("x-ratelimit-remaining")?;
        let reset = DateTime::from_timestamp(number("x-ratelimit-reset")?, 0)?;
        Some(Self {
            limit: u32::try_from(limit).unwrap_or(0),
            remaining: u32::try_from(remaining).unwrap_or(0),
            reset,
        })
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }

    /// Time left until the quota resets; zero once the reset has passed.
    pub fn until_reset(&self, now: DateTime<Utc>) -> Duration {
        (self.reset - now).to_std().unwrap_or(Duration::ZERO)
    }
}

/// `retry-after` in delta-seconds form, as sent for secondary limits.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

pub fn exponential_jitter_backoff(
    base: Duration,
    attempt: u32,
    max: Duration,
    jitter_frac: f32,
) -> Duration {
    let factor = 1u32 << attempt.min(8);
    let capped = base.saturating_mul(factor).min(max);
    let nanos = capped.as_nanos() as i128;
    let jitter = ((nanos as f64) * (jitter_frac as f64)).round() as i128;
    let delta = if jitter > 0 {
        fastrand::i128(-jitter..=jitter)
    } else {
        0
    };
    let result = (nanos + delta).clamp(0, max.as_nanos() as i128);
    Duration::from_nanos(result as u64)
}
