use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

use super::batch::ActivityPager;
use super::parse::{self, Connection, MemberNode, ResponseData};
use super::rate_limit::{RateLimitStatus, RetryPolicy};
use super::transport::{ReqwestTransport, Transport, TransportResponse};
use super::types::{OrgMember, UserActivity};
use super::GitHubError;

const MEMBERS_QUERY: &str = r#"query($org: String!, $first: Int!, $cursor: String) {
  organization(login: $org) {
    membersWithRole(first: $first, after: $cursor) {
      nodes { login url __typename }
      pageInfo { hasNextPage endCursor }
    }
  }
}"#;

/// Tunables shared by every request of one invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientSettings {
    /// Nodes requested per connection page (GitHub allows at most 100)
    pub page_size: u32,
    pub retry: RetryPolicy,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            page_size: 100,
            retry: RetryPolicy::default(),
        }
    }
}

/// What one HTTP round trip amounted to.
enum Outcome {
    Data(ResponseData),
    RateLimited(Duration),
    Failed(GitHubError),
}

/// Authenticated GraphQL client for one invocation.
pub struct GitHubClient {
    transport: Arc<dyn Transport>,
    settings: ClientSettings,
    quota: Mutex<Option<RateLimitStatus>>,
}

impl GitHubClient {
    /// Build a client that talks to `endpoint` over HTTPS.
    /// Fails with `Authentication` when no usable token is supplied.
    pub fn new(
        token: Option<String>,
        endpoint: &str,
        settings: ClientSettings,
    ) -> Result<Self, GitHubError> {
        let token = token
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| GitHubError::Authentication("no GitHub token provided".to_string()))?;
        let transport = ReqwestTransport::new(endpoint, token)?;
        Ok(Self::with_transport(Arc::new(transport), settings))
    }

    pub fn with_transport(transport: Arc<dyn Transport>, settings: ClientSettings) -> Self {
        Self {
            transport,
            settings,
            quota: Mutex::new(None),
        }
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    /// Run one GraphQL query scoped to `org` and return its `data` object,
    /// along with errors for fields GitHub could not resolve.
    ///
    /// Rate-limit waits and transient retries happen here and stay invisible
    /// to the caller unless the retry policy is exhausted.
    pub async fn execute(
        &self,
        org: &str,
        query: &str,
        variables: Value,
    ) -> Result<ResponseData, GitHubError> {
        let body = json!({ "query": query, "variables": variables });
        let policy = &self.settings.retry;
        let mut attempt = 0;

        loop {
            self.throttle().await;

            let outcome = match self.transport.post(&body).await {
                Ok(response) => self.classify(org, response, attempt),
                Err(err) => Outcome::Failed(err),
            };

            match outcome {
                Outcome::Data(data) => return Ok(data),
                Outcome::RateLimited(_) if attempt >= policy.max_attempts => {
                    return Err(GitHubError::RateLimitRetriesExhausted { retries: attempt });
                }
                Outcome::RateLimited(wait) => {
                    let wait = policy.check_wait(wait)?;
                    warn!(wait_secs = wait.as_secs(), attempt, "rate limited by GitHub, waiting for reset");
                    sleep(wait).await;
                    self.forget_quota();
                }
                Outcome::Failed(err) if err.is_transient() && attempt < policy.max_attempts => {
                    let wait = policy.backoff(attempt);
                    warn!(error = %err, attempt, wait_ms = wait.as_millis() as u64, "request failed, retrying");
                    sleep(wait).await;
                }
                Outcome::Failed(err) => return Err(err),
            }
            attempt += 1;
        }
    }

    /// List every member of `org`, following pagination to the end.
    #[instrument(skip(self))]
    pub async fn fetch_org_members(&self, org: &str) -> Result<Vec<OrgMember>, GitHubError> {
        let started = Instant::now();
        let mut members = Vec::new();
        let mut cursor: Option<String> = None;
        let mut pages = 0u32;

        loop {
            let variables = json!({
                "org": org,
                "first": self.settings.page_size,
                "cursor": cursor,
            });
            let response = self.execute(org, MEMBERS_QUERY, variables).await?;
            pages += 1;

            let organization = response
                .data
                .get("organization")
                .filter(|v| !v.is_null())
                .ok_or_else(|| GitHubError::OrganizationAccess {
                    org: org.to_string(),
                    reason: "organization not found or not visible to this token".to_string(),
                })?;
            let connection: Connection<MemberNode> =
                parse::connection(organization, "membersWithRole")?;
            let next = connection.next_cursor();
            members.extend(parse::parse_members(connection.nodes)?);

            match next {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        info!(members = members.len(), pages, "fetched organization members");
        debug!(elapsed_ms = started.elapsed().as_millis() as u64, "fetch_org_members finished");
        Ok(members)
    }

    /// Fetch the PRs `username` authored and the reviews they submitted in
    /// `org` since `since`.
    #[instrument(skip(self))]
    pub async fn fetch_user_activity(
        &self,
        username: &str,
        org: &str,
        since: DateTime<Utc>,
    ) -> Result<UserActivity, GitHubError> {
        let started = Instant::now();
        let users = [username.to_string()];
        let activity = ActivityPager::new(org, since, &users)
            .run(self)
            .await?
            .pop()
            .unwrap_or_else(|| UserActivity::new(username));
        debug!(
            prs = activity.pull_requests.len(),
            reviews = activity.reviews.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "fetch_user_activity finished"
        );
        Ok(activity)
    }

    fn classify(&self, org: &str, response: TransportResponse, attempt: u32) -> Outcome {
        if let Some(status) = &response.rate_limit {
            *self.quota.lock().unwrap_or_else(PoisonError::into_inner) = Some(status.clone());
        }

        match response.status {
            200..=299 => self.classify_graphql(org, &response, attempt),
            401 => Outcome::Failed(GitHubError::Authentication(
                error_message(&response.body).unwrap_or_else(|| "bad credentials".to_string()),
            )),
            403 | 429 if is_rate_limit_response(&response) => {
                Outcome::RateLimited(self.rate_limit_wait(&response, attempt))
            }
            403 => Outcome::Failed(GitHubError::OrganizationAccess {
                org: org.to_string(),
                reason: error_message(&response.body).unwrap_or_else(|| "forbidden".to_string()),
            }),
            400 => Outcome::Failed(GitHubError::QueryRejected(
                error_message(&response.body).unwrap_or_else(|| response.body.clone()),
            )),
            status => Outcome::Failed(GitHubError::Status {
                status,
                body: response.body,
            }),
        }
    }

    fn classify_graphql(&self, org: &str, response: &TransportResponse, attempt: u32) -> Outcome {
        let envelope = match parse::parse_envelope(&response.body) {
            Ok(envelope) => envelope,
            Err(err) => return Outcome::Failed(err),
        };

        if envelope.errors.iter().any(|e| e.is_rate_limited()) {
            return Outcome::RateLimited(self.rate_limit_wait(response, attempt));
        }

        let access_denied = envelope.errors.iter().find(|e| {
            e.is_access_denied() && matches!(e.root_field(), Some("org") | Some("organization"))
        });
        if let Some(error) = access_denied {
            return Outcome::Failed(GitHubError::OrganizationAccess {
                org: org.to_string(),
                reason: error.message.clone(),
            });
        }

        match envelope.data.filter(|d| !d.is_null()) {
            Some(data) => {
                if !envelope.errors.is_empty() {
                    warn!(errors = %parse::join_messages(&envelope.errors), "GraphQL response carried errors");
                }
                Outcome::Data(ResponseData {
                    data,
                    errors: envelope.errors,
                })
            }
            None if envelope.errors.is_empty() => Outcome::Failed(GitHubError::Parse(
                "response has neither data nor errors".to_string(),
            )),
            None => Outcome::Failed(GitHubError::QueryRejected(parse::join_messages(
                &envelope.errors,
            ))),
        }
    }

    /// Prefer `retry-after`, then the quota reset time, then plain backoff.
    fn rate_limit_wait(&self, response: &TransportResponse, attempt: u32) -> Duration {
        if let Some(wait) = response.retry_after {
            return wait;
        }
        match &response.rate_limit {
            Some(status) if status.is_exhausted() => {
                status.until_reset(Utc::now()) + Duration::from_secs(1)
            }
            _ => self.settings.retry.backoff(attempt),
        }
    }

    /// Hold off while the last seen quota sits at or below the floor.
    /// A reset further away than `max_wait` is left for the server to enforce.
    async fn throttle(&self) {
        let policy = &self.settings.retry;
        let wait = self
            .quota
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .filter(|q| q.remaining <= policy.min_remaining)
            .map(|q| q.until_reset(Utc::now()))
            .filter(|w| !w.is_zero());

        match wait {
            Some(wait) if wait <= policy.max_wait => {
                warn!(wait_secs = wait.as_secs(), "rate limit quota nearly exhausted, waiting for reset");
                sleep(wait).await;
                self.forget_quota();
            }
            Some(wait) => {
                debug!(wait_secs = wait.as_secs(), "quota low but reset is beyond max wait, continuing");
            }
            None => {}
        }
    }

    fn forget_quota(&self) {
        *self.quota.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

fn is_rate_limit_response(response: &TransportResponse) -> bool {
    response.status == 429
        || response.retry_after.is_some()
        || response
            .rate_limit
            .as_ref()
            .is_some_and(RateLimitStatus::is_exhausted)
        || response.body.to_lowercase().contains("rate limit")
}

/// `message` field of a REST-style error body.
fn error_message(body: &str) -> Option<String> {
    serde_json::from_str::<Value>(body)
        .ok()?
        .get("message")?
        .as_str()
        .map(str::to_string)
}
