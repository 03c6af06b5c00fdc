//! Multi-user activity queries.
//!
//! One GraphQL document carries an authored-PR search (`pulls_<i>`) and a
//! reviewed-PR search (`reviews_<i>`) for every user of a chunk, plus an
//! `org` probe so missing organization access is detected in the same round
//! trip. Search strings and cursors travel as variables. Connections are paged
//! in lock step: each round trip only includes the ones that still have a next
//! page.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt::Write as _;
use tracing::{debug, info, instrument, warn};

use super::client::GitHubClient;
use super::parse::{self, Connection, PullRequestNode, ResponseData, ReviewedPullRequestNode};
use super::types::UserActivity;
use super::GitHubError;

pub const DEFAULT_BATCH_SIZE: usize = 25;

const PULL_REQUEST_FIELDS: &str = "... on PullRequest { additions deletions createdAt author { login } }";

#[derive(Debug, Clone, PartialEq, Eq)]
enum PageState {
    /// Next page to request; `None` is the first page
    Pending(Option<String>),
    Done,
}

impl PageState {
    fn advance(next: Option<String>) -> Self {
        match next {
            Some(cursor) => PageState::Pending(Some(cursor)),
            None => PageState::Done,
        }
    }

    fn cursor(&self) -> Option<&str> {
        match self {
            PageState::Pending(cursor) => cursor.as_deref(),
            PageState::Done => None,
        }
    }

    fn is_pending(&self) -> bool {
        matches!(self, PageState::Pending(_))
    }
}

struct Slot {
    pulls: PageState,
    reviews: PageState,
    activity: UserActivity,
}

/// Pages the PR and review searches of a fixed set of users to exhaustion.
pub struct ActivityPager {
    org: String,
    since: String,
    slots: Vec<Slot>,
}

impl ActivityPager {
    pub fn new(org: &str, since: DateTime<Utc>, usernames: &[String]) -> Self {
        Self {
            org: org.to_string(),
            since: since.to_rfc3339_opts(SecondsFormat::Secs, true),
            slots: usernames
                .iter()
                .map(|username| Slot {
                    pulls: PageState::Pending(None),
                    reviews: PageState::Pending(None),
                    activity: UserActivity::new(username.clone()),
                })
                .collect(),
        }
    }

    fn has_pending(&self) -> bool {
        self.slots
            .iter()
            .any(|s| s.pulls.is_pending() || s.reviews.is_pending())
    }

    fn pulls_search(&self, username: &str) -> String {
        format!("org:{} author:{} is:pr created:>={}", self.org, username, self.since)
    }

    fn reviews_search(&self, username: &str) -> String {
        format!("org:{} reviewed-by:{} is:pr updated:>={}", self.org, username, self.since)
    }

    /// Build the document and variables for the next round trip.
    fn build_request(&self, page_size: u32) -> (String, Value) {
        let mut params = String::from("$org: String!, $first: Int!");
        let mut fields = String::from("  org: organization(login: $org) { login }\n");
        let mut variables = Map::new();
        variables.insert("org".into(), Value::from(self.org.as_str()));
        variables.insert("first".into(), Value::from(page_size));

        for (i, slot) in self.slots.iter().enumerate() {
            let username = slot.activity.username.as_str();

            if slot.pulls.is_pending() {
                let _ = write!(params, ", $pullsQuery{i}: String!, $pullsCursor{i}: String");
                let _ = writeln!(
                    fields,
                    "  pulls_{i}: search(query: $pullsQuery{i}, type: ISSUE, first: $first, after: $pullsCursor{i}) {{ \
                     pageInfo {{ hasNextPage endCursor }} nodes {{ {PULL_REQUEST_FIELDS} }} }}"
                );
                variables.insert(format!("pullsQuery{i}"), Value::from(self.pulls_search(username)));
                variables.insert(format!("pullsCursor{i}"), slot.pulls.cursor().into());
            }

            if slot.reviews.is_pending() {
                let _ = write!(
                    params,
                    ", $reviewsQuery{i}: String!, $reviewsCursor{i}: String, $reviewer{i}: String!"
                );
                let _ = writeln!(
                    fields,
                    "  reviews_{i}: search(query: $reviewsQuery{i}, type: ISSUE, first: $first, after: $reviewsCursor{i}) {{ \
                     pageInfo {{ hasNextPage endCursor }} nodes {{ ... on PullRequest {{ author {{ login }} \
                     reviews(author: $reviewer{i}, first: 100, states: [APPROVED, CHANGES_REQUESTED, COMMENTED, DISMISSED]) \
                     {{ totalCount nodes {{ createdAt }} }} }} }} }}"
                );
                variables.insert(format!("reviewsQuery{i}"), Value::from(self.reviews_search(username)));
                variables.insert(format!("reviewsCursor{i}"), slot.reviews.cursor().into());
                variables.insert(format!("reviewer{i}"), Value::from(username));
            }
        }

        (format!("query({params}) {{\n{fields}}}"), Value::Object(variables))
    }

    /// Attribute one response's connections to their slots by alias index.
    ///
    /// A search GitHub nulled out with an error (unknown or unsearchable
    /// login) finishes that connection with no records.
    fn apply(&mut self, response: &ResponseData) -> Result<(), GitHubError> {
        let data = &response.data;
        if data.get("org").map_or(true, Value::is_null) {
            return Err(GitHubError::OrganizationAccess {
                org: self.org.clone(),
                reason: "organization not found or not visible to this token".to_string(),
            });
        }

        for (i, slot) in self.slots.iter_mut().enumerate() {
            let username = slot.activity.username.clone();

            if slot.pulls.is_pending() {
                let alias = format!("pulls_{i}");
                if let Some(error) = response.field_error(&alias) {
                    warn!(user = %username, field = %alias, error = %error.message, "pull request search failed, counting none");
                    slot.pulls = PageState::Done;
                } else {
                    let conn: Connection<PullRequestNode> = parse::connection(data, &alias)?;
                    slot.pulls = PageState::advance(conn.next_cursor());
                    let records = parse::parse_pull_requests(&username, conn.nodes)?;
                    slot.activity.pull_requests.extend(records);
                }
            }

            if slot.reviews.is_pending() {
                let alias = format!("reviews_{i}");
                if let Some(error) = response.field_error(&alias) {
                    warn!(user = %username, field = %alias, error = %error.message, "review search failed, counting none");
                    slot.reviews = PageState::Done;
                } else {
                    let conn: Connection<ReviewedPullRequestNode> = parse::connection(data, &alias)?;
                    slot.reviews = PageState::advance(conn.next_cursor());
                    let records = parse::parse_reviews(&username, conn.nodes)?;
                    slot.activity.reviews.extend(records);
                }
            }
        }
        Ok(())
    }

    /// Page every connection to the end; activities come back in slot order.
    pub async fn run(mut self, client: &GitHubClient) -> Result<Vec<UserActivity>, GitHubError> {
        let page_size = client.settings().page_size;
        let mut round_trips = 0u32;

        while self.has_pending() {
            let (query, variables) = self.build_request(page_size);
            let response = client.execute(&self.org, &query, variables).await?;
            self.apply(&response)?;
            round_trips += 1;
        }

        debug!(users = self.slots.len(), round_trips, "activity paging finished");
        Ok(self.slots.into_iter().map(|s| s.activity).collect())
    }
}

/// Fetches activity for many users with as few round trips as possible.
pub struct QueryBatcher<'a> {
    client: &'a GitHubClient,
    batch_size: usize,
}

impl<'a> QueryBatcher<'a> {
    pub fn new(client: &'a GitHubClient, batch_size: usize) -> Self {
        Self {
            client,
            batch_size: batch_size.max(1),
        }
    }

    /// One `UserActivity` per distinct username, in input order.
    ///
    /// A chunk whose batched document is rejected is refetched one user at a
    /// time; any other error aborts.
    #[instrument(skip(self, usernames), fields(users = usernames.len()))]
    pub async fn fetch_activity(
        &self,
        usernames: &[String],
        org: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<UserActivity>, GitHubError> {
        let users = dedupe(usernames);
        let mut activities = Vec::with_capacity(users.len());

        for chunk in users.chunks(self.batch_size) {
            info!(users = chunk.len(), "fetching activity batch");
            match ActivityPager::new(org, since, chunk).run(self.client).await {
                Ok(batch) => activities.extend(batch),
                Err(GitHubError::QueryRejected(reason)) if chunk.len() > 1 => {
                    warn!(%reason, users = chunk.len(), "batched query rejected, falling back to per-user requests");
                    for username in chunk {
                        let activity = self.client.fetch_user_activity(username, org, since).await?;
                        activities.push(activity);
                    }
                }
                Err(err) => return Err(err),
            }
        }

        Ok(activities)
    }
}

/// Drop repeated usernames, keeping the first occurrence.
pub fn dedupe(usernames: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    usernames
        .iter()
        .filter(|u| seen.insert(u.to_lowercase()))
        .cloned()
        .collect()
}
