//! Typed views over raw GraphQL responses.
//!
//! Every response is converted into [`OrgMember`], [`PullRequestRecord`] and
//! [`ReviewRecord`] values here, so callers never index into untyped JSON.
//! Required fields (`login`, `createdAt`) fail the parse; count fields that are
//! missing or not a non-negative integer read as zero.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::warn;

use super::types::{MemberType, OrgMember, PullRequestRecord, ReviewRecord};
use super::GitHubError;

/// Top-level GraphQL envelope.
#[derive(Debug, Deserialize)]
pub struct GraphQlResponse {
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub errors: Vec<GraphQlError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphQlError {
    pub message: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub path: Vec<Value>,
}

impl GraphQlError {
    pub fn is_rate_limited(&self) -> bool {
        self.kind.as_deref() == Some("RATE_LIMITED")
    }

    pub fn is_access_denied(&self) -> bool {
        matches!(self.kind.as_deref(), Some("NOT_FOUND") | Some("FORBIDDEN"))
    }

    /// First path segment, i.e. the (aliased) root field the error belongs to.
    pub fn root_field(&self) -> Option<&str> {
        self.path.first().and_then(Value::as_str)
    }
}

/// The `data` object of a successful round trip, with any errors GitHub
/// reported next to it.
#[derive(Debug, Clone)]
pub struct ResponseData {
    pub data: Value,
    pub errors: Vec<GraphQlError>,
}

impl ResponseData {
    #[cfg(test)]
    pub fn new(data: Value) -> Self {
        Self {
            data,
            errors: Vec::new(),
        }
    }

    /// The error that nulled out root field `field`, if it came back null.
    pub fn field_error(&self, field: &str) -> Option<&GraphQlError> {
        if self.data.get(field).is_some_and(|v| !v.is_null()) {
            return None;
        }
        self.errors.iter().find(|e| e.root_field() == Some(field))
    }
}

/// Join error messages for display.
pub fn join_messages(errors: &[GraphQlError]) -> String {
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub has_next_page: bool,
    pub end_cursor: Option<String>,
}

/// A paginated GraphQL connection. Null nodes are kept as `None`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection<T> {
    #[serde(default = "Vec::new")]
    pub nodes: Vec<Option<T>>,
    pub page_info: PageInfo,
}

impl<T> Connection<T> {
    /// Cursor for the following page, if the server reports one.
    pub fn next_cursor(&self) -> Option<String> {
        if self.page_info.has_next_page {
            self.page_info.end_cursor.clone()
        } else {
            None
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Actor {
    pub login: String,
}

#[derive(Debug, Deserialize)]
pub struct MemberNode {
    login: Option<String>,
    url: Option<String>,
    #[serde(rename = "__typename")]
    typename: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequestNode {
    #[serde(default, deserialize_with = "lenient_count")]
    additions: Option<u64>,
    #[serde(default, deserialize_with = "lenient_count")]
    deletions: Option<u64>,
    created_at: Option<String>,
    author: Option<Actor>,
}

impl PullRequestNode {
    /// Search hits that are not pull requests come back as `{}`.
    fn is_empty(&self) -> bool {
        self.additions.is_none()
            && self.deletions.is_none()
            && self.created_at.is_none()
            && self.author.is_none()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewedPullRequestNode {
    author: Option<Actor>,
    reviews: Option<ReviewList>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewList {
    #[serde(default)]
    total_count: Option<u64>,
    #[serde(default)]
    nodes: Vec<Option<ReviewNode>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewNode {
    created_at: Option<String>,
}

/// Accept any JSON for a count field; anything but a non-negative integer is `None`.
fn lenient_count<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(Value::as_u64))
}

pub fn parse_envelope(body: &str) -> Result<GraphQlResponse, GitHubError> {
    Ok(serde_json::from_str(body)?)
}

/// Deserialize the connection stored under `field` of a `data` object.
pub fn connection<T>(data: &Value, field: &str) -> Result<Connection<T>, GitHubError>
where
    T: for<'de> Deserialize<'de>,
{
    let raw = data
        .get(field)
        .filter(|v| !v.is_null())
        .ok_or_else(|| GitHubError::Parse(format!("missing field '{field}'")))?;
    serde_json::from_value(raw.clone())
        .map_err(|e| GitHubError::Parse(format!("field '{field}': {e}")))
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, GitHubError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| GitHubError::Parse(format!("invalid timestamp '{raw}': {e}")))
}

fn required_timestamp(raw: Option<&str>, context: &str) -> Result<DateTime<Utc>, GitHubError> {
    let raw = raw.ok_or_else(|| GitHubError::Parse(format!("{context} is missing createdAt")))?;
    parse_timestamp(raw)
}

pub fn parse_members(nodes: Vec<Option<MemberNode>>) -> Result<Vec<OrgMember>, GitHubError> {
    nodes
        .into_iter()
        .flatten()
        .map(|node| {
            let username = node
                .login
                .ok_or_else(|| GitHubError::Parse("member is missing login".to_string()))?;
            let profile_url = node
                .url
                .unwrap_or_else(|| format!("https://github.com/{username}"));
            let member_type = node
                .typename
                .as_deref()
                .map(MemberType::from_typename)
                .unwrap_or(MemberType::User);
            Ok(OrgMember {
                username,
                profile_url,
                member_type,
            })
        })
        .collect()
}

/// Convert authored-PR search hits. Hits without an author are attributed to
/// `username`, the login the search was scoped to.
pub fn parse_pull_requests(
    username: &str,
    nodes: Vec<Option<PullRequestNode>>,
) -> Result<Vec<PullRequestRecord>, GitHubError> {
    nodes
        .into_iter()
        .flatten()
        .filter(|node| !node.is_empty())
        .map(|node| {
            let created_at = required_timestamp(node.created_at.as_deref(), "pull request")?;
            Ok(PullRequestRecord {
                author: node
                    .author
                    .map(|a| a.login)
                    .unwrap_or_else(|| username.to_string()),
                additions: node.additions.unwrap_or(0),
                deletions: node.deletions.unwrap_or(0),
                created_at,
            })
        })
        .collect()
}

/// Convert reviewed-PR search hits into one record per review `username` submitted.
pub fn parse_reviews(
    username: &str,
    nodes: Vec<Option<ReviewedPullRequestNode>>,
) -> Result<Vec<ReviewRecord>, GitHubError> {
    let mut records = Vec::new();
    for node in nodes.into_iter().flatten() {
        let target_pr_author = node.author.map(|a| a.login);
        let Some(list) = node.reviews else { continue };
        let reviews = list.nodes;
        if let Some(total) = list.total_count.filter(|&t| t > reviews.len() as u64) {
            warn!(
                user = username,
                pr_author = target_pr_author.as_deref().unwrap_or("unknown"),
                total,
                fetched = reviews.len(),
                "review list truncated, counting fetched reviews only"
            );
        }
        for review in reviews.into_iter().flatten() {
            records.push(ReviewRecord {
                reviewer: username.to_string(),
                target_pr_author: target_pr_author.clone(),
                created_at: required_timestamp(review.created_at.as_deref(), "review")?,
            });
        }
    }
    Ok(records)
}
