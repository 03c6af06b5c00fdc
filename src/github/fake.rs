//! In-memory GitHub GraphQL double for tests.
//!
//! Answers the member-list query and the aliased activity queries built by
//! `batch`, paging with numeric offsets as cursors. Scripted responses are
//! served first, in order, before any generated one.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Map, Value};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use super::transport::{Transport, TransportResponse};
use super::GitHubError;

pub fn pr_node(author: &str, additions: u64, deletions: u64, created_at: DateTime<Utc>) -> Value {
    json!({
        "additions": additions,
        "deletions": deletions,
        "createdAt": created_at.to_rfc3339_opts(SecondsFormat::Micros, true),
        "author": { "login": author },
    })
}

pub struct FakeGitHub {
    org: String,
    valid_token: bool,
    max_users_per_query: Option<usize>,
    members: Vec<Value>,
    pulls: HashMap<String, Vec<Value>>,
    reviewed: HashMap<String, Vec<Value>>,
    unsearchable: HashSet<String>,
    scripted: Mutex<VecDeque<TransportResponse>>,
    requests: Mutex<Vec<Value>>,
}

impl FakeGitHub {
    pub fn new(org: &str) -> Self {
        Self {
            org: org.to_string(),
            valid_token: true,
            max_users_per_query: None,
            members: Vec::new(),
            pulls: HashMap::new(),
            reviewed: HashMap::new(),
            unsearchable: HashSet::new(),
            scripted: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn member(mut self, login: &str, typename: &str) -> Self {
        self.members.push(json!({
            "login": login,
            "url": format!("https://github.com/{login}"),
            "__typename": typename,
        }));
        self
    }

    pub fn pull_request(mut self, author: &str, node: Value) -> Self {
        self.pulls.entry(author.to_lowercase()).or_default().push(node);
        self
    }

    /// One PR by `pr_author` on which `reviewer` submitted a review at each of `at`.
    pub fn review(mut self, reviewer: &str, pr_author: &str, at: &[DateTime<Utc>]) -> Self {
        let reviews: Vec<Value> = at
            .iter()
            .map(|t| json!({ "createdAt": t.to_rfc3339_opts(SecondsFormat::Micros, true) }))
            .collect();
        self.reviewed.entry(reviewer.to_lowercase()).or_default().push(json!({
            "author": { "login": pr_author },
            "reviews": { "nodes": reviews },
        }));
        self
    }

    /// Searches naming `login` come back null with an `INVALID` error, the
    /// way GitHub answers for logins that do not exist.
    pub fn unsearchable(mut self, login: &str) -> Self {
        self.unsearchable.insert(login.to_lowercase());
        self
    }

    pub fn invalid_token(mut self) -> Self {
        self.valid_token = false;
        self
    }

    /// Reject activity documents that carry more users than `max`.
    pub fn max_users_per_query(mut self, max: usize) -> Self {
        self.max_users_per_query = Some(max);
        self
    }

    pub fn script(&self, response: TransportResponse) {
        self.scripted.lock().unwrap().push_back(response);
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// The member page the fake would serve for `cursor`.
    pub fn respond_members(&self, cursor: Option<&str>, first: usize) -> TransportResponse {
        let data = json!({
            "organization": {
                "membersWithRole": page(&self.members, cursor, first),
            }
        });
        ok(json!({ "data": data }))
    }

    fn respond(&self, body: &Value) -> TransportResponse {
        if !self.valid_token {
            return TransportResponse {
                status: 401,
                rate_limit: None,
                retry_after: None,
                body: r#"{"message":"Bad credentials","documentation_url":"https://docs.github.com/graphql"}"#
                    .to_string(),
            };
        }

        let query = body["query"].as_str().unwrap_or_default();
        let variables = &body["variables"];
        let known_org = variables["org"].as_str() == Some(self.org.as_str());
        let first = variables["first"].as_u64().unwrap_or(100) as usize;

        if query.contains("membersWithRole") {
            if !known_org {
                return not_found("organization");
            }
            return self.respond_members(variables["cursor"].as_str(), first);
        }

        let vars = variables.as_object().cloned().unwrap_or_default();
        let users = vars.keys().filter(|k| k.starts_with("pullsQuery") || k.starts_with("reviewsQuery"))
            .map(|k| k.trim_start_matches("pullsQuery").trim_start_matches("reviewsQuery").to_string())
            .collect::<HashSet<_>>()
            .len();
        if self.max_users_per_query.is_some_and(|max| users > max) {
            return ok(json!({
                "data": null,
                "errors": [{
                    "type": "MAX_NODE_LIMIT_EXCEEDED",
                    "message": "This query requests too many nodes."
                }]
            }));
        }
        if !known_org {
            return not_found("org");
        }

        let mut data = Map::new();
        let mut errors = Vec::new();
        data.insert("org".into(), json!({ "login": self.org }));
        for (key, value) in &vars {
            let search = value.as_str().unwrap_or_default();
            let (alias, login, items) = if let Some(i) = key.strip_prefix("pullsQuery") {
                let login = search_term(search, "author:").to_lowercase();
                let items = self.pulls.get(&login).cloned().unwrap_or_default();
                let cursor = vars.get(&format!("pullsCursor{i}")).and_then(Value::as_str);
                (format!("pulls_{i}"), login, page(&items, cursor, first))
            } else if let Some(i) = key.strip_prefix("reviewsQuery") {
                let login = search_term(search, "reviewed-by:").to_lowercase();
                let items = self.reviewed.get(&login).cloned().unwrap_or_default();
                let cursor = vars.get(&format!("reviewsCursor{i}")).and_then(Value::as_str);
                (format!("reviews_{i}"), login, page(&items, cursor, first))
            } else {
                continue;
            };

            if self.unsearchable.contains(&login) {
                errors.push(json!({
                    "type": "INVALID",
                    "path": [&alias],
                    "message": "The listed users cannot be searched either because the users do not exist or you do not have permission to view the users."
                }));
                data.insert(alias, Value::Null);
            } else {
                data.insert(alias, items);
            }
        }
        if errors.is_empty() {
            ok(json!({ "data": data }))
        } else {
            ok(json!({ "data": data, "errors": errors }))
        }
    }
}

#[async_trait]
impl Transport for FakeGitHub {
    async fn post(&self, body: &Value) -> Result<TransportResponse, GitHubError> {
        self.requests.lock().unwrap().push(body.clone());
        if let Some(response) = self.scripted.lock().unwrap().pop_front() {
            return Ok(response);
        }
        Ok(self.respond(body))
    }
}

fn search_term<'a>(search: &'a str, qualifier: &str) -> &'a str {
    search
        .split_whitespace()
        .find_map(|part| part.strip_prefix(qualifier))
        .unwrap_or_default()
}

fn page(items: &[Value], cursor: Option<&str>, first: usize) -> Value {
    let start = cursor.and_then(|c| c.parse::<usize>().ok()).unwrap_or(0).min(items.len());
    let end = (start + first.max(1)).min(items.len());
    json!({
        "nodes": &items[start..end],
        "pageInfo": {
            "hasNextPage": end < items.len(),
            "endCursor": end.to_string(),
        }
    })
}

fn ok(body: Value) -> TransportResponse {
    TransportResponse {
        status: 200,
        rate_limit: None,
        retry_after: None,
        body: body.to_string(),
    }
}

fn not_found(field: &str) -> TransportResponse {
    let mut data = Map::new();
    data.insert(field.to_string(), Value::Null);
    ok(json!({
        "data": data,
        "errors": [{
            "type": "NOT_FOUND",
            "path": [field],
            "message": "Could not resolve to an Organization with the login of 'unknown'."
        }]
    }))
}
