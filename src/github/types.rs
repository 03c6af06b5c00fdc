use chrono::{DateTime, Utc};

/// Kind of account behind an organization membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberType {
    User,
    Bot,
}

impl MemberType {
    /// Map a GraphQL `__typename` to a member type. Anything that is not a
    /// `Bot` node is treated as a regular user.
    pub fn from_typename(typename: &str) -> Self {
        if typename == "Bot" {
            MemberType::Bot
        } else {
            MemberType::User
        }
    }
}

impl std::fmt::Display for MemberType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemberType::User => write!(f, "User"),
            MemberType::Bot => write!(f, "Bot"),
        }
    }
}

/// One organization membership record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrgMember {
    /// GitHub login
    pub username: String,
    /// Profile URL (e.g., https://github.com/alice)
    pub profile_url: String,
    pub member_type: MemberType,
}

/// A pull request authored within the queried window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestRecord {
    /// Author's GitHub login
    pub author: String,
    /// Lines added
    pub additions: u64,
    /// Lines deleted
    pub deletions: u64,
    pub created_at: DateTime<Utc>,
}

impl PullRequestRecord {
    /// Size of the change, additions plus deletions.
    pub fn changes(&self) -> u64 {
        self.additions + self.deletions
    }
}

/// A single submitted review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewRecord {
    /// Login of the account that submitted the review
    pub reviewer: String,
    /// Author of the reviewed PR; `None` when the account no longer exists
    pub target_pr_author: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Raw records fetched for one requested user.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UserActivity {
    pub username: String,
    pub pull_requests: Vec<PullRequestRecord>,
    pub reviews: Vec<ReviewRecord>,
}

impl UserActivity {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            ..Self::default()
        }
    }
}
