/// Contribution statistics for one user over one window.
#[derive(Debug, Clone, PartialEq)]
pub struct UserMetrics {
    pub username: String,
    /// PRs authored in the window
    pub total_prs: usize,
    /// Median of per-PR additions + deletions
    pub median_changes: f64,
    pub additions: u64,
    pub deletions: u64,
    /// Reviews submitted in the window
    pub reviews_given: usize,
    /// additions + deletions
    pub total_changes: u64,
    /// total_prs × median_changes
    pub impact_score: f64,
}

impl UserMetrics {
    /// All-zero row for a user without activity.
    pub fn empty(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            total_prs: 0,
            median_changes: 0.0,
            additions: 0,
            deletions: 0,
            reviews_given: 0,
            total_changes: 0,
            impact_score: 0.0,
        }
    }
}

/// Non-fatal: a requested user had nothing in the window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialDataWarning {
    pub username: String,
}

impl std::fmt::Display for PartialDataWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} has no pull requests or reviews in this window; showing zeros",
            self.username
        )
    }
}

/// Rows in presentation order plus the warnings raised while building them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Comparison {
    pub rows: Vec<UserMetrics>,
    pub warnings: Vec<PartialDataWarning>,
}

/// Row ordering for the comparison table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum SortOrder {
    /// Order the usernames were given in
    #[default]
    Input,
    /// Largest total changes first
    TotalChanges,
    /// Largest impact score first
    Impact,
}
