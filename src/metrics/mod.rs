pub mod types;
pub mod window;

pub use types::{Comparison, PartialDataWarning, SortOrder, UserMetrics};
pub use window::{Window, MAX_DAYS};

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::{debug, warn};

use crate::github::{PullRequestRecord, ReviewRecord, UserActivity};

/// Compute one user's metrics from raw records.
///
/// Records created before `window_start` are ignored; a record created
/// exactly at `window_start` counts. Only PRs authored by `username` and
/// reviews submitted by `username` contribute; logins compare
/// case-insensitively, as on GitHub.
pub fn aggregate(
    username: &str,
    pull_requests: &[PullRequestRecord],
    reviews: &[ReviewRecord],
    window_start: DateTime<Utc>,
) -> UserMetrics {
    let authored: Vec<&PullRequestRecord> = pull_requests
        .iter()
        .filter(|pr| pr.created_at >= window_start && pr.author.eq_ignore_ascii_case(username))
        .collect();

    let reviews_given = reviews
        .iter()
        .filter(|r| r.created_at >= window_start && r.reviewer.eq_ignore_ascii_case(username))
        .count();

    let additions: u64 = authored.iter().map(|pr| pr.additions).sum();
    let deletions: u64 = authored.iter().map(|pr| pr.deletions).sum();
    let sizes: Vec<u64> = authored.iter().map(|pr| pr.changes()).collect();
    let median_changes = median(&sizes);
    let total_prs = authored.len();

    UserMetrics {
        username: username.to_string(),
        total_prs,
        median_changes,
        additions,
        deletions,
        reviews_given,
        total_changes: additions + deletions,
        impact_score: total_prs as f64 * median_changes,
    }
}

/// Standard median; the mean of the two middle values for even counts, and
/// zero for an empty slice.
pub fn median(values: &[u64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] as f64 + sorted[mid] as f64) / 2.0
    } else {
        sorted[mid] as f64
    }
}

/// Aggregate every user's activity, keeping the order of `activities`.
/// Users with nothing in the window still get an all-zero row plus a warning.
pub fn compare(window: &Window, activities: &[UserActivity]) -> Comparison {
    let mut comparison = Comparison::default();

    for activity in activities {
        let metrics = aggregate(
            &activity.username,
            &activity.pull_requests,
            &activity.reviews,
            window.start,
        );
        let authors_reviewed = activity
            .reviews
            .iter()
            .filter(|r| r.created_at >= window.start)
            .filter_map(|r| r.target_pr_author.as_deref())
            .collect::<HashSet<_>>()
            .len();
        debug!(
            user = %metrics.username,
            prs = metrics.total_prs,
            reviews = metrics.reviews_given,
            authors_reviewed,
            median = metrics.median_changes,
            "aggregated user metrics"
        );

        if metrics.total_prs == 0 && metrics.reviews_given == 0 {
            warn!(user = %metrics.username, window = %window.label(), "no activity in window");
            comparison.warnings.push(PartialDataWarning {
                username: metrics.username.clone(),
            });
        }
        comparison.rows.push(metrics);
    }

    comparison
}

impl Comparison {
    /// Reorder rows; ties keep their current relative order.
    pub fn sort(&mut self, order: SortOrder) {
        match order {
            SortOrder::Input => {}
            SortOrder::TotalChanges => self
                .rows
                .sort_by(|a, b| b.total_changes.cmp(&a.total_changes)),
            SortOrder::Impact => self
                .rows
                .sort_by(|a, b| b.impact_score.total_cmp(&a.impact_score)),
        }
    }

    /// Drop users with fewer than `min_prs` PRs, and their warnings.
    pub fn retain_min_prs(&mut self, min_prs: usize) {
        self.rows.retain(|m| m.total_prs >= min_prs);
        let kept: Vec<&str> = self.rows.iter().map(|m| m.username.as_str()).collect();
        self.warnings.retain(|w| kept.contains(&w.username.as_str()));
    }
}
