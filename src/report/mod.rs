pub mod table;

use colored::Colorize;
use tracing::{debug, instrument};

use crate::github::{MemberType, OrgMember};
use crate::metrics::{Comparison, Window};
use table::{Align, Style, Table};

/// Render the organization membership table followed by the member count.
pub fn render_members(org: &str, members: &[OrgMember]) -> String {
    let mut table = Table::new()
        .column("Username", Align::Left, Style::Bold)
        .column("Type", Align::Left, Style::Plain)
        .column("Profile", Align::Left, Style::Plain);

    for member in members {
        let style = match member.member_type {
            MemberType::Bot => Some(Style::Dimmed),
            MemberType::User => None,
        };
        table.add_styled_row(vec![
            (member.username.clone(), style),
            (member.member_type.to_string(), style),
            (member.profile_url.clone(), style),
        ]);
    }

    let mut out = String::new();
    out.push_str(&format!("═══ Members of {org} ═══\n"));
    out.push_str(&table.render());
    out.push_str(&format!("Total members: {}\n", members.len()));
    out
}

/// Render the contribution comparison, one row per user in the given order.
///
/// Output shape:
///
/// ═══ Contribution Metrics in acme (Last 7 days) ═══
/// Window: 2024-05-01 → 2024-05-08 (UTC)
/// ╭──────────┬───────────┬─ ...
/// │ Username │ Total PRs │ ...
///
/// followed by one line per partial-data warning.
pub fn render_comparison(org: &str, window: &Window, comparison: &Comparison) -> String {
    let mut table = Table::new()
        .column("Username", Align::Left, Style::Bold)
        .column("Total PRs", Align::Right, Style::Plain)
        .column("Median Changes", Align::Right, Style::Plain)
        .column("Additions", Align::Right, Style::Green)
        .column("Deletions", Align::Right, Style::Red)
        .column("Reviews Given", Align::Right, Style::Blue)
        .column("Total Changes", Align::Right, Style::Bold)
        .column("Impact Score", Align::Right, Style::Yellow);

    for metrics in &comparison.rows {
        table.add_row(vec![
            metrics.username.clone(),
            thousands(metrics.total_prs as u64),
            decimal(metrics.median_changes),
            thousands(metrics.additions),
            thousands(metrics.deletions),
            thousands(metrics.reviews_given as u64),
            thousands(metrics.total_changes),
            decimal(metrics.impact_score),
        ]);
    }

    let mut out = String::new();
    out.push_str(&format!(
        "═══ Contribution Metrics in {} ({}) ═══\n",
        org,
        window.label()
    ));
    out.push_str(&format!(
        "Window: {} → {} (UTC)\n",
        window.start.format("%Y-%m-%d %H:%M"),
        window.end.format("%Y-%m-%d %H:%M")
    ));
    out.push_str(&table.render());
    for warning in &comparison.warnings {
        out.push_str(&format!("{} {}\n", "note:".yellow().bold(), warning));
    }
    out
}

#[instrument(skip(members), fields(members = members.len()))]
pub fn print_members(org: &str, members: &[OrgMember]) {
    debug!("writing member table to terminal");
    println!();
    print!("{}", render_members(org, members));
    println!();
}

#[instrument(skip(window, comparison), fields(rows = comparison.rows.len()))]
pub fn print_comparison(org: &str, window: &Window, comparison: &Comparison) {
    debug!("writing comparison table to terminal");
    println!();
    print!("{}", render_comparison(org, window, comparison));
    println!();
}

/// Integer with comma thousands separators, e.g. 1234567 -> "1,234,567".
fn thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Non-negative value with one decimal shown only when it is fractional.
fn decimal(value: f64) -> String {
    let tenths = (value * 10.0).round() as u64;
    if tenths % 10 == 0 {
        thousands(tenths / 10)
    } else {
        format!("{}.{}", thousands(tenths / 10), tenths % 10)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{PartialDataWarning, UserMetrics};
    use chrono::{TimeZone, Utc};

    fn plain() {
        colored::control::set_override(false);
    }

    fn member(username: &str, member_type: MemberType) -> OrgMember {
        OrgMember {
            username: username.to_string(),
            profile_url: format!("https://github.com/{username}"),
            member_type,
        }
    }

    fn window() -> Window {
        Window::trailing(7, Utc.with_ymd_and_hms(2024, 5, 8, 12, 0, 0).unwrap())
    }

    #[test]
    fn test_thousands() {
        assert_eq!(thousands(0), "0");
        assert_eq!(thousands(999), "999");
        assert_eq!(thousands(1000), "1,000");
        assert_eq!(thousands(1234567), "1,234,567");
    }

    #[test]
    fn test_decimal() {
        assert_eq!(decimal(10.0), "10");
        assert_eq!(decimal(12.5), "12.5");
        assert_eq!(decimal(2500.5), "2,500.5");
        assert_eq!(decimal(0.0), "0");
    }

    #[test]
    fn test_render_members_counts_all() {
        plain();
        let members = vec![
            member("alice", MemberType::User),
            member("bob", MemberType::User),
            member("release-bot", MemberType::Bot),
        ];
        let rendered = render_members("acme", &members);

        assert!(rendered.starts_with("═══ Members of acme ═══"));
        assert!(rendered.contains("│ alice       │ User │ https://github.com/alice       │"));
        assert!(rendered.contains("│ release-bot │ Bot  │"));
        assert!(rendered.trim_end().ends_with("Total members: 3"));
        // title, 3 rules, header, 3 rows, total
        assert_eq!(rendered.lines().count(), 9);
    }

    #[test]
    fn test_render_members_empty() {
        plain();
        let rendered = render_members("acme", &[]);
        assert!(rendered.contains("Total members: 0"));
    }

    #[test]
    fn test_render_comparison_scenario() {
        plain();
        let comparison = Comparison {
            rows: vec![
                UserMetrics {
                    username: "alice".to_string(),
                    total_prs: 2,
                    median_changes: 10.0,
                    additions: 15,
                    deletions: 5,
                    reviews_given: 2,
                    total_changes: 20,
                    impact_score: 20.0,
                },
                UserMetrics::empty("bob"),
            ],
            warnings: vec![PartialDataWarning {
                username: "bob".to_string(),
            }],
        };
        let rendered = render_comparison("acme", &window(), &comparison);
        let lines: Vec<&str> = rendered.lines().collect();

        assert_eq!(lines[0], "═══ Contribution Metrics in acme (Last 7 days) ═══");
        assert_eq!(lines[1], "Window: 2024-05-01 12:00 → 2024-05-08 12:00 (UTC)");
        assert!(lines[3].starts_with("│ Username │ Total PRs │ Median Changes │"));
        assert_eq!(
            lines[5],
            "│ alice    │         2 │             10 │        15 │         5 │             2 │            20 │           20 │"
        );
        assert_eq!(
            lines[6],
            "│ bob      │         0 │              0 │         0 │         0 │             0 │             0 │            0 │"
        );
        assert_eq!(
            lines[8],
            "note: bob has no pull requests or reviews in this window; showing zeros"
        );
    }

    #[test]
    fn test_render_comparison_keeps_fractional_median() {
        plain();
        let comparison = Comparison {
            rows: vec![UserMetrics {
                username: "carol".to_string(),
                total_prs: 3,
                median_changes: 1234.5,
                additions: 3000,
                deletions: 703,
                reviews_given: 0,
                total_changes: 3703,
                impact_score: 3703.5,
            }],
            warnings: vec![],
        };
        let rendered = render_comparison("acme", &window(), &comparison);
        assert!(rendered.contains("1,234.5"));
        assert!(rendered.contains("3,703.5"));
        assert!(rendered.contains("3,703 │"));
        assert!(!rendered.contains("note:"));
    }

    #[test]
    fn test_print_does_not_panic() {
        plain();
        print_members("acme", &[member("alice", MemberType::User)]);
        print_comparison("acme", &window(), &Comparison::default());
    }
}
