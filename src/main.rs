mod config;
mod github;
mod metrics;
mod report;

use chrono::Utc;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, info, instrument};
use tracing_subscriber::EnvFilter;

use config::Config;
use github::{GitHubClient, GitHubError, MemberType, QueryBatcher};
use metrics::{Comparison, SortOrder, Window, MAX_DAYS};

/// gh-metrics: compare pull-request contribution metrics for members of a
/// GitHub organization over a trailing window of days.
#[derive(Parser, Debug)]
#[command(name = "gh-metrics", version, about)]
struct Cli {
    /// Path to a TOML config file (defaults to .gh-metrics.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the members of an organization
    #[command(name = "list-users", visible_alias = "members")]
    ListUsers {
        /// GitHub organization name
        #[arg(short, long)]
        org: String,

        /// GitHub API token (falls back to GITHUB_TOKEN)
        #[arg(short, long)]
        token: Option<String>,
    },

    /// Compare contribution metrics for one or more users
    Analyze {
        /// GitHub username (repeat for several users)
        #[arg(short = 'u', long = "username", required = true)]
        usernames: Vec<String>,

        /// GitHub organization name
        #[arg(short, long)]
        org: String,

        /// Number of trailing days to analyze
        #[arg(short, long, default_value_t = 7, value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_DAYS)))]
        days: u32,

        /// GitHub API token (falls back to GITHUB_TOKEN)
        #[arg(short, long)]
        token: Option<String>,

        /// Row order of the comparison table
        #[arg(long, value_enum, default_value_t = SortOrder::Input)]
        sort: SortOrder,
    },

    /// Compare contribution metrics for every user member of an organization
    AnalyzeAll {
        /// GitHub organization name
        #[arg(short, long)]
        org: String,

        /// Number of trailing days to analyze
        #[arg(short, long, default_value_t = 7, value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_DAYS)))]
        days: u32,

        /// Hide members with fewer pull requests than this
        #[arg(long, default_value_t = 1)]
        min_prs: usize,

        /// GitHub API token (falls back to GITHUB_TOKEN)
        #[arg(short, long)]
        token: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {}", "Error:".red().bold(), err);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    info!("loading configuration");
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Command::ListUsers { org, token } => {
            let client = build_client(&config, token)?;
            let members = client.fetch_org_members(&org).await?;
            report::print_members(&org, &members);
        }
        Command::Analyze {
            usernames,
            org,
            days,
            token,
            sort,
        } => {
            let client = build_client(&config, token)?;
            let window = Window::trailing(days, Utc::now());
            let mut comparison =
                compare_users(&client, config.batch_size(), &usernames, &org, &window).await?;
            comparison.sort(sort);
            report::print_comparison(&org, &window, &comparison);
        }
        Command::AnalyzeAll {
            org,
            days,
            min_prs,
            token,
        } => {
            let client = build_client(&config, token)?;
            let window = Window::trailing(days, Utc::now());
            let comparison =
                compare_org(&client, config.batch_size(), &org, &window, min_prs).await?;
            report::print_comparison(&org, &window, &comparison);
        }
    }

    info!("done");
    Ok(())
}

fn build_client(config: &Config, token: Option<String>) -> Result<GitHubClient, GitHubError> {
    let settings = config.client_settings();
    debug!(endpoint = %config.endpoint(), page_size = settings.page_size, "building GitHub client");
    GitHubClient::new(config.github_token(token), config.endpoint(), settings)
}

/// Fetch and aggregate activity for `usernames`, rows in input order.
#[instrument(skip(client, usernames, window), fields(users = usernames.len(), window = %window.label()))]
async fn compare_users(
    client: &GitHubClient,
    batch_size: usize,
    usernames: &[String],
    org: &str,
    window: &Window,
) -> Result<Comparison, GitHubError> {
    info!("fetching pull request and review activity");
    let activities = QueryBatcher::new(client, batch_size)
        .fetch_activity(usernames, org, window.start)
        .await?;

    info!("aggregating metrics");
    Ok(metrics::compare(window, &activities))
}

/// Compare every `User` member of `org`, keeping those with at least
/// `min_prs` PRs, largest total changes first.
#[instrument(skip(client, window), fields(window = %window.label()))]
async fn compare_org(
    client: &GitHubClient,
    batch_size: usize,
    org: &str,
    window: &Window,
    min_prs: usize,
) -> Result<Comparison, GitHubError> {
    let usernames: Vec<String> = client
        .fetch_org_members(org)
        .await?
        .into_iter()
        .filter(|m| m.member_type == MemberType::User)
        .map(|m| m.username)
        .collect();
    info!(users = usernames.len(), "analyzing all user members");

    let mut comparison = compare_users(client, batch_size, &usernames, org, window).await?;
    comparison.retain_min_prs(min_prs);
    comparison.sort(SortOrder::TotalChanges);
    Ok(comparison)
}
