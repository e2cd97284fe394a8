//! tubular - release pipeline helpers
//!
//! ## Commands
//!
//! - `check-tests`: One-shot CI status check of a PR or commit
//! - `poll-tests`: Poll CI status until it settles
//! - `message-pr`: Post a release notice on a PR, once
//! - `release-date`: Print the next release date and rc branch name
//! - `tag`: Create a release tag, or confirm an existing one

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, Level};

use tubular_core::{
    ensure_tag, rc_branch_name_for_date, CommitStatusPoller, PollConfig, PrMessenger,
    ReleaseNotice, ReleaseSchedule, SourceControlClient,
};
use tubular_github::{GitHubClient, GitHubConfig};

#[derive(Parser)]
#[command(name = "tubular")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Release pipeline helpers: CI polling, PR notices, release dates", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Repository the command acts on.
#[derive(Args, Debug, Clone)]
struct RepoArgs {
    /// Organization or user owning the repository
    #[arg(long, env = "GITHUB_ORG")]
    org: String,

    /// Repository name
    #[arg(long, env = "GITHUB_REPO")]
    repo: String,

    /// GitHub token (overrides GIT_TOKEN from the environment)
    #[arg(long, env = "GIT_TOKEN", hide_env_values = true)]
    token: Option<String>,
}

/// A pull request, a bare commit, or a YAML file naming a pull request.
#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
struct TargetArgs {
    /// Pull request number; its head commit is checked
    #[arg(long)]
    pr: Option<u64>,

    /// Commit SHA
    #[arg(long)]
    commit: Option<String>,

    /// YAML file with a top-level `pr_number` key
    #[arg(long)]
    input_file: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct PrInputFile {
    pr_number: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    PullRequest(u64),
    Commit(String),
}

impl TargetArgs {
    fn target(&self) -> Result<Target> {
        match (self.pr, &self.commit, &self.input_file) {
            (Some(pr), None, None) => Ok(Target::PullRequest(pr)),
            (None, Some(sha), None) => Ok(Target::Commit(sha.clone())),
            (None, None, Some(path)) => Ok(Target::PullRequest(read_pr_number(path)?)),
            _ => anyhow::bail!("Exactly one of --pr, --commit or --input-file is required"),
        }
    }
}

fn read_pr_number(path: &Path) -> Result<u64> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read input file {}", path.display()))?;
    let input: PrInputFile = serde_yaml::from_str(&contents)
        .with_context(|| format!("No usable pr_number in {}", path.display()))?;
    Ok(input.pr_number)
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum NoticeKind {
    /// Deployed to staging, with the expected production date
    Stage,
    /// Deployed to production
    Prod,
    /// Rolled back from production
    Canceled,
}

#[derive(Subcommand)]
enum Commands {
    /// Check CI status once, without waiting
    CheckTests {
        #[command(flatten)]
        repo: RepoArgs,

        #[command(flatten)]
        target: TargetArgs,
    },

    /// Poll CI status until it succeeds, fails or the poll budget runs out
    PollTests {
        #[command(flatten)]
        repo: RepoArgs,

        #[command(flatten)]
        target: TargetArgs,
    },

    /// Post a release notice on a pull request unless it is already there
    MessagePr {
        #[command(flatten)]
        repo: RepoArgs,

        /// Pull request number
        #[arg(long)]
        pr: u64,

        /// Which notice to post
        #[arg(long, value_enum)]
        notice: NoticeKind,

        /// Production release date for stage notices (RFC 3339); defaults to
        /// the next release
        #[arg(long, value_parser = parse_rfc3339)]
        release_date: Option<DateTime<FixedOffset>>,

        /// Post even if an equivalent comment exists
        #[arg(long)]
        force: bool,
    },

    /// Print the next release date and release-candidate branch name
    ReleaseDate {
        /// Reference time (RFC 3339); defaults to now
        #[arg(long, value_parser = parse_rfc3339)]
        at: Option<DateTime<FixedOffset>>,
    },

    /// Point a tag at a commit; fails if the tag exists elsewhere
    Tag {
        #[command(flatten)]
        repo: RepoArgs,

        /// Tag name, without `refs/tags/`
        #[arg(long)]
        tag: String,

        /// Commit SHA to tag
        #[arg(long)]
        sha: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    tubular_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::CheckTests { repo, target } => {
            let poller = CommitStatusPoller::new(github_client(&repo)?, poll_config()?);
            cmd_check_tests(&poller, &target.target()?).await
        }
        Commands::PollTests { repo, target } => {
            let poller = CommitStatusPoller::new(github_client(&repo)?, poll_config()?);
            cmd_poll_tests(&poller, &target.target()?).await
        }
        Commands::MessagePr {
            repo,
            pr,
            notice,
            release_date,
            force,
        } => {
            let messenger =
                PrMessenger::new(github_client(&repo)?).with_schedule(release_schedule()?);
            cmd_message_pr(&messenger, pr, notice, release_date, force).await
        }
        Commands::ReleaseDate { at } => {
            let now = at.unwrap_or_else(|| Utc::now().into());
            println!("{}", release_date_report(&release_schedule()?, &now));
            Ok(())
        }
        Commands::Tag { repo, tag, sha } => cmd_tag(&github_client(&repo)?, &tag, &sha).await,
    }
}

fn github_client(args: &RepoArgs) -> Result<GitHubClient> {
    let mut config = GitHubConfig::from_env(&args.org, &args.repo)
        .context("Invalid GitHub configuration")?;
    if let Some(token) = &args.token {
        config = config.with_token(token);
    }
    GitHubClient::new(config).context("Failed to create GitHub client")
}

fn poll_config() -> Result<PollConfig> {
    PollConfig::from_env().context("Invalid polling configuration")
}

fn release_schedule() -> Result<ReleaseSchedule> {
    ReleaseSchedule::from_env().context("Invalid release schedule")
}

fn parse_rfc3339(raw: &str) -> Result<DateTime<FixedOffset>, String> {
    DateTime::parse_from_rfc3339(raw).map_err(|e| format!("expected an RFC 3339 timestamp: {e}"))
}

/// One-shot status check
async fn cmd_check_tests<C: SourceControlClient>(
    poller: &CommitStatusPoller<C>,
    target: &Target,
) -> Result<()> {
    let passed = match target {
        Target::PullRequest(pr) => poller.check_pull_request(*pr).await,
        Target::Commit(sha) => poller.is_commit_successful(sha).await,
    }
    .with_context(|| format!("Failed to check {}", describe(target)))?;

    report_tests(target, passed)
}

/// Poll until the status settles
async fn cmd_poll_tests<C: SourceControlClient>(
    poller: &CommitStatusPoller<C>,
    target: &Target,
) -> Result<()> {
    let schedule = poller.config().schedule;
    info!(
        subject = %describe(target),
        max_tries = schedule.max_tries,
        initial_wait_secs = schedule.initial_wait.as_secs(),
        interval_secs = schedule.interval.as_secs(),
        "Polling CI status"
    );

    let passed = match target {
        Target::PullRequest(pr) => poller.poll_pull_request(*pr).await,
        Target::Commit(sha) => poller.poll_for_success(sha).await,
    }
    .with_context(|| format!("Failed to poll {}", describe(target)))?;

    report_tests(target, passed)
}

fn report_tests(target: &Target, passed: bool) -> Result<()> {
    if passed {
        println!("✓ Tests passed for {}", describe(target));
        Ok(())
    } else {
        println!("✗ Tests have not passed for {}", describe(target));
        anyhow::bail!("Tests have not passed")
    }
}

fn describe(target: &Target) -> String {
    match target {
        Target::PullRequest(pr) => format!("PR #{pr}"),
        Target::Commit(sha) => format!("commit {sha}"),
    }
}

/// Post a release notice
async fn cmd_message_pr<C: SourceControlClient>(
    messenger: &PrMessenger<C>,
    pr: u64,
    notice: NoticeKind,
    release_date: Option<DateTime<FixedOffset>>,
    force: bool,
) -> Result<()> {
    let posted = match notice {
        NoticeKind::Stage => messenger.message_deployed_stage(pr, release_date, force).await,
        NoticeKind::Prod => messenger.message_deployed_prod(pr, force).await,
        NoticeKind::Canceled => messenger.message_release_canceled(pr, force).await,
    }
    .with_context(|| format!("Failed to message PR #{pr}"))?;

    match posted {
        Some(comment) => {
            println!("Posted comment {} on PR #{}", comment.id, pr);
            if let Some(url) = comment.html_url {
                println!("  {}", url);
            }
        }
        None => println!("PR #{} already has this notice; nothing posted", pr),
    }
    Ok(())
}

fn release_date_report(schedule: &ReleaseSchedule, now: &DateTime<FixedOffset>) -> String {
    let release = schedule.next_release(now);
    let notice = ReleaseNotice::DeployedToStage {
        release_date: release.fixed_offset(),
    };
    format!(
        "release_datetime: {}\nrc_branch: {}\nstage_message: {}",
        release.to_rfc3339(),
        rc_branch_name_for_date(release.date_naive()),
        notice.body()
    )
}

/// Create or confirm a tag
async fn cmd_tag<C: SourceControlClient>(client: &C, tag: &str, sha: &str) -> Result<()> {
    let created = ensure_tag(client, tag, sha)
        .await
        .with_context(|| format!("Failed to tag {sha} as {tag}"))?;
    println!("{} -> {}", created.name, created.object.sha);
    Ok(())
}
