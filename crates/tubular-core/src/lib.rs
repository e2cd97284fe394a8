//! tubular core library
//!
//! Release-pipeline helpers: commit-status polling, pull-request release
//! notices, release-date calculation and idempotent tagging. Everything
//! talks to the source-control host through [`SourceControlClient`].

pub mod config;
pub mod error;
pub mod fakes;
pub mod messenger;
pub mod poller;
pub mod release;
pub mod retry;
pub mod scm;
pub mod status;
pub mod tagging;
pub mod telemetry;

pub use config::PollConfig;
pub use error::{ConfigError, ScmError, ScmResult};
pub use messenger::{is_duplicate, PrMessenger, ReleaseNotice};
pub use poller::CommitStatusPoller;
pub use release::{
    extract_message_summary, next_release_datetime, rc_branch_name_for_date, ReleaseSchedule,
};
pub use retry::{BackoffConfig, PollSchedule, Sleeper, TokioSleeper};
pub use scm::{
    CombinedStatus, Comment, GitObject, GitRef, PrRef, PullRequest, SourceControlClient,
    StatusEntry,
};
pub use status::CommitState;
pub use tagging::ensure_tag;
pub use telemetry::init_tracing;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
