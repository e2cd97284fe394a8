//! Commit state classification.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::scm::CombinedStatus;

/// State of a commit's combined CI status as seen by the poller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitState {
    Pending,
    Success,
    Failure,
    /// No status has been reported for the commit yet.
    NotStarted,
    /// Any other state string reported by the host, lower-cased.
    Other(String),
}

impl CommitState {
    /// Classify a raw combined status.
    ///
    /// A commit with no status entries, or with an unset/empty overall
    /// state, is `NotStarted` whatever else the host says.
    pub fn from_combined(status: &CombinedStatus) -> Self {
        if status.status_count() == 0 {
            return CommitState::NotStarted;
        }
        match status.state.as_deref().map(str::trim) {
            None | Some("") => CommitState::NotStarted,
            Some(raw) => Self::parse(raw),
        }
    }

    fn parse(raw: &str) -> Self {
        match raw.to_lowercase().as_str() {
            "pending" => CommitState::Pending,
            "success" => CommitState::Success,
            "failure" => CommitState::Failure,
            "not_started" => CommitState::NotStarted,
            other => CommitState::Other(other.to_string()),
        }
    }

    /// `success` and `failure` end polling.
    pub fn is_terminal(&self) -> bool {
        matches!(self, CommitState::Success | CommitState::Failure)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CommitState::Success)
    }

    pub fn as_str(&self) -> &str {
        match self {
            CommitState::Pending => "pending",
            CommitState::Success => "success",
            CommitState::Failure => "failure",
            CommitState::NotStarted => "not_started",
            CommitState::Other(s) => s,
        }
    }
}

impl fmt::Display for CommitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
