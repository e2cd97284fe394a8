//! Commit-status polling.
//!
//! A poll is two nested policies: each status fetch is retried with
//! exponential backoff on network timeouts, and the whole fetch is repeated
//! on the poll schedule while the commit's state is neither `success` nor
//! `failure`.

use std::sync::Arc;

use tracing::{debug, info};

use crate::config::PollConfig;
use crate::error::{ScmError, ScmResult};
use crate::retry::{poll_until, retry_with_backoff, Sleeper, TokioSleeper};
use crate::scm::SourceControlClient;
use crate::status::CommitState;

/// Polls a commit's combined status until it settles.
pub struct CommitStatusPoller<C> {
    client: C,
    config: PollConfig,
    sleeper: Arc<dyn Sleeper>,
}

impl<C: SourceControlClient> CommitStatusPoller<C> {
    pub fn new(client: C, config: PollConfig) -> Self {
        Self {
            client,
            config,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Replace the sleeper used between attempts.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Current state of a commit, from a single status fetch.
    pub async fn get_state(&self, commit: &str) -> ScmResult<CommitState> {
        let status = self.client.get_combined_status(commit).await?;
        let state = CommitState::from_combined(&status);
        debug!(
            commit,
            statuses = status.status_count(),
            state = %state,
            "Fetched combined status"
        );
        Ok(state)
    }

    /// [`Self::get_state`] with network timeouts retried under the backoff
    /// policy. Exhausting the retries returns the last transient error.
    pub async fn fetch_state(&self, commit: &str) -> ScmResult<CommitState> {
        retry_with_backoff(
            &self.config.backoff,
            self.sleeper.as_ref(),
            "get_combined_status",
            ScmError::is_transient,
            || self.get_state(commit),
        )
        .await
    }

    /// Poll until the commit reaches a terminal state or the poll budget
    /// runs out, returning the last observed state.
    pub async fn poll_state(&self, commit: &str) -> ScmResult<CommitState> {
        poll_until(
            &self.config.schedule,
            self.sleeper.as_ref(),
            "poll_commit",
            CommitState::is_terminal,
            || self.fetch_state(commit),
        )
        .await
    }

    /// `true` iff polling ends with the commit in `success`.
    pub async fn poll_for_success(&self, commit: &str) -> ScmResult<bool> {
        let state = self.poll_state(commit).await?;
        info!(commit, state = %state, "Finished polling commit status");
        Ok(state.is_success())
    }

    /// Single check, no polling: `true` iff the commit has at least one
    /// status and its combined state is `success`.
    pub async fn is_commit_successful(&self, commit: &str) -> ScmResult<bool> {
        Ok(self.fetch_state(commit).await?.is_success())
    }

    /// Single check of a pull request's head commit.
    pub async fn check_pull_request(&self, number: u64) -> ScmResult<bool> {
        let sha = self.head_sha(number).await?;
        self.is_commit_successful(&sha).await
    }

    /// Poll a pull request's head commit.
    pub async fn poll_pull_request(&self, number: u64) -> ScmResult<bool> {
        let sha = self.head_sha(number).await?;
        self.poll_for_success(&sha).await
    }

    async fn head_sha(&self, number: u64) -> ScmResult<String> {
        match self.client.get_pull_request(number).await {
            Ok(pr) => Ok(pr.head.sha),
            Err(ScmError::NotFound { .. }) => Err(ScmError::PullRequestNotFound(number)),
            Err(err) => Err(err),
        }
    }
}
