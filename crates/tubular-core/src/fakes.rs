//! In-memory fakes (testing only)
//!
//! Provides `FakeScmClient`, a scripted `SourceControlClient`, and
//! `RecordingSleeper`, which records requested waits and returns at once.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{ScmError, ScmResult};
use crate::retry::Sleeper;
use crate::scm::*;

// ---------------------------------------------------------------------------
// RecordingSleeper
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct RecordingSleeper {
    waits: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every duration passed to `sleep`, in order.
    pub fn waits(&self) -> Vec<Duration> {
        self.waits.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.waits.lock().unwrap().push(duration);
    }
}

// ---------------------------------------------------------------------------
// FakeScmClient
// ---------------------------------------------------------------------------

/// Scripted reply to a `get_combined_status` call.
#[derive(Debug, Clone)]
pub enum StatusReply {
    Status(CombinedStatus),
    Timeout,
    NotFound,
}

impl StatusReply {
    /// Reply with one status entry per given state and the first entry's
    /// state as the overall state.
    pub fn states(entries: &[&str]) -> Self {
        StatusReply::Status(CombinedStatus::from_states(entries.first().copied(), entries))
    }
}

#[derive(Debug, Default)]
struct FakeState {
    status_replies: VecDeque<StatusReply>,
    status_calls: usize,
    pull_requests: HashMap<u64, PullRequest>,
    comments: HashMap<u64, Vec<Comment>>,
    refs: HashMap<String, String>,
    next_comment_id: u64,
    create_comment_calls: usize,
}

/// In-memory source-control host.
///
/// Status replies are consumed in order; the last one repeats once the
/// script runs out. With no script at all, commits report no statuses.
#[derive(Debug, Default)]
pub struct FakeScmClient {
    state: Mutex<FakeState>,
}

impl FakeScmClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status_replies(self, replies: impl IntoIterator<Item = StatusReply>) -> Self {
        self.state.lock().unwrap().status_replies.extend(replies);
        self
    }

    /// Register an open PR whose head is `head_sha`, targeting `release`.
    pub fn with_pull_request(self, number: u64, head_sha: &str) -> Self {
        let pr = PullRequest {
            number,
            head: PrRef {
                ref_name: format!("pr-{number}"),
                sha: head_sha.to_string(),
                label: None,
            },
            base: PrRef {
                ref_name: "release".to_string(),
                sha: "0000000".to_string(),
                label: None,
            },
            html_url: None,
        };
        self.state.lock().unwrap().pull_requests.insert(number, pr);
        self
    }

    pub fn with_comment(self, number: u64, body: &str) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.next_comment_id += 1;
            let id = state.next_comment_id;
            state.comments.entry(number).or_default().push(Comment {
                id,
                body: body.to_string(),
                html_url: None,
            });
        }
        self
    }

    /// Register an existing reference (full name) pointing at `sha`.
    pub fn with_ref(self, name: &str, sha: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .refs
            .insert(name.to_string(), sha.to_string());
        self
    }

    pub fn status_calls(&self) -> usize {
        self.state.lock().unwrap().status_calls
    }

    pub fn create_comment_calls(&self) -> usize {
        self.state.lock().unwrap().create_comment_calls
    }

    /// Bodies of all comments on a PR, oldest first.
    pub fn comment_bodies(&self, number: u64) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .comments
            .get(&number)
            .map(|cs| cs.iter().map(|c| c.body.clone()).collect())
            .unwrap_or_default()
    }

    pub fn ref_target(&self, name: &str) -> Option<String> {
        self.state.lock().unwrap().refs.get(name).cloned()
    }
}

#[async_trait]
impl SourceControlClient for FakeScmClient {
    async fn get_combined_status(&self, commit: &str) -> ScmResult<CombinedStatus> {
        let mut state = self.state.lock().unwrap();
        state.status_calls += 1;

        let reply = if state.status_replies.len() > 1 {
            state.status_replies.pop_front()
        } else {
            state.status_replies.front().cloned()
        };

        match reply {
            Some(StatusReply::Status(status)) => Ok(status),
            Some(StatusReply::Timeout) => Err(ScmError::Transient(format!(
                "timed out fetching status for {commit}"
            ))),
            Some(StatusReply::NotFound) => Err(ScmError::NotFound {
                resource: format!("commit {commit}"),
            }),
            None => Ok(CombinedStatus::from_states(None, &[])),
        }
    }

    async fn get_pull_request(&self, number: u64) -> ScmResult<PullRequest> {
        self.state
            .lock()
            .unwrap()
            .pull_requests
            .get(&number)
            .cloned()
            .ok_or_else(|| ScmError::NotFound {
                resource: format!("pull request {number}"),
            })
    }

    async fn list_comments(&self, number: u64) -> ScmResult<Vec<Comment>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .comments
            .get(&number)
            .cloned()
            .unwrap_or_default())
    }

    async fn create_comment(&self, number: u64, body: &str) -> ScmResult<Comment> {
        let mut state = self.state.lock().unwrap();
        state.create_comment_calls += 1;
        state.next_comment_id += 1;
        let comment = Comment {
            id: state.next_comment_id,
            body: body.to_string(),
            html_url: None,
        };
        state.comments.entry(number).or_default().push(comment.clone());
        Ok(comment)
    }

    async fn create_ref(&self, name: &str, sha: &str) -> ScmResult<GitRef> {
        let mut state = self.state.lock().unwrap();
        if state.refs.contains_key(name) {
            return Err(ScmError::RefAlreadyExists(name.to_string()));
        }
        state.refs.insert(name.to_string(), sha.to_string());
        Ok(GitRef {
            name: name.to_string(),
            object: GitObject {
                sha: sha.to_string(),
                kind: Some("commit".to_string()),
            },
        })
    }

    async fn get_ref(&self, name: &str) -> ScmResult<GitRef> {
        let full = format!("refs/{name}");
        let target = self.state.lock().unwrap().refs.get(&full).cloned();
        match target {
            Some(sha) => Ok(GitRef {
                name: full,
                object: GitObject {
                    sha,
                    kind: Some("commit".to_string()),
                },
            }),
            None => Err(ScmError::NotFound { resource: full }),
        }
    }
}
