//! Source-control host abstraction.
//!
//! `SourceControlClient` is the only seam between the release workflow and
//! the hosting service. The value types mirror the subset of the GitHub REST
//! payloads the workflow reads; unknown fields are ignored.
//!
//! An in-memory implementation lives in [`crate::fakes`].

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ScmResult;

// ---------------------------------------------------------------------------
// Value types
// ---------------------------------------------------------------------------

/// One CI status reported against a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEntry {
    pub state: String,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub target_url: Option<String>,
}

/// Aggregate verdict over all statuses attached to a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombinedStatus {
    /// Overall state; absent when the host has nothing to report.
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub statuses: Vec<StatusEntry>,
    #[serde(default)]
    pub sha: Option<String>,
}

impl CombinedStatus {
    /// Build a combined status from an overall state and per-entry states.
    pub fn from_states(state: Option<&str>, entries: &[&str]) -> Self {
        CombinedStatus {
            state: state.map(str::to_string),
            statuses: entries
                .iter()
                .map(|s| StatusEntry {
                    state: s.to_string(),
                    context: None,
                    description: None,
                    target_url: None,
                })
                .collect(),
            sha: None,
        }
    }

    pub fn status_count(&self) -> usize {
        self.statuses.len()
    }
}

/// Head or base side of a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrRef {
    #[serde(rename = "ref")]
    pub ref_name: String,
    pub sha: String,
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub head: PrRef,
    pub base: PrRef,
    #[serde(default)]
    pub html_url: Option<String>,
}

/// A discussion comment on a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: u64,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub body: String,
    #[serde(default)]
    pub html_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitObject {
    pub sha: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

/// A named git reference, e.g. `refs/tags/release-2024-01-05`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitRef {
    #[serde(rename = "ref")]
    pub name: String,
    pub object: GitObject,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

// ---------------------------------------------------------------------------
// SourceControlClient
// ---------------------------------------------------------------------------

/// Repository-scoped operations against a source-control host.
///
/// Implementations report network timeouts as `ScmError::Transient` and
/// missing objects as `ScmError::NotFound`; callers rely on that split for
/// retry decisions.
#[async_trait]
pub trait SourceControlClient: Send + Sync {
    /// Combined CI status for a commit SHA.
    async fn get_combined_status(&self, commit: &str) -> ScmResult<CombinedStatus>;

    async fn get_pull_request(&self, number: u64) -> ScmResult<PullRequest>;

    /// Discussion comments on a pull request, oldest first.
    async fn list_comments(&self, number: u64) -> ScmResult<Vec<Comment>>;

    async fn create_comment(&self, number: u64, body: &str) -> ScmResult<Comment>;

    /// Create a reference (full name, e.g. `refs/tags/v1`) pointing at `sha`.
    /// Fails with `ScmError::RefAlreadyExists` if the name is taken.
    async fn create_ref(&self, name: &str, sha: &str) -> ScmResult<GitRef>;

    /// Look up a reference by short name, e.g. `tags/v1`.
    async fn get_ref(&self, name: &str) -> ScmResult<GitRef>;
}

#[async_trait]
impl<T: SourceControlClient + ?Sized> SourceControlClient for Arc<T> {
    async fn get_combined_status(&self, commit: &str) -> ScmResult<CombinedStatus> {
        (**self).get_combined_status(commit).await
    }

    async fn get_pull_request(&self, number: u64) -> ScmResult<PullRequest> {
        (**self).get_pull_request(number).await
    }

    async fn list_comments(&self, number: u64) -> ScmResult<Vec<Comment>> {
        (**self).list_comments(number).await
    }

    async fn create_comment(&self, number: u64, body: &str) -> ScmResult<Comment> {
        (**self).create_comment(number, body).await
    }

    async fn create_ref(&self, name: &str, sha: &str) -> ScmResult<GitRef> {
        (**self).create_ref(name, sha).await
    }

    async fn get_ref(&self, name: &str) -> ScmResult<GitRef> {
        (**self).get_ref(name).await
    }
}
