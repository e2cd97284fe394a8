//! Error taxonomy for source-control operations and configuration.

use thiserror::Error;

/// Errors raised while talking to the source-control host.
///
/// Only [`ScmError::Transient`] is retried by the backoff layer; every other
/// variant is surfaced to the caller on first occurrence.
#[derive(Error, Debug)]
pub enum ScmError {
    /// Network timeout or connection failure
    #[error("transient network failure: {0}")]
    Transient(String),

    /// Requested resource (commit, ref) does not exist
    #[error("not found: {resource}")]
    NotFound { resource: String },

    /// Pull request does not exist
    #[error("PR #{0} does not exist")]
    PullRequestNotFound(u64),

    /// Reference creation rejected because the name is taken
    #[error("reference already exists: {0}")]
    RefAlreadyExists(String),

    /// Tag exists but points somewhere else
    #[error("tag '{tag}' exists but points to SHA {actual} instead of requested SHA {expected}")]
    TagMismatch {
        tag: String,
        expected: String,
        actual: String,
    },

    /// Non-success HTTP response
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// Response body could not be decoded
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// Any other transport-level failure
    #[error("HTTP error: {0}")]
    Http(String),
}

impl ScmError {
    /// Whether the transient-fault layer should retry this error.
    pub fn is_transient(&self) -> bool {
        matches!(self, ScmError::Transient(_))
    }

    /// Whether this error reports a missing resource.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ScmError::NotFound { .. } | ScmError::PullRequestNotFound(_)
        )
    }
}

/// Result type for source-control operations.
pub type ScmResult<T> = std::result::Result<T, ScmError>;

/// Errors raised while reading configuration.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },

    #[error("release schedule must allow at least one weekday")]
    NoReleaseWeekdays,
}
