//! Idempotent tag creation.

use tracing::{info, warn};

use crate::error::{ScmError, ScmResult};
use crate::scm::{GitRef, SourceControlClient};

/// Point tag `tag_name` at `sha`.
///
/// If the tag already exists and points at `sha` the existing ref is
/// returned. If it points elsewhere the call fails with
/// `ScmError::TagMismatch`; an existing tag is never moved.
pub async fn ensure_tag<C>(client: &C, tag_name: &str, sha: &str) -> ScmResult<GitRef>
where
    C: SourceControlClient + ?Sized,
{
    match client.create_ref(&format!("refs/tags/{tag_name}"), sha).await {
        Ok(created) => {
            info!(tag = tag_name, sha, "Created tag");
            Ok(created)
        }
        Err(ScmError::RefAlreadyExists(_)) => {
            let existing = client.get_ref(&format!("tags/{tag_name}")).await?;
            if existing.object.sha != sha {
                warn!(
                    tag = tag_name,
                    expected = sha,
                    actual = %existing.object.sha,
                    "Tag already points elsewhere"
                );
                return Err(ScmError::TagMismatch {
                    tag: tag_name.to_string(),
                    expected: sha.to_string(),
                    actual: existing.object.sha,
                });
            }
            info!(tag = tag_name, sha, "Tag already exists at requested SHA");
            Ok(existing)
        }
        Err(err) => Err(err),
    }
}
