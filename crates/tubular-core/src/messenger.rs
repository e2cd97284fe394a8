//! Release notices on pull requests.
//!
//! A notice is posted only when no existing comment already contains its
//! filter text (case-insensitive substring). The filter is the static part
//! of the message, so notices whose body embeds a recomputed date are still
//! recognized as the same event.

use chrono::{DateTime, FixedOffset, Utc};
use tracing::info;

use crate::error::{ScmError, ScmResult};
use crate::release::ReleaseSchedule;
use crate::scm::{Comment, SourceControlClient};

pub const PR_ON_STAGE_BASE_MESSAGE: &str =
    "**Release Notice**: This PR has been deployed to the staging environment ";
pub const PR_ON_PROD_MESSAGE: &str =
    "**Release Notice**: This PR has been deployed to the production environment.";
pub const PR_RELEASE_CANCELED_MESSAGE: &str =
    "**Release Notice**: This PR has been rolled back from the production environment.";

/// Pre-built release notices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseNotice {
    DeployedToStage { release_date: DateTime<FixedOffset> },
    DeployedToProd,
    ReleaseCanceled,
}

impl ReleaseNotice {
    pub fn body(&self) -> String {
        match self {
            ReleaseNotice::DeployedToStage { release_date } => format!(
                "{PR_ON_STAGE_BASE_MESSAGE}in preparation for a release to production on {}.",
                release_date.format("%A, %B %d, %Y")
            ),
            ReleaseNotice::DeployedToProd => PR_ON_PROD_MESSAGE.to_string(),
            ReleaseNotice::ReleaseCanceled => PR_RELEASE_CANCELED_MESSAGE.to_string(),
        }
    }

    /// Text used to recognize an earlier copy of this notice.
    pub fn filter(&self) -> &'static str {
        match self {
            ReleaseNotice::DeployedToStage { .. } => PR_ON_STAGE_BASE_MESSAGE,
            ReleaseNotice::DeployedToProd => PR_ON_PROD_MESSAGE,
            ReleaseNotice::ReleaseCanceled => PR_RELEASE_CANCELED_MESSAGE,
        }
    }
}

/// `true` if any comment body contains `filter`, ignoring case.
pub fn is_duplicate(comments: &[Comment], filter: &str) -> bool {
    let needle = filter.to_lowercase();
    comments
        .iter()
        .any(|c| c.body.to_lowercase().contains(&needle))
}

/// Posts comments to pull requests without repeating itself.
pub struct PrMessenger<C> {
    client: C,
    schedule: ReleaseSchedule,
}

impl<C: SourceControlClient> PrMessenger<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            schedule: ReleaseSchedule::default(),
        }
    }

    /// Schedule used when a staging notice has no explicit release date.
    pub fn with_schedule(mut self, schedule: ReleaseSchedule) -> Self {
        self.schedule = schedule;
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Post `body` on PR `number` unless a comment containing `filter`
    /// already exists. `force` posts regardless.
    ///
    /// Returns `Ok(None)` when the comment was suppressed as a duplicate, and
    /// `ScmError::PullRequestNotFound` when the PR does not exist.
    pub async fn post_if_new(
        &self,
        number: u64,
        body: &str,
        filter: &str,
        force: bool,
    ) -> ScmResult<Option<Comment>> {
        match self.client.get_pull_request(number).await {
            Ok(_) => {}
            Err(ScmError::NotFound { .. }) => return Err(ScmError::PullRequestNotFound(number)),
            Err(err) => return Err(err),
        }

        if !force {
            let existing = self.client.list_comments(number).await?;
            if is_duplicate(&existing, filter) {
                info!(pr = number, filter, "Skipping duplicate PR comment");
                return Ok(None);
            }
        }

        let comment = self.client.create_comment(number, body).await?;
        info!(pr = number, comment_id = comment.id, force, "Posted PR comment");
        Ok(Some(comment))
    }

    pub async fn post_notice(
        &self,
        number: u64,
        notice: &ReleaseNotice,
        force: bool,
    ) -> ScmResult<Option<Comment>> {
        self.post_if_new(number, &notice.body(), notice.filter(), force)
            .await
    }

    /// Deployed-to-staging notice. Without `release_date` the next release
    /// after the current time is used.
    pub async fn message_deployed_stage(
        &self,
        number: u64,
        release_date: Option<DateTime<FixedOffset>>,
        force: bool,
    ) -> ScmResult<Option<Comment>> {
        let release_date = release_date
            .unwrap_or_else(|| self.schedule.next_release(&Utc::now()).fixed_offset());
        self.post_notice(number, &ReleaseNotice::DeployedToStage { release_date }, force)
            .await
    }

    pub async fn message_deployed_prod(
        &self,
        number: u64,
        force: bool,
    ) -> ScmResult<Option<Comment>> {
        self.post_notice(number, &ReleaseNotice::DeployedToProd, force)
            .await
    }

    pub async fn message_release_canceled(
        &self,
        number: u64,
        force: bool,
    ) -> ScmResult<Option<Comment>> {
        self.post_notice(number, &ReleaseNotice::ReleaseCanceled, force)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn comment(body: &str) -> Comment {
        Comment {
            id: 1,
            body: body.to_string(),
            html_url: None,
        }
    }

    #[test]
    fn test_duplicate_match_is_case_insensitive_substring() {
        let comments = vec![comment("Heads up: DEPLOYED TO PROD at noon")];
        assert!(is_duplicate(&comments, "deployed to prod"));
        assert!(!is_duplicate(&comments, "deployed to stage"));
        assert!(!is_duplicate(&[], "anything"));
    }

    #[test]
    fn test_stage_notice_body_embeds_date_filter_does_not() {
        let release_date = FixedOffset::west_opt(5 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 1, 8, 10, 0, 0)
            .unwrap();
        let notice = ReleaseNotice::DeployedToStage { release_date };
        assert_eq!(
            notice.body(),
            format!(
                "{PR_ON_STAGE_BASE_MESSAGE}in preparation for a release to production on Monday, January 08, 2024."
            )
        );
        assert_eq!(notice.filter(), PR_ON_STAGE_BASE_MESSAGE);
        assert!(notice.body().starts_with(notice.filter()));
    }

    #[test]
    fn test_prod_and_cancel_filters_equal_body() {
        for notice in [ReleaseNotice::DeployedToProd, ReleaseNotice::ReleaseCanceled] {
            assert_eq!(notice.body(), notice.filter());
        }
    }
}
