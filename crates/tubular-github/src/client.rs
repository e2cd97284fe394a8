//! `SourceControlClient` over the GitHub REST API.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use tubular_core::{
    CombinedStatus, Comment, GitRef, PullRequest, ScmError, ScmResult, SourceControlClient,
};

use crate::config::GitHubConfig;

const API_VERSION: &str = "2022-11-28";
const COMMENTS_PER_PAGE: usize = 100;

/// GitHub client scoped to one repository.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    config: GitHubConfig,
    http: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct CreateCommentRequest<'a> {
    body: &'a str,
}

#[derive(Debug, Serialize)]
struct CreateRefRequest<'a> {
    #[serde(rename = "ref")]
    name: &'a str,
    sha: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

impl GitHubClient {
    pub fn new(config: GitHubConfig) -> ScmResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert("X-GitHub-Api-Version", HeaderValue::from_static(API_VERSION));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("tubular/", env!("CARGO_PKG_VERSION"))),
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| ScmError::Http(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { config, http })
    }

    pub fn config(&self) -> &GitHubConfig {
        &self.config
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.authorize(self.http.get(self.config.repo_url(path)))
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.authorize(self.http.post(self.config.repo_url(path)))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.token {
            Some(token) => request.header(AUTHORIZATION, format!("Bearer {token}")),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> ScmResult<Response> {
        request.send().await.map_err(transport_error)
    }

    /// Send, require a 2xx and decode the body.
    async fn fetch<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        resource: &str,
    ) -> ScmResult<T> {
        let response = self.send(request).await?;
        let response = require_success(response, resource).await?;
        decode(response, resource).await
    }
}

#[async_trait]
impl SourceControlClient for GitHubClient {
    async fn get_combined_status(&self, commit: &str) -> ScmResult<CombinedStatus> {
        let resource = format!("commit {commit}");
        let status: CombinedStatus = self
            .fetch(self.get(&format!("commits/{commit}/status")), &resource)
            .await?;
        debug!(commit, state = ?status.state, statuses = status.status_count(), "GitHub combined status");
        Ok(status)
    }

    async fn get_pull_request(&self, number: u64) -> ScmResult<PullRequest> {
        self.fetch(
            self.get(&format!("pulls/{number}")),
            &format!("pull request {number}"),
        )
        .await
    }

    async fn list_comments(&self, number: u64) -> ScmResult<Vec<Comment>> {
        let resource = format!("comments on #{number}");
        let mut comments = Vec::new();
        let mut page = 1u32;

        loop {
            let request = self
                .get(&format!("issues/{number}/comments"))
                .query(&[("per_page", COMMENTS_PER_PAGE as u32), ("page", page)]);
            let batch: Vec<Comment> = self.fetch(request, &resource).await?;
            let done = batch.len() < COMMENTS_PER_PAGE;
            comments.extend(batch);
            if done {
                break;
            }
            page += 1;
        }

        debug!(pr = number, count = comments.len(), pages = page, "Listed PR comments");
        Ok(comments)
    }

    async fn create_comment(&self, number: u64, body: &str) -> ScmResult<Comment> {
        let request = self
            .post(&format!("issues/{number}/comments"))
            .json(&CreateCommentRequest { body });
        let comment: Comment = self
            .fetch(request, &format!("pull request {number}"))
            .await?;
        info!(pr = number, comment_id = comment.id, "Created GitHub comment");
        Ok(comment)
    }

    async fn create_ref(&self, name: &str, sha: &str) -> ScmResult<GitRef> {
        let request = self
            .post("git/refs")
            .json(&CreateRefRequest { name, sha });
        let response = self.send(request).await?;

        if response.status() == StatusCode::UNPROCESSABLE_ENTITY {
            return Err(ScmError::RefAlreadyExists(name.to_string()));
        }
        let response = require_success(response, &format!("ref {name}")).await?;
        decode(response, name).await
    }

    async fn get_ref(&self, name: &str) -> ScmResult<GitRef> {
        self.fetch(self.get(&format!("git/ref/{name}")), &format!("ref {name}"))
            .await
    }
}

/// Timeouts and connection failures are worth retrying; anything else from
/// the transport is not.
fn transport_error(err: reqwest::Error) -> ScmError {
    if err.is_timeout() || err.is_connect() {
        ScmError::Transient(err.to_string())
    } else if err.is_decode() {
        ScmError::Decode(err.to_string())
    } else {
        ScmError::Http(err.to_string())
    }
}

async fn require_success(response: Response, resource: &str) -> ScmResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::NOT_FOUND {
        return Err(ScmError::NotFound {
            resource: resource.to_string(),
        });
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorBody>(&body)
        .map(|e| e.message)
        .unwrap_or(body);
    Err(ScmError::Api {
        status: status.as_u16(),
        message,
    })
}

async fn decode<T: DeserializeOwned>(response: Response, resource: &str) -> ScmResult<T> {
    let body = response.text().await.map_err(transport_error)?;
    serde_json::from_str(&body).map_err(|e| ScmError::Decode(format!("{resource}: {e}")))
}
