//! GitHub connection settings.

use std::fmt;
use std::time::Duration;

use tubular_core::ConfigError;

pub const DEFAULT_API_URL: &str = "https://api.github.com";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Base URL of the REST API, for GitHub Enterprise.
pub const ENV_API_URL: &str = "GITHUB_API_URL";
/// Personal access or app token.
pub const ENV_TOKEN: &str = "GIT_TOKEN";
/// Per-request timeout in seconds.
pub const ENV_TIMEOUT_SECS: &str = "GITHUB_TIMEOUT_SECS";

/// Repository coordinates plus API endpoint and credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct GitHubConfig {
    pub api_url: String,
    pub owner: String,
    pub repo: String,
    /// Sent as a bearer token; anonymous when absent.
    pub token: Option<String>,
    pub timeout: Duration,
}

impl GitHubConfig {
    pub fn new(owner: &str, repo: &str) -> Self {
        GitHubConfig {
            api_url: DEFAULT_API_URL.to_string(),
            owner: owner.to_string(),
            repo: repo.to_string(),
            token: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Config for `owner/repo` with endpoint, token and timeout taken from
    /// the environment.
    pub fn from_env(owner: &str, repo: &str) -> Result<Self, ConfigError> {
        Self::from_lookup(owner, repo, |key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(owner: &str, repo: &str, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::new(owner, repo);

        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
            config.api_url = url.trim().to_string();
        }
        config.token = lookup(ENV_TOKEN).filter(|v| !v.trim().is_empty());
        if let Some(raw) = lookup(ENV_TIMEOUT_SECS).filter(|v| !v.trim().is_empty()) {
            let secs = raw
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidValue {
                    key: ENV_TIMEOUT_SECS.to_string(),
                    value: raw.clone(),
                })?;
            config.timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }

    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    pub fn with_api_url(mut self, api_url: &str) -> Self {
        self.api_url = api_url.to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// `{api_url}/repos/{owner}/{repo}/{path}`
    pub fn repo_url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/{}/{}",
            self.api_url.trim_end_matches('/'),
            self.owner,
            self.repo,
            path.trim_start_matches('/')
        )
    }
}

impl fmt::Debug for GitHubConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitHubConfig")
            .field("api_url", &self.api_url)
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_lookup_defaults() {
        let config = GitHubConfig::from_lookup("edx", "edx-platform", |_| None).unwrap();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.token, None);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_from_lookup_reads_all_keys() {
        let config = GitHubConfig::from_lookup("edx", "edx-platform", |key| match key {
            ENV_API_URL => Some("https://ghe.example.com/api/v3/".to_string()),
            ENV_TOKEN => Some("s3cret".to_string()),
            ENV_TIMEOUT_SECS => Some("5".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.token.as_deref(), Some("s3cret"));
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(
            config.repo_url("pulls/3"),
            "https://ghe.example.com/api/v3/repos/edx/edx-platform/pulls/3"
        );
    }

    #[test]
    fn test_bad_timeout_is_rejected() {
        let err = GitHubConfig::from_lookup("o", "r", |key| {
            (key == ENV_TIMEOUT_SECS).then(|| "soon".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_debug_redacts_token() {
        let rendered = format!("{:?}", GitHubConfig::new("o", "r").with_token("s3cret"));
        assert!(!rendered.contains("s3cret"));
        assert!(rendered.contains("<redacted>"));
    }
}
