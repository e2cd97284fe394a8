//! Poller configuration.
//!
//! Values are read once when the config is built and then passed to the
//! poller explicitly; nothing here is consulted again at poll time.

use std::time::Duration;

use crate::error::ConfigError;
use crate::retry::{BackoffConfig, PollSchedule};

/// Attempts allowed for a single status fetch that keeps timing out.
pub const ENV_MAX_STATUS_FETCH_TRIES: &str = "MAX_STATUS_FETCH_TRIES";
/// Attempts allowed while a commit's status is non-terminal.
pub const ENV_MAX_POLL_TRIES: &str = "MAX_PR_TEST_POLL_TRIES";
/// Seconds between the first and second status poll.
pub const ENV_INITIAL_WAIT: &str = "PR_TEST_INITIAL_WAIT_INTERVAL";
/// Seconds between later status polls.
pub const ENV_POLL_INTERVAL: &str = "PR_TEST_POLL_INTERVAL";

/// Configuration for [`crate::poller::CommitStatusPoller`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PollConfig {
    /// Transient-fault layer.
    pub backoff: BackoffConfig,
    /// Polling layer.
    pub schedule: PollSchedule,
}

impl PollConfig {
    pub fn new(backoff: BackoffConfig, schedule: PollSchedule) -> Self {
        Self { backoff, schedule }
    }

    /// Build from process environment variables, falling back to defaults
    /// for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = PollConfig::default();

        if let Some(tries) = read_u32(&lookup, ENV_MAX_STATUS_FETCH_TRIES)? {
            config.backoff.max_tries = tries;
        }
        if let Some(tries) = read_u32(&lookup, ENV_MAX_POLL_TRIES)? {
            config.schedule.max_tries = tries;
        }
        if let Some(secs) = read_u32(&lookup, ENV_INITIAL_WAIT)? {
            config.schedule.initial_wait = Duration::from_secs(u64::from(secs));
        }
        if let Some(secs) = read_u32(&lookup, ENV_POLL_INTERVAL)? {
            config.schedule.interval = Duration::from_secs(u64::from(secs));
        }

        Ok(config)
    }
}

fn read_u32<F>(lookup: &F, key: &str) -> Result<Option<u32>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<u32>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw,
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_nothing_set() {
        let config = PollConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.backoff.max_tries, 5);
        assert_eq!(config.schedule.max_tries, 5);
        assert_eq!(config.schedule.initial_wait, Duration::from_secs(10));
        assert_eq!(config.schedule.interval, Duration::from_secs(10));
    }

    #[test]
    fn test_overrides_are_applied() {
        let config = PollConfig::from_lookup(lookup(&[
            (ENV_MAX_STATUS_FETCH_TRIES, "3"),
            (ENV_MAX_POLL_TRIES, "20"),
            (ENV_INITIAL_WAIT, "60"),
            (ENV_POLL_INTERVAL, " 15 "),
        ]))
        .unwrap();
        assert_eq!(config.backoff.max_tries, 3);
        assert_eq!(config.schedule.max_tries, 20);
        assert_eq!(config.schedule.initial_wait, Duration::from_secs(60));
        assert_eq!(config.schedule.interval, Duration::from_secs(15));
    }

    #[test]
    fn test_empty_value_falls_back_to_default() {
        let config = PollConfig::from_lookup(lookup(&[(ENV_MAX_POLL_TRIES, "")])).unwrap();
        assert_eq!(config.schedule.max_tries, 5);
    }

    #[test]
    fn test_invalid_value_is_rejected() {
        let err = PollConfig::from_lookup(lookup(&[(ENV_POLL_INTERVAL, "ten")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                key: ENV_POLL_INTERVAL.to_string(),
                value: "ten".to_string(),
            }
        );
    }
}
