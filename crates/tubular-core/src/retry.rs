//! Retry policies for remote calls.
//!
//! Two independent policies that compose:
//!
//! - [`retry_with_backoff`] retries an operation whose *error* is retryable,
//!   waiting an exponentially growing delay between attempts. Exhausting the
//!   budget returns the last error.
//! - [`poll_until`] repeats an operation whose *value* is not yet acceptable,
//!   following a [`PollSchedule`]: first call immediately, then
//!   `initial_wait`, then `interval` between every later call. Exhausting the
//!   budget returns the last value, not an error.
//!
//! All waiting goes through a [`Sleeper`] so tests can observe the schedule
//! without real delays.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

/// Source of delays between attempts.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

// ---------------------------------------------------------------------------
// Exponential backoff on errors
// ---------------------------------------------------------------------------

/// Exponential backoff configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffConfig {
    /// Total attempts, including the first one.
    pub max_tries: u32,

    /// Delay before the first retry.
    pub initial_delay: Duration,

    /// Cap on any single delay.
    pub max_delay: Duration,

    pub multiplier: f64,
}

impl BackoffConfig {
    pub const DEFAULT_MAX_TRIES: u32 = 5;

    /// A multiplier below 1.0 or not finite is replaced by 1.0, giving a
    /// constant delay.
    pub fn new(max_tries: u32, initial_delay: Duration, max_delay: Duration, multiplier: f64) -> Self {
        let multiplier = if multiplier.is_finite() && multiplier >= 1.0 {
            multiplier
        } else {
            1.0
        };
        Self {
            max_tries,
            initial_delay,
            max_delay,
            multiplier,
        }
    }

    /// Delay after the given failed attempt (0-indexed):
    /// `initial_delay * multiplier^attempt`, capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.powi(attempt.min(i32::MAX as u32) as i32);
        let secs = self.initial_delay.as_secs_f64() * factor;
        Duration::try_from_secs_f64(secs)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Every delay a fully exhausted run would wait.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        (0..self.max_tries.saturating_sub(1)).map(|attempt| self.delay_for_attempt(attempt))
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            max_tries: Self::DEFAULT_MAX_TRIES,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            multiplier: 2.0,
        }
    }
}

/// Run `operation`, retrying while it fails with an error accepted by
/// `is_retryable`, up to `config.max_tries` attempts in total.
///
/// Non-retryable errors return immediately. When the budget is spent the
/// last error is returned unchanged.
pub async fn retry_with_backoff<T, E, F, Fut, R>(
    config: &BackoffConfig,
    sleeper: &dyn Sleeper,
    target: &str,
    is_retryable: R,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let max_tries = config.max_tries.max(1);
    let mut tries = 0;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                tries += 1;
                if !is_retryable(&err) {
                    return Err(err);
                }
                if tries >= max_tries {
                    warn!(target_call = target, tries, error = %err, "Giving up after retries");
                    return Err(err);
                }

                let wait = config.delay_for_attempt(tries - 1);
                info!(
                    target_call = target,
                    wait_secs = wait.as_secs_f64(),
                    tries,
                    error = %err,
                    "Trying again in {:.1} seconds after {} tries calling {}",
                    wait.as_secs_f64(),
                    tries,
                    target
                );
                sleeper.sleep(wait).await;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Polling on values
// ---------------------------------------------------------------------------

/// Immediate / initial-wait / constant-interval polling cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSchedule {
    /// Total attempts, including the first one.
    pub max_tries: u32,

    /// Wait between the first and second attempt.
    pub initial_wait: Duration,

    /// Wait between every later pair of attempts.
    pub interval: Duration,
}

impl PollSchedule {
    pub const DEFAULT_MAX_TRIES: u32 = 5;
    pub const DEFAULT_INITIAL_WAIT: Duration = Duration::from_secs(10);
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);

    pub fn new(max_tries: u32, initial_wait: Duration, interval: Duration) -> Self {
        Self {
            max_tries,
            initial_wait,
            interval,
        }
    }

    /// Wait before the given attempt (0-indexed).
    pub fn wait_before(&self, attempt: u32) -> Duration {
        match attempt {
            0 => Duration::ZERO,
            1 => self.initial_wait,
            _ => self.interval,
        }
    }

    /// Wait before each attempt of a fully exhausted poll.
    pub fn waits(&self) -> Vec<Duration> {
        (0..self.max_tries.max(1))
            .map(|attempt| self.wait_before(attempt))
            .collect()
    }
}

impl Default for PollSchedule {
    fn default() -> Self {
        Self::new(
            Self::DEFAULT_MAX_TRIES,
            Self::DEFAULT_INITIAL_WAIT,
            Self::DEFAULT_INTERVAL,
        )
    }
}

/// Call `operation` until `is_done` accepts its value or the schedule's
/// attempt budget runs out. Returns the last value either way; errors from
/// `operation` propagate immediately.
pub async fn poll_until<T, E, F, Fut, D>(
    schedule: &PollSchedule,
    sleeper: &dyn Sleeper,
    target: &str,
    is_done: D,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    D: Fn(&T) -> bool,
    T: std::fmt::Debug,
{
    let max_tries = schedule.max_tries.max(1);
    let mut tries = 0;

    loop {
        let value = operation().await?;
        tries += 1;

        if is_done(&value) {
            return Ok(value);
        }
        if tries >= max_tries {
            warn!(target_call = target, tries, last = ?value, "Polling budget exhausted");
            return Ok(value);
        }

        let wait = schedule.wait_before(tries);
        info!(
            target_call = target,
            wait_secs = wait.as_secs_f64(),
            tries,
            last = ?value,
            "Trying again in {:.1} seconds after {} tries calling {}",
            wait.as_secs_f64(),
            tries,
            target
        );
        sleeper.sleep(wait).await;
    }
}
