//! # Retry Backoff
//!
//! Delay schedule used between failed attempts to open a watch.
//!
//! The default is a constant interval (2s), which bounds the worst-case
//! reconnection latency. A Fibonacci schedule is available for deployments
//! that would rather go easy on an unreachable API server:
//! interval, interval, 2x, 3x, 5x, 8x, ... capped at `max_interval`.
//! Optional jitter adds a random amount in `[0, jitter]` to every delay.

use rand::Rng;
use std::str::FromStr;
use std::time::Duration;

use crate::error::WatchError;

/// Default delay between attempts to open a watch.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(2);

/// How the delay evolves across consecutive failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetryStrategy {
    /// Same delay every time
    #[default]
    Constant,
    /// Each delay is the sum of the previous two, capped
    Fibonacci,
}

impl FromStr for RetryStrategy {
    type Err = WatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "constant" | "fixed" => Ok(Self::Constant),
            "fibonacci" => Ok(Self::Fibonacci),
            other => Err(WatchError::InvalidConfig(format!(
                "unknown retry strategy '{other}' (expected 'constant' or 'fibonacci')"
            ))),
        }
    }
}

/// Retry configuration shared by every acquirer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Base delay between attempts
    pub interval: Duration,
    /// Growth strategy
    pub strategy: RetryStrategy,
    /// Upper bound for growing strategies
    pub max_interval: Duration,
    /// Maximum random delay added on top, zero to disable
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::constant(DEFAULT_RETRY_INTERVAL)
    }
}

impl RetryPolicy {
    /// Constant-interval retry with no jitter.
    #[must_use]
    pub fn constant(interval: Duration) -> Self {
        Self {
            interval,
            strategy: RetryStrategy::Constant,
            max_interval: interval,
            jitter: Duration::ZERO,
        }
    }

    /// Fibonacci growth from `interval` up to `max_interval`.
    #[must_use]
    pub fn fibonacci(interval: Duration, max_interval: Duration) -> Self {
        Self {
            interval,
            strategy: RetryStrategy::Fibonacci,
            max_interval,
            jitter: Duration::ZERO,
        }
    }

    /// Adds up to `jitter` of random delay to every attempt.
    #[must_use]
    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// Checks the policy can produce a usable schedule.
    pub fn validate(&self) -> Result<(), WatchError> {
        if self.interval.is_zero() {
            return Err(WatchError::InvalidConfig(
                "retry interval must be greater than zero".to_string(),
            ));
        }
        if self.strategy == RetryStrategy::Fibonacci && self.max_interval < self.interval {
            return Err(WatchError::InvalidConfig(format!(
                "max retry interval ({:?}) is below the base interval ({:?})",
                self.max_interval, self.interval
            )));
        }
        Ok(())
    }

    /// Starts a fresh schedule for one acquisition.
    #[must_use]
    pub fn schedule(&self) -> RetrySchedule {
        RetrySchedule {
            policy: self.clone(),
            prev: Duration::ZERO,
            current: self.interval,
        }
    }
}

/// Stateful delay generator for one acquisition.
#[derive(Debug, Clone)]
pub struct RetrySchedule {
    policy: RetryPolicy,
    /// Previous delay, without jitter
    prev: Duration,
    /// Next delay to hand out, without jitter
    current: Duration,
}

impl RetrySchedule {
    /// Returns the next delay and advances the schedule.
    pub fn next_delay(&mut self) -> Duration {
        let base = self.current;

        if self.policy.strategy == RetryStrategy::Fibonacci {
            let next = self.prev.saturating_add(self.current);
            self.prev = self.current;
            self.current = std::cmp::min(next, self.policy.max_interval);
        }

        base.saturating_add(self.jitter())
    }

    fn jitter(&self) -> Duration {
        let max_ms = u64::try_from(self.policy.jitter.as_millis()).unwrap_or(u64::MAX);
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
    }
}
