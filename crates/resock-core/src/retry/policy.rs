//! Reconnection delay policy
//!
//! A policy is captured once when the socket is built and never changes. The
//! delay before retry `n` (counting from 0 since the last successful open) is
//! either the fixed base delay or `base * rate^n`, capped at the backoff limit.

use std::time::Duration;

/// Default delay between reconnection attempts
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(1000);

/// Exponential backoff parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    /// Multiplier applied per attempt (>= 1.0)
    pub rate: f64,
    /// Upper bound for any single delay
    pub limit: Option<Duration>,
}

impl Backoff {
    /// Backoff with the given rate and no upper bound
    #[must_use]
    pub const fn new(rate: f64) -> Self {
        Self { rate, limit: None }
    }

    /// Cap every delay at `limit`
    #[must_use]
    pub const fn with_limit(mut self, limit: Duration) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Immutable reconnection policy
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Base delay before a reconnection attempt
    pub delay: Duration,
    /// Maximum number of retries after a closure; `None` retries forever
    pub attempt_limit: Option<u32>,
    /// Exponential backoff; `None` keeps the delay fixed
    pub backoff: Option<Backoff>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(DEFAULT_RETRY_DELAY)
    }
}

impl RetryPolicy {
    /// Fixed delay, unlimited retries
    #[must_use]
    pub const fn fixed(delay: Duration) -> Self {
        Self {
            delay,
            attempt_limit: None,
            backoff: None,
        }
    }

    /// Stop retrying after `limit` attempts
    #[must_use]
    pub const fn with_attempt_limit(mut self, limit: u32) -> Self {
        self.attempt_limit = Some(limit);
        self
    }

    /// Grow the delay exponentially
    #[must_use]
    pub const fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = Some(backoff);
        self
    }

    /// Check whether `attempt` is beyond the configured limit
    #[must_use]
    pub fn is_exhausted(&self, attempt: u32) -> bool {
        self.attempt_limit.is_some_and(|limit| attempt >= limit)
    }

    /// Delay before retry number `attempt`, or `None` once retries are exhausted
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if self.is_exhausted(attempt) {
            return None;
        }

        let Some(backoff) = self.backoff else {
            return Some(self.delay);
        };

        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let nanos = self.delay.as_nanos() as f64 * backoff.rate.powi(exponent);
        let delay = if nanos.is_finite() && nanos < u64::MAX as f64 {
            Duration::from_nanos(nanos as u64)
        } else {
            Duration::MAX
        };

        Some(match backoff.limit {
            Some(limit) => delay.min(limit),
            None => delay,
        })
    }
}
