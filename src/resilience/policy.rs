//! Retry policy.
//!
//! # Responsibilities
//! - Hold the validated exponential-backoff configuration of one activity
//! - Decide whether a failed attempt may be retried
//! - Compute the delay before the next attempt
//!
//! # Design Decisions
//! - Immutable once built; shared read-only across all attempts
//! - Pure: no clocks, no sleeping, no logging
//! - Failure classification comes from the `Retryable` trait

use std::time::Duration;

use crate::config::{ConfigError, RetryConfig};
use crate::resilience::backoff::calculate_backoff;
use crate::resilience::retries::Retryable;

/// Exponential backoff retry policy.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    initial_interval: Duration,
    maximum_interval: Duration,
    backoff_coefficient: f64,
    maximum_attempts: Option<u32>,
}

impl RetryPolicy {
    /// Build a policy, rejecting values that break the backoff invariants.
    ///
    /// `maximum_attempts` of `None` or `Some(0)` means unlimited.
    pub fn new(
        initial_interval: Duration,
        maximum_interval: Duration,
        backoff_coefficient: f64,
        maximum_attempts: Option<u32>,
    ) -> Result<Self, ConfigError> {
        if initial_interval.is_zero() {
            return Err(ConfigError::RetryPolicy(
                "initial interval must be greater than zero".to_string(),
            ));
        }
        if !backoff_coefficient.is_finite() || backoff_coefficient < 1.0 {
            return Err(ConfigError::RetryPolicy(format!(
                "backoff coefficient must be >= 1, got {backoff_coefficient}"
            )));
        }
        if maximum_interval < initial_interval {
            return Err(ConfigError::RetryPolicy(format!(
                "maximum interval {maximum_interval:?} is shorter than initial interval {initial_interval:?}"
            )));
        }

        Ok(Self {
            initial_interval,
            maximum_interval,
            backoff_coefficient,
            maximum_attempts: maximum_attempts.filter(|&n| n > 0),
        })
    }

    pub fn initial_interval(&self) -> Duration {
        self.initial_interval
    }

    pub fn maximum_interval(&self) -> Duration {
        self.maximum_interval
    }

    pub fn backoff_coefficient(&self) -> f64 {
        self.backoff_coefficient
    }

    pub fn maximum_attempts(&self) -> Option<u32> {
        self.maximum_attempts
    }

    /// Whether another attempt may follow `attempt_count` completed attempts
    /// that ended with `failure`.
    pub fn should_retry<E: Retryable + ?Sized>(&self, attempt_count: u32, failure: &E) -> bool {
        if let Some(max) = self.maximum_attempts {
            if attempt_count >= max {
                return false;
            }
        }
        failure.is_retryable()
    }

    /// Delay to wait after the `attempt_count`-th failed attempt.
    pub fn next_interval(&self, attempt_count: u32) -> Duration {
        calculate_backoff(
            attempt_count,
            self.initial_interval,
            self.backoff_coefficient,
            self.maximum_interval,
        )
    }
}

impl Default for RetryPolicy {
    /// One second doubling up to one minute, unlimited attempts.
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(1),
            maximum_interval: Duration::from_secs(60),
            backoff_coefficient: 2.0,
            maximum_attempts: None,
        }
    }
}

impl TryFrom<&RetryConfig> for RetryPolicy {
    type Error = ConfigError;

    fn try_from(config: &RetryConfig) -> Result<Self, Self::Error> {
        Self::new(
            Duration::from_millis(config.initial_interval_ms),
            Duration::from_millis(config.maximum_interval_ms),
            config.backoff_coefficient,
            Some(config.maximum_attempts),
        )
    }
}
