//! Retry bookkeeping.
//!
//! # Responsibilities
//! - Classify failures as retryable or not (`Retryable`)
//! - Track one invocation's attempt number and next scheduled time
//! - Sleep between attempts (`Sleeper`), swappable in tests
//!
//! # Design Decisions
//! - `AttemptState` is owned by a single executor invocation, never shared
//! - Sleeping is the only suspension point; cancellation is the caller's job

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;

use crate::resilience::policy::RetryPolicy;

/// Classification of a failure for the retry loop.
pub trait Retryable {
    /// True for transient failures worth another attempt.
    fn is_retryable(&self) -> bool;
}

/// Mutable per-invocation retry state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptState {
    /// 1-based number of the attempt about to run (or running).
    pub attempt: u32,
    /// Delay that preceded the current attempt (zero for the first one).
    pub next_interval: Duration,
    /// When the current attempt was scheduled.
    pub scheduled_at: SystemTime,
}

impl AttemptState {
    pub fn new(scheduled_at: SystemTime) -> Self {
        Self {
            attempt: 1,
            next_interval: Duration::ZERO,
            scheduled_at,
        }
    }

    /// Advance past a failed attempt; returns the delay to wait.
    pub fn record_failure(&mut self, policy: &RetryPolicy, now: SystemTime) -> Duration {
        let delay = policy.next_interval(self.attempt);
        self.attempt += 1;
        self.next_interval = delay;
        self.scheduled_at = now + delay;
        delay
    }
}

/// Waits out the delay between attempts.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, delay: Duration);
}

/// Real sleeping on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}

/// Records requested delays and returns immediately.
///
/// Intended for tests that assert on the backoff sequence.
#[derive(Debug, Clone, Default)]
pub struct RecordingSleeper {
    calls: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays requested so far, in order.
    pub fn calls(&self) -> Vec<Duration> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, delay: Duration) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(delay);
        tokio::task::yield_now().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attempt_state_advances() {
        let policy = RetryPolicy::new(Duration::from_secs(1), Duration::from_secs(60), 2.0, None).unwrap();
        let start = SystemTime::UNIX_EPOCH;
        let mut state = AttemptState::new(start);
        assert_eq!(state.attempt, 1);

        let first = state.record_failure(&policy, start);
        assert_eq!(first, Duration::from_secs(1));
        assert_eq!(state.attempt, 2);
        assert_eq!(state.scheduled_at, start + Duration::from_secs(1));

        let second = state.record_failure(&policy, start);
        assert_eq!(second, Duration::from_secs(2));
        assert_eq!(state.next_interval, Duration::from_secs(2));
        assert_eq!(state.attempt, 3);
    }

    #[tokio::test]
    async fn test_recording_sleeper_keeps_order() {
        let sleeper = RecordingSleeper::new();
        sleeper.sleep(Duration::from_secs(3)).await;
        sleeper.sleep(Duration::from_secs(1)).await;
        assert_eq!(sleeper.calls(), vec![Duration::from_secs(3), Duration::from_secs(1)]);
    }
}
