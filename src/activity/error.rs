//! Activity failure taxonomy.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::resilience::Retryable;

/// Why a single attempt failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActivityError {
    /// Network timeout, non-2xx, malformed upstream body. Drives the retry loop.
    #[error("transient failure: {0}")]
    Transient(String),

    /// Malformed input or permanent upstream rejection. Never retried.
    #[error("fatal failure: {0}")]
    Fatal(String),

    /// The invocation was cancelled or its context timed out.
    #[error("cancelled: {0}")]
    Cancelled(String),
}

impl ActivityError {
    pub fn transient(reason: impl fmt::Display) -> Self {
        ActivityError::Transient(reason.to_string())
    }

    pub fn fatal(reason: impl fmt::Display) -> Self {
        ActivityError::Fatal(reason.to_string())
    }

    pub fn cancelled(reason: impl fmt::Display) -> Self {
        ActivityError::Cancelled(reason.to_string())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ActivityError::Cancelled(_))
    }
}

impl Retryable for ActivityError {
    fn is_retryable(&self) -> bool {
        matches!(self, ActivityError::Transient(_))
    }
}

/// How an activity invocation ended without a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exhaustion {
    /// Every allowed attempt failed with a retryable error.
    AttemptsExhausted,
    /// An attempt failed with a non-retryable error.
    NonRetryable,
    /// Cancellation arrived while running or waiting to retry.
    Cancelled,
}

impl fmt::Display for Exhaustion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Exhaustion::AttemptsExhausted => "attempts exhausted",
            Exhaustion::NonRetryable => "non-retryable failure",
            Exhaustion::Cancelled => "cancelled",
        };
        f.write_str(reason)
    }
}

/// Final failure of an activity invocation, surfaced to the orchestrator.
#[derive(Debug, Clone, Error)]
#[error("activity {activity} {reason} after {attempts} attempt(s) in {elapsed:?}: {source}")]
pub struct ExecutionError {
    pub activity: String,
    pub attempts: u32,
    pub elapsed: Duration,
    pub reason: Exhaustion,
    pub source: ActivityError,
}

impl ExecutionError {
    pub fn is_cancelled(&self) -> bool {
        self.reason == Exhaustion::Cancelled
    }
}
