//! Activity subsystem.
//!
//! # Data Flow
//! ```text
//! Workflow step:
//!     → executor.rs (attempt loop, cancellation, retry sleeps)
//!     → instrumentation.rs (start/end metrics per attempt)
//!     → Activity::execute (one attempt, bounded by start-to-close)
//!     → error.rs (transient / fatal / cancelled)
//! ```
//!
//! # Design Decisions
//! - An activity is a unit of work that may fail and be retried
//! - The executor owns retries; activities only classify failures
//! - Every attempt is instrumented, including cancelled ones

pub mod error;
pub mod executor;
pub mod instrumentation;

use std::time::{Duration, Instant, SystemTime};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

pub use error::{ActivityError, ExecutionError, Exhaustion};
pub use executor::{ActivityExecutor, ActivityOptions, Completed};
pub use instrumentation::{ActiveMeasurement, AttemptOutcome};

/// A retriable unit of work.
#[async_trait]
pub trait Activity: Send + Sync {
    type Input: Send + Sync;
    type Output: Send;

    /// Activity type, reported as the `operation` tag (e.g. `activity.get_ip`).
    fn name(&self) -> &'static str;

    /// Workflow stage label, reported as the `stage` tag (e.g. `GetIP`).
    fn stage(&self) -> &'static str;

    /// Run a single attempt.
    async fn execute(&self, ctx: &ActivityContext, input: &Self::Input) -> Result<Self::Output, ActivityError>;
}

/// Per-attempt context handed to `Activity::execute`.
#[derive(Debug, Clone)]
pub struct ActivityContext {
    activity_type: &'static str,
    attempt: u32,
    scheduled_at: SystemTime,
    started_at: Instant,
    start_to_close: Option<Duration>,
    cancel: CancellationToken,
}

impl ActivityContext {
    pub fn new(
        activity_type: &'static str,
        attempt: u32,
        scheduled_at: SystemTime,
        start_to_close: Option<Duration>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            activity_type,
            attempt,
            scheduled_at,
            started_at: Instant::now(),
            start_to_close,
            cancel,
        }
    }

    pub fn activity_type(&self) -> &'static str {
        self.activity_type
    }

    /// 1-based attempt number.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn scheduled_at(&self) -> SystemTime {
        self.scheduled_at
    }

    /// Time left before the start-to-close deadline, if one is set.
    pub fn remaining(&self) -> Option<Duration> {
        self.start_to_close
            .map(|limit| limit.saturating_sub(self.started_at.elapsed()))
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }
}
