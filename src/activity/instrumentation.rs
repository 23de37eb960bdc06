//! Activity instrumentation.
//!
//! # Responsibilities
//! - Report schedule-to-start latency and a started counter when an attempt begins
//! - Report total latency and a succeeded/failed counter when it ends
//!
//! # Design Decisions
//! - `ActiveMeasurement` is a guard: dropping it without `finish` records a
//!   failed end, so panics and cancelled futures still pair start with end
//! - Metric delivery problems are logged by `Scope`, never returned

use std::time::{Instant, SystemTime};

use crate::observability::Scope;

pub const SCHEDULE_TO_START_LATENCY: &str = "schedule_to_start_latency";
pub const ACTIVITY_LATENCY: &str = "activity_latency";
pub const ACTIVITY_STARTED: &str = "activity_started";
pub const ACTIVITY_FAILED: &str = "activity_failed";
pub const ACTIVITY_SUCCEEDED: &str = "activity_succeeded";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Succeeded,
    Failed,
}

impl<T, E> From<&Result<T, E>> for AttemptOutcome {
    fn from(result: &Result<T, E>) -> Self {
        match result {
            Ok(_) => AttemptOutcome::Succeeded,
            Err(_) => AttemptOutcome::Failed,
        }
    }
}

/// An attempt in progress. End it with `finish` or let it drop.
#[must_use = "dropping the measurement records the attempt as failed"]
#[derive(Debug)]
pub struct ActiveMeasurement {
    scope: Scope,
    started: Instant,
    finished: bool,
}

/// Record the start of an attempt of `activity_type` scheduled at `scheduled_at`.
pub fn record_start(scope: &Scope, activity_type: &str, scheduled_at: SystemTime) -> ActiveMeasurement {
    let scope = scope.with_tag("operation", activity_type);

    // A schedule time in the future (clock skew) reports zero.
    let schedule_to_start = SystemTime::now()
        .duration_since(scheduled_at)
        .unwrap_or_default();
    scope.timer(SCHEDULE_TO_START_LATENCY, schedule_to_start);
    scope.counter(ACTIVITY_STARTED, 1);

    ActiveMeasurement {
        scope,
        started: Instant::now(),
        finished: false,
    }
}

/// Record the end of an attempt.
pub fn record_end(measurement: ActiveMeasurement, outcome: AttemptOutcome) {
    measurement.finish(outcome);
}

impl ActiveMeasurement {
    pub fn finish(mut self, outcome: AttemptOutcome) {
        self.record(outcome);
    }

    /// Scope carrying the merged tags of this attempt.
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    fn record(&mut self, outcome: AttemptOutcome) {
        if self.finished {
            return;
        }
        self.finished = true;

        self.scope.timer(ACTIVITY_LATENCY, self.started.elapsed());
        match outcome {
            AttemptOutcome::Succeeded => self.scope.counter(ACTIVITY_SUCCEEDED, 1),
            AttemptOutcome::Failed => self.scope.counter(ACTIVITY_FAILED, 1),
        }
    }
}

impl Drop for ActiveMeasurement {
    fn drop(&mut self) {
        self.record(AttemptOutcome::Failed);
    }
}
