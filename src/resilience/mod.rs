//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Activity attempt fails:
//!     → retries.rs (is the failure retryable? advance AttemptState)
//!     → policy.rs (attempt budget left? delay before next attempt)
//!     → backoff.rs (exponential delay, capped, no jitter)
//!     → retries.rs Sleeper (wait, interruptible by the executor)
//!
//! Inside an attempt:
//!     → timeouts.rs (start-to-close deadline around upstream calls)
//! ```
//!
//! # Design Decisions
//! - Retry decisions are pure functions of policy + attempt count + failure
//! - Intervals are deterministic; no jitter
//! - Timeouts are enforced by the operation, not the retry loop

pub mod backoff;
pub mod policy;
pub mod retries;
pub mod timeouts;

pub use policy::RetryPolicy;
pub use retries::{AttemptState, RecordingSleeper, Retryable, Sleeper, TokioSleeper};
