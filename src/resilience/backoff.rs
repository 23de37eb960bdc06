//! Deterministic exponential backoff.

use std::time::Duration;

/// Calculate the exponential backoff delay for a 1-based attempt number.
///
/// `initial * coefficient^(attempt - 1)`, capped at `max`. No jitter is added,
/// so callers that retry in lockstep will also wake up in lockstep.
pub fn calculate_backoff(attempt: u32, initial: Duration, coefficient: f64, max: Duration) -> Duration {
    let exponent = attempt.max(1) - 1;
    let exponent = i32::try_from(exponent).unwrap_or(i32::MAX);

    // Whole nanoseconds keep integral coefficients exact.
    let delay_nanos = initial.as_nanos() as f64 * coefficient.powi(exponent);
    let max_nanos = max.as_nanos() as f64;

    if !delay_nanos.is_finite() || delay_nanos >= max_nanos {
        return max;
    }

    Duration::from_nanos(delay_nanos.round() as u64)
}
