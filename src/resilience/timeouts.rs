//! Timeout enforcement.
//!
//! Activities call into upstream services under the start-to-close deadline
//! handed to them by the executor. The executor itself never times out an
//! attempt.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("deadline of {0:?} exceeded")]
pub struct DeadlineExceeded(pub Duration);

/// Run `fut` within `limit`, or unbounded when `limit` is `None`.
pub async fn with_deadline<F, T>(limit: Option<Duration>, fut: F) -> Result<T, DeadlineExceeded>
where
    F: Future<Output = T>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| DeadlineExceeded(limit)),
        None => Ok(fut.await),
    }
}
