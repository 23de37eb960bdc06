//! Shutdown coordination.

use tokio_util::sync::CancellationToken;

/// Coordinator for graceful shutdown.
///
/// Wraps the root cancellation token. Long-running tasks hold the token (or
/// a child of it) and stop when it is cancelled.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    token: CancellationToken,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// The root token.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// A token cancelled with the root but cancellable on its own.
    pub fn child(&self) -> CancellationToken {
        self.token.child_token()
    }

    /// Trigger the shutdown signal. Idempotent.
    pub fn trigger(&self) {
        if !self.token.is_cancelled() {
            tracing::info!("Shutdown requested");
        }
        self.token.cancel();
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wait until shutdown is triggered.
    pub async fn wait(&self) {
        self.token.cancelled().await;
    }
}
