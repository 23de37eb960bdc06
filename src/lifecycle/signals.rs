//! OS signal handling.
//!
//! # Responsibilities
//! - Listen for SIGINT (Ctrl+C) and, on unix, SIGTERM
//! - Turn the first signal into a graceful shutdown
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - A second signal while draining forces the process to exit

use tokio::task::JoinHandle;

use crate::lifecycle::shutdown::Shutdown;

/// Wait for the next termination signal and return its name.
pub async fn wait_for_signal() -> &'static str {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => "SIGINT",
        _ = terminate => "SIGTERM",
    }
}

/// Trigger `shutdown` on the first signal; exit on the second.
pub fn spawn_signal_handler(shutdown: Shutdown) -> JoinHandle<()> {
    tokio::spawn(async move {
        let signal = wait_for_signal().await;
        tracing::info!(signal, "Signal received, starting graceful shutdown");
        shutdown.trigger();

        let signal = wait_for_signal().await;
        tracing::warn!(signal, "Second signal received, forcing exit");
        std::process::exit(1);
    })
}
