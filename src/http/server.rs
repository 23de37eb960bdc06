//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router (form, API, static files)
//! - Wire up middleware (request ID, tracing, timeout)
//! - Serve on a bound listener until shutdown is requested

use std::sync::Arc;
use std::time::Duration;

use axum::{extract::Request, routing::post, Router};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::ServeDir,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ServerConfig;
use crate::http::handlers;
use crate::http::X_REQUEST_ID;
use crate::workflow::WorkflowClient;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub workflows: Arc<dyn WorkflowClient>,
}

/// HTTP front-end for address lookups.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(config: &ServerConfig, workflows: Arc<dyn WorkflowClient>) -> Self {
        let state = AppState { workflows };
        Self {
            router: Self::build_router(config, state),
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ServerConfig, state: AppState) -> Router {
        let static_files = ServeDir::new(&config.static_dir);

        Router::new()
            .route("/submit", post(handlers::submit))
            .route("/api", post(handlers::api))
            .fallback_service(static_files)
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
                let request_id = request
                    .headers()
                    .get(X_REQUEST_ID)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown");
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            }))
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Router with all layers applied.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener` until `shutdown` is cancelled.
    pub async fn run(self, listener: TcpListener, shutdown: CancellationToken) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
