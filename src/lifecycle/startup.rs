//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize all subsystems in dependency order
//! - Bind the HTTP listener and serve
//! - Tear down in order once shutdown is triggered
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - The listener binds last (traffic only when ready)
//! - Teardown flushes the metric sink before closing it

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::activity::{ActivityExecutor, ActivityOptions};
use crate::config::{AppConfig, ConfigError};
use crate::http::HttpServer;
use crate::lifecycle::shutdown::Shutdown;
use crate::lookup::{HttpGetter, Lookup, ReqwestGetter};
use crate::observability::{MetricSink, ReporterFactory, Scope};
use crate::workflow::{GetAddressFromIp, LocalWorkflowClient};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("HTTP server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// A fully wired, bound, not yet serving application.
pub struct Application {
    server: HttpServer,
    listener: TcpListener,
    sink: Arc<dyn MetricSink>,
    shutdown: Shutdown,
}

/// Build every subsystem from a validated config.
pub async fn build(config: &AppConfig, shutdown: Shutdown) -> Result<Application, StartupError> {
    let sink = ReporterFactory::new(config.metrics.clone()).build().await?;
    let getter = match ReqwestGetter::new(&config.lookup) {
        Ok(getter) => getter,
        Err(e) => {
            // Release the reporter's background tasks before bailing out.
            sink.close();
            return Err(e.into());
        }
    };
    build_with(config, sink, Arc::new(getter), shutdown).await
}

/// Build with an explicit metric sink and lookup transport.
pub async fn build_with(
    config: &AppConfig,
    sink: Arc<dyn MetricSink>,
    getter: Arc<dyn HttpGetter>,
    shutdown: Shutdown,
) -> Result<Application, StartupError> {
    let options = ActivityOptions::try_from(&config.activity)?;
    let executor = ActivityExecutor::new(options, Scope::new(sink.clone()));

    let lookup = Lookup::new(getter, &config.lookup);
    let workflows = LocalWorkflowClient::new(&config.workflow, executor, shutdown.token())
        .register(GetAddressFromIp::new(lookup));
    tracing::info!(
        namespace = %config.workflow.namespace,
        task_queue = %config.workflow.task_queue,
        workflows = ?workflows.registered(),
        "Workflows registered"
    );

    let server = HttpServer::new(&config.server, Arc::new(workflows));

    let listener = TcpListener::bind(&config.server.bind_address)
        .await
        .map_err(|source| ConfigError::Bind {
            address: config.server.bind_address.clone(),
            source,
        })?;

    Ok(Application {
        server,
        listener,
        sink,
        shutdown,
    })
}

impl Application {
    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.listener.local_addr()
    }

    pub fn sink(&self) -> &Arc<dyn MetricSink> {
        &self.sink
    }

    /// Serve until shutdown is triggered, then tear down.
    pub async fn run(self) -> Result<(), StartupError> {
        let Application {
            server,
            listener,
            sink,
            shutdown,
        } = self;

        let served = server.run(listener, shutdown.token()).await;
        // A server error ends the process too; make sure in-flight work stops.
        shutdown.trigger();
        teardown(sink.as_ref());

        served.map_err(StartupError::from)
    }
}

/// Flush, then close the metric sink.
pub fn teardown(sink: &dyn MetricSink) {
    if let Err(e) = sink.flush() {
        tracing::warn!(provider = sink.provider(), error = %e, "Final metrics flush failed");
    }
    sink.close();
    tracing::info!(provider = sink.provider(), "Metrics reporter closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::MemorySink;

    #[test]
    fn test_teardown_flushes_then_closes() {
        let sink = MemorySink::new();
        teardown(&sink);
        assert_eq!(sink.flush_count(), 1);
        assert!(sink.is_closed());
    }

    #[tokio::test]
    async fn test_bind_failure_is_config_error() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mut config = AppConfig::default();
        config.server.bind_address = taken.local_addr().unwrap().to_string();

        let sink = Arc::new(MemorySink::new());
        let getter = Arc::new(ReqwestGetter::new(&config.lookup).unwrap());
        let err = build_with(&config, sink, getter, Shutdown::new()).await.err().unwrap();

        assert!(matches!(err, StartupError::Config(ConfigError::Bind { .. })));
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let mut config = AppConfig::default();
        config.server.bind_address = "127.0.0.1:0".to_string();

        let sink = Arc::new(MemorySink::new());
        let getter = Arc::new(ReqwestGetter::new(&config.lookup).unwrap());
        let shutdown = Shutdown::new();
        let app = build_with(&config, sink.clone(), getter, shutdown.clone()).await.unwrap();

        let running = tokio::spawn(app.run());
        shutdown.trigger();

        let result = tokio::time::timeout(std::time::Duration::from_secs(5), running).await.unwrap().unwrap();
        assert!(result.is_ok());
        assert!(sink.is_closed());
        assert_eq!(sink.flush_count(), 1);
    }
}
