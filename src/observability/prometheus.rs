//! Prometheus pull reporter.
//!
//! # Responsibilities
//! - Aggregate events in a `metrics-exporter-prometheus` recorder owned by
//!   this sink (never installed as the process-global recorder)
//! - Serve the text exposition format on `GET /metrics`
//!
//! # Design Decisions
//! - Timers become histograms in seconds with latency-oriented buckets
//! - Names are `<namespace>_<name>` restricted to `[A-Za-z0-9_:]`
//! - Flush is a no-op: Prometheus scrapes on its own schedule

use std::net::SocketAddr;
use std::time::Duration;

use axum::{extract::State, routing::get, Router};
use metrics::Label;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle, PrometheusRecorder};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::config::{ConfigError, PrometheusConfig};
use crate::observability::sink::{MetricEvent, MetricKind, MetricSink, MetricValue, SinkError};

/// Histogram buckets for timers, in seconds.
pub const TIMER_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
];

const UPKEEP_INTERVAL: Duration = Duration::from_secs(5);

pub struct PrometheusSink {
    recorder: PrometheusRecorder,
    handle: PrometheusHandle,
    namespace: String,
    local_addr: SocketAddr,
    shutdown: CancellationToken,
}

impl PrometheusSink {
    /// Bind the scrape endpoint and start serving it.
    pub async fn bind(config: &PrometheusConfig, namespace: &str) -> Result<Self, ConfigError> {
        let addr: SocketAddr = config
            .listen_address
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::Address {
                address: config.listen_address.clone(),
                reason: e.to_string(),
            })?;

        let recorder = PrometheusBuilder::new()
            .set_buckets(TIMER_BUCKETS)
            .map_err(|e| ConfigError::Reporter(e.to_string()))?
            .build_recorder();
        let handle = recorder.handle();

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ConfigError::Bind {
                address: config.listen_address.clone(),
                source,
            })?;
        let local_addr = listener.local_addr().map_err(|source| ConfigError::Bind {
            address: config.listen_address.clone(),
            source,
        })?;

        let shutdown = CancellationToken::new();
        spawn_scrape_server(listener, handle.clone(), shutdown.clone());

        tracing::info!(address = %local_addr, "Prometheus scrape endpoint listening");

        Ok(Self {
            recorder,
            handle,
            namespace: namespace.to_string(),
            local_addr,
            shutdown,
        })
    }

    /// Address the scrape endpoint is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Current exposition text, as served on `/metrics`.
    pub fn render(&self) -> String {
        self.handle.render()
    }

    fn metric_name(&self, name: &str) -> String {
        sanitize_name(&format!("{}_{}", self.namespace, name))
    }
}

fn spawn_scrape_server(listener: TcpListener, handle: PrometheusHandle, shutdown: CancellationToken) {
    let upkeep_handle = handle.clone();
    let upkeep_shutdown = shutdown.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(UPKEEP_INTERVAL);
        loop {
            tokio::select! {
                _ = ticker.tick() => upkeep_handle.run_upkeep(),
                _ = upkeep_shutdown.cancelled() => break,
            }
        }
    });

    let app = Router::new()
        .route("/metrics", get(scrape))
        .with_state(handle);

    tokio::spawn(async move {
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await;
        if let Err(e) = result {
            tracing::error!(error = %e, "Prometheus scrape endpoint failed");
        }
    });
}

async fn scrape(State(handle): State<PrometheusHandle>) -> String {
    handle.render()
}

/// Replace characters Prometheus does not allow in metric and label names.
pub fn sanitize_name(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == ':' { c } else { '_' })
        .collect();
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

impl MetricSink for PrometheusSink {
    fn provider(&self) -> &'static str {
        "prometheus"
    }

    fn supports(&self, _kind: MetricKind) -> bool {
        true
    }

    fn emit(&self, event: MetricEvent) -> Result<(), SinkError> {
        if self.shutdown.is_cancelled() {
            return Err(SinkError::Closed);
        }

        let name = self.metric_name(&event.name);
        let labels: Vec<Label> = event
            .tags
            .iter()
            .map(|(k, v)| Label::new(sanitize_name(k), v.to_string()))
            .collect();

        metrics::with_local_recorder(&self.recorder, || match event.value {
            MetricValue::Counter(v) => metrics::counter!(name, labels).increment(v),
            MetricValue::Gauge(v) => metrics::gauge!(name, labels).set(v),
            MetricValue::Timer(d) => metrics::histogram!(name, labels).record(d.as_secs_f64()),
            MetricValue::Histogram(v) => metrics::histogram!(name, labels).record(v),
        });
        Ok(())
    }

    fn flush(&self) -> Result<(), SinkError> {
        Ok(())
    }

    fn close(&self) {
        self.shutdown.cancel();
    }
}
