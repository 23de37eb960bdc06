//! Metric sink capability.
//!
//! # Responsibilities
//! - Define the event shape every reporter consumes (`MetricEvent`)
//! - Define the one interface reporters implement (`MetricSink`)
//!
//! # Design Decisions
//! - Events are immutable values, consumed once by `emit`
//! - Sinks are shared across concurrent activities (`Send + Sync`)
//! - A sink that cannot express a kind drops it and logs; it never errors

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::observability::tags::Tags;

/// Metric kinds a sink may be asked to report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    Counter,
    Gauge,
    Timer,
    Histogram,
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Timer => "timer",
            MetricKind::Histogram => "histogram",
        };
        f.write_str(name)
    }
}

/// The measured value; its variant determines the kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    Counter(u64),
    Gauge(f64),
    Timer(Duration),
    /// A raw sample for a value distribution.
    Histogram(f64),
}

impl MetricValue {
    pub fn kind(&self) -> MetricKind {
        match self {
            MetricValue::Counter(_) => MetricKind::Counter,
            MetricValue::Gauge(_) => MetricKind::Gauge,
            MetricValue::Timer(_) => MetricKind::Timer,
            MetricValue::Histogram(_) => MetricKind::Histogram,
        }
    }
}

/// A single measurement with its dimensions.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricEvent {
    pub name: String,
    pub tags: Tags,
    pub value: MetricValue,
}

impl MetricEvent {
    pub fn new(name: impl Into<String>, tags: Tags, value: MetricValue) -> Self {
        Self {
            name: name.into(),
            tags,
            value,
        }
    }

    pub fn kind(&self) -> MetricKind {
        self.value.kind()
    }
}

/// Delivery failures. Logged by callers, never surfaced to workflows.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("metric backend unreachable: {0}")]
    Unreachable(#[from] std::io::Error),

    #[error("sink is closed")]
    Closed,
}

/// Destination for metric events.
pub trait MetricSink: Send + Sync {
    /// Short provider name used in logs.
    fn provider(&self) -> &'static str;

    /// Whether this backend can represent `kind`.
    fn supports(&self, kind: MetricKind) -> bool;

    /// Deliver one event. Unsupported kinds are dropped with a warning.
    fn emit(&self, event: MetricEvent) -> Result<(), SinkError>;

    /// Push any buffered events to the backend.
    fn flush(&self) -> Result<(), SinkError>;

    /// Release background resources. Call `flush` first.
    fn close(&self) {}

    fn report_counter(&self, name: &str, tags: &Tags, value: u64) -> Result<(), SinkError> {
        self.emit(MetricEvent::new(name, tags.clone(), MetricValue::Counter(value)))
    }

    fn report_gauge(&self, name: &str, tags: &Tags, value: f64) -> Result<(), SinkError> {
        self.emit(MetricEvent::new(name, tags.clone(), MetricValue::Gauge(value)))
    }

    fn report_timer(&self, name: &str, tags: &Tags, interval: Duration) -> Result<(), SinkError> {
        self.emit(MetricEvent::new(name, tags.clone(), MetricValue::Timer(interval)))
    }
}

/// Log and swallow an event the sink cannot express.
pub(crate) fn drop_unsupported(provider: &'static str, event: &MetricEvent) {
    tracing::warn!(
        provider,
        metric = %event.name,
        kind = %event.kind(),
        "Metric kind not supported by reporter, dropping"
    );
}
