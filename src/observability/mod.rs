//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Activity attempts produce:
//!     → tags.rs Scope (merge base tags with per-call overrides)
//!     → sink.rs MetricEvent (counter, gauge, timer, histogram)
//!     → one MetricSink chosen by factory.rs:
//!         prometheus.rs (pull: recorder + /metrics endpoint)
//!         dogstatsd.rs  (push: buffered UDP lines, timer flush)
//!         memory.rs     (in-process recording)
//!
//! Everything logs through logging.rs (tracing subscriber).
//! ```
//!
//! # Design Decisions
//! - One sink instance per process, passed explicitly; no global recorder
//! - Delivery problems are logged, never returned to activities
//! - Shutdown flushes, then closes the sink

pub mod dogstatsd;
pub mod factory;
pub mod logging;
pub mod memory;
pub mod prometheus;
pub mod sink;
pub mod tags;

pub use factory::{MetricsProvider, ReporterFactory};
pub use memory::MemorySink;
pub use sink::{MetricEvent, MetricKind, MetricSink, MetricValue, SinkError};
pub use tags::{Scope, Tags};
