//! In-process recording sink.
//!
//! Keeps every event in memory. Used by tests and by embedders that want to
//! inspect activity metrics without running a backend.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::observability::sink::{MetricEvent, MetricKind, MetricSink, MetricValue, SinkError};

#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<MetricEvent>>,
    flushes: AtomicUsize,
    closed: AtomicBool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of recorded events in emission order.
    pub fn events(&self) -> Vec<MetricEvent> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Events with the given name.
    pub fn named(&self, name: &str) -> Vec<MetricEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.name == name)
            .collect()
    }

    /// Sum of all counter increments for `name`.
    pub fn counter_total(&self, name: &str) -> u64 {
        self.named(name)
            .iter()
            .filter_map(|e| match e.value {
                MetricValue::Counter(v) => Some(v),
                _ => None,
            })
            .sum()
    }

    pub fn flush_count(&self) -> usize {
        self.flushes.load(Ordering::Relaxed)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }
}

impl MetricSink for MemorySink {
    fn provider(&self) -> &'static str {
        "memory"
    }

    fn supports(&self, _kind: MetricKind) -> bool {
        true
    }

    fn emit(&self, event: MetricEvent) -> Result<(), SinkError> {
        if self.is_closed() {
            return Err(SinkError::Closed);
        }
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
        Ok(())
    }

    fn flush(&self) -> Result<(), SinkError> {
        self.flushes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Relaxed);
    }
}
