//! Metric tags and scopes.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::observability::sink::{MetricEvent, MetricSink, MetricValue};

/// Dimension name → value. Keys are unique and always iterate sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tags(BTreeMap<String, String>);

impl Tags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert; replaces an existing key.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Copy of `self` with `overrides` applied on top.
    pub fn merged(&self, overrides: &Tags) -> Tags {
        let mut merged = self.clone();
        for (k, v) in &overrides.0 {
            merged.0.insert(k.clone(), v.clone());
        }
        merged
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `key:value` pairs in key order, e.g. `a:1,b:2`.
    pub fn to_pairs(&self) -> Vec<String> {
        self.iter().map(|(k, v)| format!("{k}:{v}")).collect()
    }
}

impl<K, V> FromIterator<(K, V)> for Tags
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// A sink plus the tags every event reported through it carries.
///
/// Delivery failures are logged here so callers never see them.
#[derive(Clone)]
pub struct Scope {
    sink: Arc<dyn MetricSink>,
    tags: Tags,
}

impl Scope {
    pub fn new(sink: Arc<dyn MetricSink>) -> Self {
        Self {
            sink,
            tags: Tags::new(),
        }
    }

    /// Child scope with `overrides` merged over this scope's tags.
    pub fn tagged(&self, overrides: &Tags) -> Scope {
        Scope {
            sink: self.sink.clone(),
            tags: self.tags.merged(overrides),
        }
    }

    /// Child scope with a single extra tag.
    pub fn with_tag(&self, key: impl Into<String>, value: impl Into<String>) -> Scope {
        self.tagged(&Tags::new().with(key, value))
    }

    pub fn tags(&self) -> &Tags {
        &self.tags
    }

    pub fn sink(&self) -> &Arc<dyn MetricSink> {
        &self.sink
    }

    pub fn counter(&self, name: &str, value: u64) {
        self.emit(name, MetricValue::Counter(value));
    }

    pub fn gauge(&self, name: &str, value: f64) {
        self.emit(name, MetricValue::Gauge(value));
    }

    pub fn timer(&self, name: &str, interval: Duration) {
        self.emit(name, MetricValue::Timer(interval));
    }

    pub fn histogram(&self, name: &str, value: f64) {
        self.emit(name, MetricValue::Histogram(value));
    }

    fn emit(&self, name: &str, value: MetricValue) {
        let event = MetricEvent::new(name, self.tags.clone(), value);
        if let Err(e) = self.sink.emit(event) {
            tracing::warn!(
                provider = self.sink.provider(),
                metric = %name,
                error = %e,
                "Failed to deliver metric"
            );
        }
    }
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("provider", &self.sink.provider())
            .field("tags", &self.tags)
            .finish()
    }
}
