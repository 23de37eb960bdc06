//! Reporter factory.
//!
//! Builds exactly one concrete `MetricSink` from `MetricsConfig`. An unknown
//! provider tag falls back to Prometheus with a warning instead of failing
//! startup; dashboards keep working when the tag is mistyped.

use std::sync::Arc;

use crate::config::{ConfigError, MetricsConfig};
use crate::observability::dogstatsd::DogStatsdSink;
use crate::observability::prometheus::PrometheusSink;
use crate::observability::sink::MetricSink;

/// Supported metrics backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MetricsProvider {
    #[default]
    Prometheus,
    DogStatsd,
}

impl MetricsProvider {
    /// Parse a provider tag. Returns `None` for unknown tags.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "prometheus" => Some(MetricsProvider::Prometheus),
            "dogstatsd" => Some(MetricsProvider::DogStatsd),
            _ => None,
        }
    }

    /// Parse a provider tag, falling back to the default for unknown tags.
    pub fn resolve(tag: &str) -> Self {
        Self::from_tag(tag).unwrap_or_default()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricsProvider::Prometheus => "prometheus",
            MetricsProvider::DogStatsd => "dogstatsd",
        }
    }
}

pub struct ReporterFactory {
    config: MetricsConfig,
}

impl ReporterFactory {
    pub fn new(config: MetricsConfig) -> Self {
        Self { config }
    }

    /// Provider that `build` will construct.
    pub fn provider(&self) -> MetricsProvider {
        match MetricsProvider::from_tag(&self.config.provider) {
            Some(provider) => provider,
            None => {
                let fallback = MetricsProvider::default();
                tracing::warn!(
                    requested = %self.config.provider,
                    fallback = fallback.as_str(),
                    "Unknown metrics provider, using default"
                );
                fallback
            }
        }
    }

    /// Construct the configured sink.
    pub async fn build(&self) -> Result<Arc<dyn MetricSink>, ConfigError> {
        let namespace = &self.config.namespace;
        let sink: Arc<dyn MetricSink> = match self.provider() {
            MetricsProvider::Prometheus => {
                Arc::new(PrometheusSink::bind(&self.config.prometheus, namespace).await?)
            }
            MetricsProvider::DogStatsd => {
                Arc::new(DogStatsdSink::connect(&self.config.dogstatsd, namespace).await?)
            }
        };

        tracing::info!(provider = sink.provider(), namespace = %namespace, "Metrics reporter initialized");
        Ok(sink)
    }
}
