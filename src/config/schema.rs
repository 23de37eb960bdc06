//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the iplocate service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP front-end settings.
    pub server: ServerConfig,

    /// Workflow submission settings.
    pub workflow: WorkflowConfig,

    /// Activity execution settings (timeouts, retry policy).
    pub activity: ActivityConfig,

    /// Upstream lookup endpoints.
    pub lookup: LookupConfig,

    /// Metrics reporter selection.
    pub metrics: MetricsConfig,

    /// Log output settings.
    pub logging: LoggingConfig,
}

/// HTTP front-end configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:4000").
    pub bind_address: String,

    /// Request timeout in seconds. A request waits for the whole workflow, so
    /// this must exceed `workflow.execution_timeout_secs`.
    pub request_timeout_secs: u64,

    /// Directory holding `index.html` and friends.
    pub static_dir: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:4000".to_string(),
            request_timeout_secs: 30,
            static_dir: "web/static".to_string(),
        }
    }
}

/// Workflow submission configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Namespace workflows are submitted to.
    pub namespace: String,

    /// Task queue workflows and activities are registered on.
    pub task_queue: String,

    /// Upper bound for one workflow execution in seconds. Must be shorter than
    /// `server.request_timeout_secs` so the handler renders the timeout.
    pub execution_timeout_secs: u64,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            namespace: "default".to_string(),
            task_queue: "ip-address".to_string(),
            execution_timeout_secs: 25,
        }
    }
}

/// Activity execution configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ActivityConfig {
    /// Maximum duration of a single attempt in seconds.
    pub start_to_close_timeout_secs: u64,

    /// Retry policy applied to every activity.
    pub retry: RetryConfig,
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            start_to_close_timeout_secs: 60,
            retry: RetryConfig::default(),
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Delay before the first retry in milliseconds.
    pub initial_interval_ms: u64,

    /// Cap on the delay between retries in milliseconds.
    pub maximum_interval_ms: u64,

    /// Multiplier applied to the delay after each failed attempt.
    pub backoff_coefficient: f64,

    /// Maximum number of attempts. 0 means unlimited.
    pub maximum_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_interval_ms: 1_000,
            maximum_interval_ms: 60_000,
            backoff_coefficient: 2.0,
            maximum_attempts: 0,
        }
    }
}

/// Upstream lookup endpoints.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LookupConfig {
    /// Endpoint returning the caller's public IP as plain text.
    pub ip_url: String,

    /// Geolocation endpoint; the IP is appended as the last path segment.
    pub geo_url: String,

    /// User agent sent with lookup requests.
    pub user_agent: String,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            ip_url: "https://icanhazip.com".to_string(),
            geo_url: "http://ip-api.com/json/".to_string(),
            user_agent: concat!("iplocate/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Metrics reporter configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Reporter provider tag ("prometheus" or "dogstatsd").
    /// Unknown tags fall back to prometheus.
    pub provider: String,

    /// Namespace prefixed to every metric name.
    pub namespace: String,

    /// Prometheus pull endpoint settings.
    pub prometheus: PrometheusConfig,

    /// DogStatsD push settings.
    pub dogstatsd: DogStatsdConfig,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            provider: "prometheus".to_string(),
            namespace: "iplocate".to_string(),
            prometheus: PrometheusConfig::default(),
            dogstatsd: DogStatsdConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PrometheusConfig {
    /// Scrape endpoint bind address.
    pub listen_address: String,
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            listen_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DogStatsdConfig {
    /// Agent address (host:port). Empty uses 127.0.0.1:8125.
    pub host_port: String,

    /// Buffer flush interval in milliseconds. 0 uses 1000.
    pub flush_interval_ms: u64,

    /// Maximum payload size per datagram. 0 uses 1432.
    pub flush_bytes: usize,
}

impl Default for DogStatsdConfig {
    fn default() -> Self {
        Self {
            host_port: "127.0.0.1:8125".to_string(),
            flush_interval_ms: 1_000,
            flush_bytes: 1_432,
        }
    }
}

/// Log output configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    pub level: String,

    /// Output format: "pretty" or "json".
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
