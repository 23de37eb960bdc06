//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse, coefficient >= 1)
//! - Check the retry policy invariants before any activity runs
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system
//! - Network-dependent checks (binding, DNS) belong to the reporter factory

use std::fmt;
use std::net::SocketAddr;

use url::Url;

use crate::config::schema::{AppConfig, LookupConfig, MetricsConfig};
use crate::observability::factory::MetricsProvider;
use crate::resilience::policy::RetryPolicy;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate the whole configuration, collecting every error.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_socket_addr(&mut errors, "server.bind_address", &config.server.bind_address);
    check_positive(
        &mut errors,
        "server.request_timeout_secs",
        config.server.request_timeout_secs,
    );

    if config.workflow.task_queue.trim().is_empty() {
        errors.push(ValidationError::new("workflow.task_queue", "must not be empty"));
    }
    check_positive(
        &mut errors,
        "workflow.execution_timeout_secs",
        config.workflow.execution_timeout_secs,
    );
    // The HTTP timeout drops the handler, so the workflow deadline must fire first.
    if config.workflow.execution_timeout_secs >= config.server.request_timeout_secs {
        errors.push(ValidationError::new(
            "workflow.execution_timeout_secs",
            format!(
                "must be shorter than server.request_timeout_secs ({})",
                config.server.request_timeout_secs
            ),
        ));
    }

    check_positive(
        &mut errors,
        "activity.start_to_close_timeout_secs",
        config.activity.start_to_close_timeout_secs,
    );
    if let Err(e) = RetryPolicy::try_from(&config.activity.retry) {
        errors.push(ValidationError::new("activity.retry", e.to_string()));
    }

    validate_lookup(&mut errors, &config.lookup);
    validate_metrics(&mut errors, &config.metrics);

    if !matches!(config.logging.format.as_str(), "pretty" | "json") {
        errors.push(ValidationError::new(
            "logging.format",
            format!("unknown format '{}', expected pretty or json", config.logging.format),
        ));
    }
    if !matches!(
        config.logging.level.to_ascii_lowercase().as_str(),
        "trace" | "debug" | "info" | "warn" | "error"
    ) {
        errors.push(ValidationError::new(
            "logging.level",
            format!("unknown level '{}'", config.logging.level),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_lookup(errors: &mut Vec<ValidationError>, lookup: &LookupConfig) {
    for (field, value) in [("lookup.ip_url", &lookup.ip_url), ("lookup.geo_url", &lookup.geo_url)] {
        match Url::parse(value) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => errors.push(ValidationError::new(
                field,
                format!("unsupported scheme '{}'", url.scheme()),
            )),
            Err(e) => errors.push(ValidationError::new(field, e.to_string())),
        }
    }
}

fn validate_metrics(errors: &mut Vec<ValidationError>, metrics: &MetricsConfig) {
    let namespace_ok = !metrics.namespace.is_empty()
        && metrics
            .namespace
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !namespace_ok {
        errors.push(ValidationError::new(
            "metrics.namespace",
            "must be non-empty and contain only [A-Za-z0-9_]",
        ));
    }

    // Only the selected provider's settings matter.
    match MetricsProvider::resolve(&metrics.provider) {
        MetricsProvider::Prometheus => check_socket_addr(
            errors,
            "metrics.prometheus.listen_address",
            &metrics.prometheus.listen_address,
        ),
        MetricsProvider::DogStatsd => {
            let host_port = metrics.dogstatsd.host_port.trim();
            if !host_port.is_empty() {
                let port_ok = host_port
                    .rsplit_once(':')
                    .is_some_and(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok());
                if !port_ok {
                    errors.push(ValidationError::new(
                        "metrics.dogstatsd.host_port",
                        format!("expected host:port, got '{host_port}'"),
                    ));
                }
            }
        }
    }
}

fn check_socket_addr(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    if let Err(e) = value.parse::<SocketAddr>() {
        errors.push(ValidationError::new(field, format!("'{value}': {e}")));
    }
}

fn check_positive(errors: &mut Vec<ValidationError>, field: &str, value: u64) {
    if value == 0 {
        errors.push(ValidationError::new(field, "must be greater than 0"));
    }
}
