//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::AppConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable overriding `metrics.provider`.
pub const METRICS_PROVIDER_ENV: &str = "METRICS_PROVIDER";

/// Startup configuration errors. Always fatal, never retried.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),

    #[error("Invalid retry policy: {0}")]
    RetryPolicy(String),

    #[error("Invalid address '{address}': {reason}")]
    Address { address: String, reason: String },

    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to resolve metrics target '{target}': {reason}")]
    Resolve { target: String, reason: String },

    #[error("Metrics reporter error: {0}")]
    Reporter(String),

    #[error("HTTP client error: {0}")]
    HttpClient(String),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse, apply environment overrides and validate.
pub fn parse_config(content: &str) -> Result<AppConfig, ConfigError> {
    let mut config: AppConfig = toml::from_str(content)?;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Built-in defaults with environment overrides applied.
pub fn default_config() -> Result<AppConfig, ConfigError> {
    let mut config = AppConfig::default();
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Apply environment overrides using the given lookup.
pub fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(provider) = lookup(METRICS_PROVIDER_ENV) {
        let provider = provider.trim();
        if !provider.is_empty() {
            config.metrics.provider = provider.to_string();
        }
    }
}
