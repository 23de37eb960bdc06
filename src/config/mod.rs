//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize, METRICS_PROVIDER override)
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated, immutable)
//!     → handed to startup, which builds every subsystem from it
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::ConfigError;
pub use schema::{
    ActivityConfig, AppConfig, DogStatsdConfig, LoggingConfig, LookupConfig, MetricsConfig,
    PrometheusConfig, RetryConfig, ServerConfig, WorkflowConfig,
};
