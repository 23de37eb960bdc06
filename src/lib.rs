//! iplocate: IP geolocation workflow with retried, instrumented activities.

pub mod activity;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod lookup;
pub mod observability;
pub mod resilience;
pub mod workflow;

pub use config::schema::AppConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
