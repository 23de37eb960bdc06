//! HTTP front-end subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing, timeout)
//!     → handlers.rs (/submit form, /api JSON) → WorkflowClient
//!     → response.rs (HTML fragment or JSON body)
//!
//! Any other path → static files from server.static_dir
//! ```

pub mod handlers;
pub mod response;
pub mod server;

pub use server::{AppState, HttpServer};

/// Header carrying the per-request correlation id.
pub const X_REQUEST_ID: &str = "x-request-id";
