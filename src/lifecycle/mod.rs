//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config (validated by caller) → metric sink → lookup client
//!         → workflow registry → HTTP listener → serve
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs, startup.rs):
//!     Cancel root token → in-flight workflows end → HTTP server drains
//!         → flush sink → close sink
//! ```

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{build, build_with, Application, StartupError};
