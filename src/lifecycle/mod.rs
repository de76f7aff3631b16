//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Watch descriptors → Load routes → Bind and serve
//!
//! Shutdown (shutdown.rs):
//!     Trigger → Stop accepting → Drain connections → Listener released
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Graceful shutdown
//!     SIGHUP → Route reload
//! ```

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use signals::{shutdown_signal, spawn_reload_on_hangup};
pub use startup::{DevProxy, ServerError};
