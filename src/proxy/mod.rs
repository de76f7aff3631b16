//! Proxy dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! matched RouteEntry (or none)
//!     → target.rs (debug backend vs. fallback, custom domain lookup)
//!     → dispatcher.rs (forward with reqwest, relay response)
//!     → error.rs (failed forward → 504/500 JSON envelope)
//! ```

pub mod dispatcher;
pub mod error;
pub mod target;

pub use dispatcher::{DispatchError, ProxyDispatcher};
pub use error::{ForwardError, ForwardErrorCode};
pub use target::{FallbackTarget, Target};
