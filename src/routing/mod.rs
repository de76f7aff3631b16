//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! DescriptorRecord[]
//!     → table.rs (extract entries, compile templates)
//!     → store.rs (publish as the current RouteTable)
//!
//! Incoming Request (method, path)
//!     → store.rs (current table, waiting on a running reload)
//!     → router.rs (first matching entry)
//!     → Return: matched RouteEntry or None
//! ```
//!
//! # Design Decisions
//! - Tables are immutable; a reload builds and swaps a whole new one
//! - No regex in hot path (segment matching only)
//! - Deterministic: same table and request always give the same entry
//! - First match wins (declaration order)

pub mod pattern;
pub mod router;
pub mod store;
pub mod table;

pub use pattern::PathTemplate;
pub use store::{LoadHandle, RouteStore};
pub use table::{RouteEntry, RouteTable, SUPPORTED_METHODS};
