//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML) + CLI overrides
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → handed to DevProxy at construction
//! ```
//!
//! # Design Decisions
//! - Proxy options are fixed for the process lifetime; only routes reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    DescriptorConfig, ListenerConfig, LogFormat, ObservabilityConfig, ProxyConfig,
    UpstreamConfig,
};
