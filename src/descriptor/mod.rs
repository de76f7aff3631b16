//! Service descriptor subsystem.
//!
//! # Data Flow
//! ```text
//! service tree (**/serverless.yml, minus node_modules)
//!     → source.rs (walk, read, parse)
//!     → record.rs (unwrap payload, typed options)
//!     → DescriptorRecord[] handed to the route table builder
//!
//! On file change:
//!     watcher.rs (notify event, debounce)
//!     → reload callback
//! ```

pub mod record;
pub mod source;
pub mod watcher;

use std::path::PathBuf;

use thiserror::Error;

pub use record::{DescriptorRecord, ServiceDescriptor};
pub use source::{DescriptorSource, FileDescriptorSource, StaticDescriptorSource};
pub use watcher::{DescriptorWatcher, WatchHandle, WatcherError};

/// Error type for descriptor discovery and parsing.
#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("service path {0} is not a directory")]
    MissingRoot(PathBuf),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {origin}: {source}")]
    Parse {
        origin: String,
        #[source]
        source: serde_yaml::Error,
    },
}
