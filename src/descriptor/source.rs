//! Descriptor discovery.
//!
//! # Responsibilities
//! - Enumerate descriptor files under the service directory
//! - Parse each into a `DescriptorRecord`
//! - Skip (and log) files that fail to read or parse
//!
//! # Design Decisions
//! - Discovery order is the sorted directory walk, so route order is stable
//! - Ignored directories are pruned, never descended into
//! - Sources are synchronous; the route store runs them on a blocking thread

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

use crate::config::DescriptorConfig;
use crate::descriptor::{DescriptorError, DescriptorRecord};

/// Yields the current set of service descriptors.
pub trait DescriptorSource: Send + Sync + 'static {
    /// Produce every well-formed record, in discovery order.
    ///
    /// An `Err` means the source as a whole is unavailable; malformed
    /// individual records are skipped instead.
    fn records(&self) -> Result<Vec<DescriptorRecord>, DescriptorError>;
}

/// Reads descriptor files from a service directory tree.
#[derive(Debug, Clone)]
pub struct FileDescriptorSource {
    root: PathBuf,
    file_names: Vec<String>,
    ignore_dirs: Vec<String>,
}

impl FileDescriptorSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let defaults = DescriptorConfig::default();
        Self {
            root: root.into(),
            file_names: defaults.file_names,
            ignore_dirs: defaults.ignore_dirs,
        }
    }

    pub fn from_config(config: &DescriptorConfig) -> Self {
        Self {
            root: PathBuf::from(&config.service_path),
            file_names: config.file_names.clone(),
            ignore_dirs: config.ignore_dirs.clone(),
        }
    }

    /// Descriptor of the service at the root of the tree, if one exists.
    pub fn root_descriptor_path(&self) -> Option<PathBuf> {
        self.file_names
            .iter()
            .map(|name| self.root.join(name))
            .find(|path| path.is_file())
    }

    fn is_ignored(&self, entry: &DirEntry) -> bool {
        entry.depth() > 0
            && entry.file_type().is_dir()
            && entry
                .file_name()
                .to_str()
                .is_some_and(|name| self.ignore_dirs.iter().any(|dir| dir == name))
    }

    fn is_descriptor(&self, entry: &DirEntry) -> bool {
        entry.file_type().is_file()
            && entry
                .file_name()
                .to_str()
                .is_some_and(|name| self.file_names.iter().any(|file| file == name))
    }
}

/// Read and parse a single descriptor file.
pub fn read_descriptor(path: &Path) -> Result<DescriptorRecord, DescriptorError> {
    let text = fs::read_to_string(path).map_err(|source| DescriptorError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    DescriptorRecord::from_yaml(path.display().to_string(), &text)
}

impl DescriptorSource for FileDescriptorSource {
    fn records(&self) -> Result<Vec<DescriptorRecord>, DescriptorError> {
        if !self.root.is_dir() {
            return Err(DescriptorError::MissingRoot(self.root.clone()));
        }

        let mut records = Vec::new();
        let walker = WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !self.is_ignored(entry));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping unreadable path");
                    continue;
                }
            };
            if !self.is_descriptor(&entry) {
                continue;
            }
            match read_descriptor(entry.path()) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!(error = %e, "Skipping descriptor"),
            }
        }

        tracing::debug!(
            root = %self.root.display(),
            count = records.len(),
            "Descriptors discovered"
        );
        Ok(records)
    }
}

/// A fixed, in-memory set of records.
#[derive(Debug, Clone, Default)]
pub struct StaticDescriptorSource {
    records: Vec<DescriptorRecord>,
}

impl StaticDescriptorSource {
    pub fn new(records: Vec<DescriptorRecord>) -> Self {
        Self { records }
    }
}

impl DescriptorSource for StaticDescriptorSource {
    fn records(&self) -> Result<Vec<DescriptorRecord>, DescriptorError> {
        Ok(self.records.clone())
    }
}
