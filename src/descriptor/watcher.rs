//! Descriptor file watcher for live route reload.
//!
//! Every directory of the service tree is watched on its own, so ignored
//! directories such as `node_modules` never cost a watch. Directories that
//! appear later are added as their events arrive.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{RecursiveMode, Watcher};
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, DebouncedEvent};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use walkdir::WalkDir;

use crate::config::DescriptorConfig;

#[derive(Debug, Error)]
pub enum WatcherError {
    #[error("Failed to initialize file watcher: {0}")]
    Init(#[source] notify::Error),

    #[error("Failed to watch path {path}: {source}")]
    Watch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
}

/// Watches a service tree and fires a callback after descriptor changes
/// settle.
pub struct DescriptorWatcher {
    debounce: Duration,
    tree: WatchedTree,
}

impl DescriptorWatcher {
    pub fn new(config: &DescriptorConfig) -> Self {
        Self {
            debounce: Duration::from_millis(config.debounce_ms),
            tree: WatchedTree {
                root: PathBuf::from(&config.service_path),
                file_names: config.file_names.clone(),
                ignore_dirs: config.ignore_dirs.clone(),
                dirs: HashSet::new(),
            },
        }
    }

    /// Start watching. Must be called from within a Tokio runtime.
    ///
    /// `on_change` runs once per settled batch of relevant events. Dropping
    /// the returned handle stops the watcher.
    pub fn run<F>(self, on_change: F) -> Result<WatchHandle, WatcherError>
    where
        F: Fn() + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<DebounceEventResult>();
        let mut debouncer = new_debouncer(self.debounce, move |result: DebounceEventResult| {
            let _ = tx.send(result);
        })
        .map_err(WatcherError::Init)?;

        let mut tree = self.tree;
        let root = tree.root.clone();
        tree.watch_subtree(debouncer.watcher(), &root)?;
        tracing::info!(
            root = %root.display(),
            directories = tree.dirs.len(),
            "Descriptor watcher started"
        );

        let task = tokio::spawn(async move {
            while let Some(result) = rx.recv().await {
                match result {
                    Ok(events) => {
                        if tree.apply(debouncer.watcher(), &events) {
                            tracing::info!("Descriptor change detected, reloading routes");
                            on_change();
                        }
                    }
                    Err(e) => tracing::error!(error = ?e, "Watch error"),
                }
            }
        });

        Ok(WatchHandle { task })
    }
}

/// The set of watched directories and the rules for what counts as a
/// descriptor change.
struct WatchedTree {
    root: PathBuf,
    file_names: Vec<String>,
    ignore_dirs: Vec<String>,
    dirs: HashSet<PathBuf>,
}

impl WatchedTree {
    /// Watch `dir` and every non-ignored directory below it. Returns whether
    /// the subtree holds a descriptor.
    fn watch_subtree<W: Watcher + ?Sized>(
        &mut self,
        watcher: &mut W,
        dir: &Path,
    ) -> Result<bool, WatcherError> {
        let mut found = false;
        let ignore_dirs = self.ignore_dirs.clone();
        let walker = WalkDir::new(dir).into_iter().filter_entry(move |entry| {
            entry.depth() == 0
                || !entry.file_type().is_dir()
                || !entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| ignore_dirs.iter().any(|ignored| ignored == name))
        });

        for entry in walker.filter_map(Result::ok) {
            let path = entry.path();
            if entry.file_type().is_dir() {
                if self.dirs.contains(path) {
                    continue;
                }
                watcher
                    .watch(path, RecursiveMode::NonRecursive)
                    .map_err(|source| WatcherError::Watch {
                        path: path.to_path_buf(),
                        source,
                    })?;
                self.dirs.insert(path.to_path_buf());
            } else if self.is_descriptor(path) {
                found = true;
            }
        }
        Ok(found)
    }

    /// Track directory changes in `events`; true when routes need reloading.
    fn apply<W: Watcher + ?Sized>(&mut self, watcher: &mut W, events: &[DebouncedEvent]) -> bool {
        let mut changed = false;
        for event in events {
            let path = &event.path;
            if self.is_ignored(path) {
                continue;
            }
            if self.is_descriptor(path) {
                changed = true;
            } else if path.is_dir() {
                if !self.dirs.contains(path) {
                    match self.watch_subtree(watcher, path) {
                        Ok(found) => changed |= found,
                        Err(e) => tracing::warn!(error = %e, "Failed to watch new directory"),
                    }
                }
            } else if self.dirs.remove(path) {
                self.dirs.retain(|dir| !dir.starts_with(path));
                changed = true;
            }
        }
        changed
    }

    fn is_descriptor(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| self.file_names.iter().any(|file| file == name))
    }

    fn is_ignored(&self, path: &Path) -> bool {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        relative
            .components()
            .any(|component| self.is_ignored_name(component.as_os_str().to_str()))
    }

    fn is_ignored_name(&self, name: Option<&str>) -> bool {
        name.is_some_and(|name| self.ignore_dirs.iter().any(|dir| dir == name))
    }
}

/// A running watcher. Dropping it stops event delivery.
pub struct WatchHandle {
    task: JoinHandle<()>,
}

impl WatchHandle {
    /// Stop watching.
    pub fn close(self) {
        drop(self);
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
