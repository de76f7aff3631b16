//! Live route table with reload coordination.
//!
//! # Responsibilities
//! - Hold the current `RouteTable` behind an atomically swappable pointer
//! - Run at most one rebuild at a time
//! - Let requests that arrive mid-rebuild wait for that rebuild's result
//!
//! # Design Decisions
//! - Readers never lock: `ArcSwap::load_full` hands out the current snapshot
//! - The in-flight rebuild is a `Shared` future; every waiter polls the same one
//! - A reload requested while one is running returns the running handle
//! - The rebuild is spawned, so it completes whether or not anyone awaits it
//! - The new table is published before the in-flight slot is cleared, so a
//!   reader that finds no rebuild running always sees the newest table

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use arc_swap::ArcSwap;
use futures_util::future::{BoxFuture, FutureExt, Shared};

use crate::descriptor::DescriptorSource;
use crate::observability::metrics;
use crate::routing::table::RouteTable;

/// Awaitable result of a route reload. Clones share one rebuild.
pub type LoadHandle = Shared<BoxFuture<'static, Arc<RouteTable>>>;

/// The proxy's current routes.
pub struct RouteStore {
    current: ArcSwap<RouteTable>,
    in_flight: Mutex<Option<LoadHandle>>,
    source: Arc<dyn DescriptorSource>,
    generation: AtomicU64,
}

impl RouteStore {
    /// Create a store with an empty table. Nothing is loaded until
    /// [`RouteStore::load_routes`] is called.
    pub fn new(source: Arc<dyn DescriptorSource>) -> Arc<Self> {
        Arc::new(Self {
            current: ArcSwap::from_pointee(RouteTable::empty()),
            in_flight: Mutex::new(None),
            source,
            generation: AtomicU64::new(0),
        })
    }

    /// The published table, without waiting for a running rebuild.
    pub fn snapshot(&self) -> Arc<RouteTable> {
        self.current.load_full()
    }

    pub fn is_loading(&self) -> bool {
        self.lock_in_flight().is_some()
    }

    /// The table a request should use: the result of the running rebuild if
    /// there is one, otherwise the published table.
    pub async fn current(&self) -> Arc<RouteTable> {
        let pending = self.lock_in_flight().clone();
        match pending {
            Some(handle) => handle.await,
            None => self.current.load_full(),
        }
    }

    /// Start a rebuild, or join the one already running.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn load_routes(self: &Arc<Self>) -> LoadHandle {
        let handle = {
            let mut in_flight = self.lock_in_flight();
            if let Some(handle) = in_flight.as_ref() {
                tracing::debug!("Route reload already in progress");
                return handle.clone();
            }
            let handle = Arc::clone(self).rebuild().boxed().shared();
            *in_flight = Some(handle.clone());
            handle
        };

        tracing::info!("Loading routes");
        tokio::spawn(handle.clone());
        handle
    }

    async fn rebuild(self: Arc<Self>) -> Arc<RouteTable> {
        let source = Arc::clone(&self.source);
        let records = tokio::task::spawn_blocking(move || source.records()).await;

        let table = match records {
            Ok(Ok(records)) => {
                let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
                let table = Arc::new(RouteTable::build(&records).with_generation(generation));
                self.current.store(Arc::clone(&table));
                metrics::record_reload(&table);
                tracing::info!(
                    generation,
                    descriptors = records.len(),
                    routes = table.len(),
                    "Completed loading routes"
                );
                table
            }
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Failed to read descriptors, keeping current routes");
                self.current.load_full()
            }
            Err(e) => {
                tracing::error!(error = %e, "Descriptor loading task failed, keeping current routes");
                self.current.load_full()
            }
        };

        self.lock_in_flight().take();
        table
    }

    fn lock_in_flight(&self) -> MutexGuard<'_, Option<LoadHandle>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{DescriptorError, DescriptorRecord, StaticDescriptorSource};
    use axum::http::Method;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    /// Counts calls and sleeps so overlapping reloads can be observed.
    struct SlowSource {
        calls: AtomicUsize,
        delay: Duration,
        port: AtomicU64,
    }

    impl DescriptorSource for SlowSource {
        fn records(&self) -> Result<Vec<DescriptorRecord>, DescriptorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(self.delay);
            let yaml = format!(
                "custom:\n  localDevPort: {}\n  debug: true\nfunctions:\n  a:\n    events:\n      - http: GET things/{{id}}\n",
                self.port.load(Ordering::SeqCst)
            );
            Ok(vec![DescriptorRecord::from_yaml("slow", &yaml)?])
        }
    }

    struct BrokenSource;

    impl DescriptorSource for BrokenSource {
        fn records(&self) -> Result<Vec<DescriptorRecord>, DescriptorError> {
            Err(DescriptorError::MissingRoot("/nowhere".into()))
        }
    }

    fn slow_source(port: u64) -> Arc<SlowSource> {
        Arc::new(SlowSource {
            calls: AtomicUsize::new(0),
            delay: Duration::from_millis(200),
            port: AtomicU64::new(port),
        })
    }

    #[tokio::test]
    async fn starts_empty() {
        let store = RouteStore::new(Arc::new(StaticDescriptorSource::default()));
        assert!(store.snapshot().is_empty());
        assert_eq!(store.snapshot().generation(), 0);
        assert!(!store.is_loading());
    }

    #[tokio::test]
    async fn reload_while_loading_joins_the_running_build() {
        let source = slow_source(6001);
        let store = RouteStore::new(source.clone());

        let first = store.load_routes();
        let second = store.load_routes();
        assert!(store.is_loading());

        let (a, b) = tokio::join!(first, second);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(a.generation(), 1);
        assert!(!store.is_loading());
    }

    #[tokio::test]
    async fn readers_wait_for_the_running_build() {
        let store = RouteStore::new(slow_source(6001));

        let _handle = store.load_routes();
        assert!(store.snapshot().is_empty());

        let table = store.current().await;
        assert_eq!(table.routes(&Method::GET)[0].port, 6001);
        assert!(Arc::ptr_eq(&table, &store.snapshot()));
    }

    #[tokio::test]
    async fn later_reload_replaces_the_table() {
        let source = slow_source(6001);
        let store = RouteStore::new(source.clone());
        let before = store.load_routes().await;

        source.port.store(7001, Ordering::SeqCst);
        let after = store.load_routes().await;

        assert_eq!(before.routes(&Method::GET)[0].port, 6001);
        assert_eq!(after.routes(&Method::GET)[0].port, 7001);
        assert_eq!(after.generation(), 2);
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_source_keeps_previous_table() {
        let store = RouteStore::new(Arc::new(BrokenSource));
        let table = store.load_routes().await;
        assert!(table.is_empty());
        assert_eq!(table.generation(), 0);
        assert!(!store.is_loading());
    }
}
