//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the proxy's subsystems from a validated `ProxyConfig`
//! - Start the descriptor watcher (unless disabled)
//! - Kick off the first route load
//! - Bind the listener and serve; rebind on restart
//!
//! # Design Decisions
//! - Startup order: watch, load routes, start the server
//! - The server binds before the first load finishes; early requests wait on
//!   the in-flight load
//! - Restarting the server stops the previous one and waits for it to release
//!   its socket before binding again

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::config::ProxyConfig;
use crate::descriptor::{
    DescriptorSource, DescriptorWatcher, FileDescriptorSource, WatchHandle, WatcherError,
};
use crate::http::{AppState, HttpServer};
use crate::lifecycle::shutdown::Shutdown;
use crate::proxy::{DispatchError, ProxyDispatcher};
use crate::routing::{LoadHandle, RouteStore};
use crate::service::LiveServiceConfig;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Watch(#[from] WatcherError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

struct RunningServer {
    addr: SocketAddr,
    shutdown: Shutdown,
    task: JoinHandle<()>,
}

impl RunningServer {
    async fn stop(self) {
        self.shutdown.trigger();
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Proxy server task failed");
        }
        tracing::info!(address = %self.addr, "Proxy server stopped");
    }
}

/// The local development proxy: route store, dispatcher, watcher and server.
pub struct DevProxy {
    config: ProxyConfig,
    routes: Arc<RouteStore>,
    service: Arc<LiveServiceConfig>,
    descriptors: Option<Arc<FileDescriptorSource>>,
    dispatcher: Arc<ProxyDispatcher>,
    watcher: Mutex<Option<WatchHandle>>,
    server: tokio::sync::Mutex<Option<RunningServer>>,
}

impl DevProxy {
    /// A proxy reading descriptors from `config.descriptors.service_path`.
    pub fn new(config: ProxyConfig) -> Result<Self, ServerError> {
        let descriptors = Arc::new(FileDescriptorSource::from_config(&config.descriptors));
        let mut proxy = Self::with_source(config, descriptors.clone())?;
        proxy.descriptors = Some(descriptors);
        Ok(proxy)
    }

    /// A proxy reading descriptors from an arbitrary source. The service
    /// configuration is then only changed through [`DevProxy::service_config`].
    pub fn with_source(
        config: ProxyConfig,
        source: Arc<dyn DescriptorSource>,
    ) -> Result<Self, ServerError> {
        let service = Arc::new(LiveServiceConfig::new());
        let dispatcher = Arc::new(ProxyDispatcher::new(&config.upstream, service.clone())?);

        Ok(Self {
            routes: RouteStore::new(source),
            service,
            descriptors: None,
            dispatcher,
            watcher: Mutex::new(None),
            server: tokio::sync::Mutex::new(None),
            config,
        })
    }

    pub fn routes(&self) -> &Arc<RouteStore> {
        &self.routes
    }

    pub fn service_config(&self) -> &Arc<LiveServiceConfig> {
        &self.service
    }

    /// Watch, load routes, then start the server.
    pub async fn run(&self) -> Result<SocketAddr, ServerError> {
        self.watch()?;
        let _ = self.load_routes();
        self.start_proxy_server().await
    }

    /// Start watching descriptor files; each settled change triggers a
    /// reload. A no-op when watching is disabled. Replaces any running
    /// watcher.
    pub fn watch(&self) -> Result<(), ServerError> {
        if !self.config.descriptors.watch {
            tracing::debug!("Descriptor watching disabled");
            return Ok(());
        }

        let mut slot = self.watcher.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = slot.take() {
            previous.close();
        }

        let routes = Arc::clone(&self.routes);
        let service = Arc::clone(&self.service);
        let descriptors = self.descriptors.clone();
        let handle = DescriptorWatcher::new(&self.config.descriptors).run(move || {
            refresh_service(&service, descriptors.as_deref());
            let _ = routes.load_routes();
        })?;

        tracing::info!(
            service_path = %self.config.descriptors.service_path,
            "Watching service descriptors"
        );
        *slot = Some(handle);
        Ok(())
    }

    /// Rebuild the route table, or join the rebuild already running.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn load_routes(&self) -> LoadHandle {
        refresh_service(&self.service, self.descriptors.as_deref());
        self.routes.load_routes()
    }

    /// Bind the listener and start serving, stopping a previously started
    /// server first. Returns the bound address.
    pub async fn start_proxy_server(&self) -> Result<SocketAddr, ServerError> {
        let mut server = self.server.lock().await;
        if let Some(previous) = server.take() {
            previous.stop().await;
        }

        let address = self.config.listener.bind_address();
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|source| ServerError::Bind {
                address: address.clone(),
                source,
            })?;
        let addr = listener
            .local_addr()
            .map_err(|source| ServerError::Bind { address, source })?;

        let http = HttpServer::new(AppState {
            routes: Arc::clone(&self.routes),
            dispatcher: Arc::clone(&self.dispatcher),
        });
        let shutdown = Shutdown::new();
        let signal = shutdown.signalled();
        let task = tokio::spawn(async move {
            if let Err(e) = http.run(listener, signal).await {
                tracing::error!(error = %e, "Proxy server error");
            }
        });

        tracing::info!(
            address = %addr,
            target = %self.config.upstream.target,
            "Proxy server listening"
        );
        *server = Some(RunningServer {
            addr,
            shutdown,
            task,
        });
        Ok(addr)
    }

    /// Address of the running server, if any.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.server.lock().await.as_ref().map(|server| server.addr)
    }

    /// Stop watching and stop the server.
    pub async fn shutdown(&self) {
        if let Some(watcher) = self
            .watcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            watcher.close();
        }

        if let Some(server) = self.server.lock().await.take() {
            server.stop().await;
        }
    }
}

/// Re-read the custom domain from the root descriptor. A missing root
/// descriptor clears it.
fn refresh_service(service: &LiveServiceConfig, descriptors: Option<&FileDescriptorSource>) {
    let Some(descriptors) = descriptors else {
        return;
    };
    match descriptors.root_descriptor_path() {
        Some(path) => {
            if let Err(e) = service.refresh_from_file(&path) {
                tracing::warn!(error = %e, "Failed to refresh service configuration");
            }
        }
        None => service.set_custom_domain_name(None),
    }
}
