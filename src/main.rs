//! Local development reverse proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌──────────────────────────────────────────────┐
//!                         │                  DEV PROXY                   │
//!                         │                                              │
//!   serverless.yml ───────┼─▶ descriptor ──▶ routing::table ──▶ store    │
//!   (watched)             │   source/watcher                    │        │
//!                         │                                     ▼        │
//!   Client Request ───────┼─▶ http::server ──▶ match_route ──▶ proxy ────┼──▶ localhost:{port}
//!                         │                                   dispatcher │      (debug routes)
//!   Client Response ◀─────┼── relayed upstream response ◀──────┘         │
//!                         │                                              ├──▶ fallback target
//!                         │                                              │  (custom domain or
//!                         └──────────────────────────────────────────────┘   static URL)
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use dev_proxy::config::{load_config, validation::validate_config, ConfigError, ProxyConfig};
use dev_proxy::lifecycle::{shutdown_signal, spawn_reload_on_hangup, DevProxy};
use dev_proxy::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "dev-proxy")]
#[command(about = "Local reverse proxy for serverless services", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Fallback target URL for routes not being debugged
    #[arg(short, long)]
    target: Option<String>,

    /// Root directory of the service workspace
    #[arg(short, long)]
    service_path: Option<String>,

    /// Do not reload routes when descriptors change
    #[arg(long)]
    no_watch: bool,

    /// Log level (overridden by RUST_LOG)
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    fn apply(self, config: &mut ProxyConfig) {
        if let Some(port) = self.port {
            config.listener.port = port;
        }
        if let Some(target) = self.target {
            config.upstream.target = target;
        }
        if let Some(service_path) = self.service_path {
            config.descriptors.service_path = service_path;
        }
        if self.no_watch {
            config.descriptors.watch = false;
        }
        if let Some(level) = self.log_level {
            config.observability.log_level = level;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };
    cli.apply(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;

    logging::init_logging(&config.observability);
    tracing::info!("dev-proxy v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        port = config.listener.port,
        target = %config.upstream.target,
        service_path = %config.descriptors.service_path,
        watch = config.descriptors.watch,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let proxy = Arc::new(DevProxy::new(config)?);
    proxy.run().await?;
    let _hangup = spawn_reload_on_hangup(Arc::clone(&proxy));

    shutdown_signal().await;
    proxy.shutdown().await;

    tracing::info!("Shutdown complete");
    Ok(())
}
