//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the development proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind host, port).
    pub listener: ListenerConfig,

    /// Fallback upstream used when no debug route matches.
    pub upstream: UpstreamConfig,

    /// Where service descriptors live and how they are watched.
    pub descriptors: DescriptorConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind host (e.g., "127.0.0.1").
    pub host: String,

    /// Listen port. `0` binds an ephemeral port.
    pub port: u16,
}

impl ListenerConfig {
    /// The `host:port` string handed to the TCP listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
        }
    }
}

/// Static fallback upstream and client timeouts.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Static fallback target URL (e.g., "https://api.example.com").
    pub target: String,

    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Longest pause between reads from an upstream, in seconds. Not a cap
    /// on the whole exchange, so slow streamed bodies keep flowing.
    pub read_timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            target: String::new(),
            connect_timeout_secs: 5,
            read_timeout_secs: 30,
        }
    }
}

/// Service descriptor discovery and live reload.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DescriptorConfig {
    /// Root directory of the service workspace.
    pub service_path: String,

    /// File names recognized as service descriptors.
    pub file_names: Vec<String>,

    /// Directory names never descended into.
    pub ignore_dirs: Vec<String>,

    /// Reload routes when a descriptor changes.
    pub watch: bool,

    /// Quiet period before a burst of file events triggers a reload.
    pub debounce_ms: u64,
}

impl Default for DescriptorConfig {
    fn default() -> Self {
        Self {
            service_path: ".".to_string(),
            file_names: vec!["serverless.yml".to_string()],
            ignore_dirs: vec!["node_modules".to_string()],
            watch: true,
            debounce_ms: 300,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Human-readable or JSON log lines.
    pub log_format: LogFormat,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_options() {
        let config = ProxyConfig::default();
        assert_eq!(config.listener.port, 5000);
        assert!(config.descriptors.watch);
        assert_eq!(config.descriptors.file_names, vec!["serverless.yml"]);
        assert_eq!(config.listener.bind_address(), "127.0.0.1:5000");
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: ProxyConfig = toml::from_str(
            r#"
            [upstream]
            target = "https://api.example.com"

            [descriptors]
            watch = false
            "#,
        )
        .unwrap();

        assert_eq!(config.upstream.target, "https://api.example.com");
        assert_eq!(config.upstream.connect_timeout_secs, 5);
        assert!(!config.descriptors.watch);
        assert_eq!(config.descriptors.debounce_ms, 300);
        assert_eq!(config.observability.log_format, LogFormat::Pretty);
    }
}
