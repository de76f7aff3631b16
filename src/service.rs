//! Live service configuration.
//!
//! The fallback target depends on whether the service currently declares a
//! custom domain. That value is read on every fallback decision, so changing
//! it takes effect on the next request without a route reload.

use std::path::Path;
use std::sync::Arc;

use arc_swap::ArcSwapOption;

use crate::descriptor::source::read_descriptor;
use crate::descriptor::{DescriptorError, ServiceDescriptor};

/// Read access to the parts of the service configuration the proxy consults
/// per request.
pub trait ServiceConfig: Send + Sync {
    /// `custom.customDomain.domainName`, if set.
    fn custom_domain_name(&self) -> Option<String>;
}

/// A `ServiceConfig` that can be updated while requests are in flight.
#[derive(Debug, Default)]
pub struct LiveServiceConfig {
    custom_domain_name: ArcSwapOption<String>,
}

impl LiveServiceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_custom_domain_name(&self, name: Option<String>) {
        let name = name.filter(|n| !n.is_empty());
        tracing::debug!(custom_domain = ?name, "Service custom domain updated");
        self.custom_domain_name.store(name.map(Arc::new));
    }

    /// Take the service-level settings from a descriptor.
    pub fn apply(&self, descriptor: &ServiceDescriptor) {
        self.set_custom_domain_name(descriptor.custom_domain_name().map(str::to_string));
    }

    /// Re-read the service-level settings from a descriptor file.
    pub fn refresh_from_file(&self, path: &Path) -> Result<(), DescriptorError> {
        let record = read_descriptor(path)?;
        self.apply(&record.descriptor);
        Ok(())
    }
}

impl ServiceConfig for LiveServiceConfig {
    fn custom_domain_name(&self) -> Option<String> {
        self.custom_domain_name
            .load()
            .as_ref()
            .map(|name| name.as_str().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_can_change_at_runtime() {
        let config = LiveServiceConfig::new();
        assert_eq!(config.custom_domain_name(), None);

        config.set_custom_domain_name(Some("api.example.com".to_string()));
        assert_eq!(config.custom_domain_name().as_deref(), Some("api.example.com"));

        config.set_custom_domain_name(Some(String::new()));
        assert_eq!(config.custom_domain_name(), None);
    }

    #[test]
    fn refreshes_from_descriptor_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("serverless.yml");
        std::fs::write(&path, "custom:\n  customDomain:\n    domainName: dev.example.com\n")
            .unwrap();

        let config = LiveServiceConfig::new();
        config.refresh_from_file(&path).unwrap();
        assert_eq!(config.custom_domain_name().as_deref(), Some("dev.example.com"));

        std::fs::write(&path, "service: plain\n").unwrap();
        config.refresh_from_file(&path).unwrap();
        assert_eq!(config.custom_domain_name(), None);
    }
}
