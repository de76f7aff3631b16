//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate the fallback target URL and listener address
//! - Validate descriptor discovery settings
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::IpAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::ProxyConfig;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("upstream.target is required")]
    MissingTarget,

    #[error("upstream.target `{0}` is not a valid URL")]
    InvalidTarget(String),

    #[error("upstream.target must use http or https, got `{0}`")]
    UnsupportedScheme(String),

    #[error("listener.host `{0}` is not an IP address")]
    InvalidHost(String),

    #[error("descriptors.file_names must not be empty")]
    NoDescriptorFiles,

    #[error("descriptors.debounce_ms must be greater than zero")]
    ZeroDebounce,
}

/// Check a configuration, collecting every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let target = config.upstream.target.trim();
    if target.is_empty() {
        errors.push(ValidationError::MissingTarget);
    } else {
        match Url::parse(target) {
            Ok(url) if url.scheme() != "http" && url.scheme() != "https" => {
                errors.push(ValidationError::UnsupportedScheme(url.scheme().to_string()));
            }
            Ok(_) => {}
            Err(_) => errors.push(ValidationError::InvalidTarget(target.to_string())),
        }
    }

    if config.listener.host.parse::<IpAddr>().is_err() {
        errors.push(ValidationError::InvalidHost(config.listener.host.clone()));
    }

    if config.descriptors.file_names.is_empty() {
        errors.push(ValidationError::NoDescriptorFiles);
    }

    if config.descriptors.watch && config.descriptors.debounce_ms == 0 {
        errors.push(ValidationError::ZeroDebounce);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
