//! Service descriptor schema.
//!
//! A descriptor is one `serverless.yml`-style document. Only the handful of
//! options the proxy understands are typed here; everything else is ignored.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer};
use serde_yaml::Value;

use crate::descriptor::DescriptorError;

/// Plugin that serves `http` functions locally under the `http/` prefix.
pub const LOCAL_DEV_SERVER_PLUGIN: &str = "@kalarrs/serverless-local-dev-server";

/// Prefix used when the local dev server plugin is enabled and no explicit
/// prefix is configured.
pub const LOCAL_DEV_SERVER_PREFIX: &str = "http/";

/// One discovered descriptor together with where it came from.
#[derive(Debug, Clone)]
pub struct DescriptorRecord {
    /// Origin label, usually the file path.
    pub origin: String,
    pub descriptor: ServiceDescriptor,
}

impl DescriptorRecord {
    /// Build a record from a raw YAML document.
    ///
    /// Documents nested as `{src: {serverless: ...}}` or `{serverless: ...}`
    /// are unwrapped before deserializing.
    pub fn from_value(origin: impl Into<String>, value: Value) -> Result<Self, DescriptorError> {
        let origin = origin.into();
        let payload = unwrap_payload(value);
        let descriptor = serde_yaml::from_value(payload).map_err(|source| {
            DescriptorError::Parse {
                origin: origin.clone(),
                source,
            }
        })?;
        Ok(Self { origin, descriptor })
    }

    /// Parse a YAML document from text.
    pub fn from_yaml(origin: impl Into<String>, text: &str) -> Result<Self, DescriptorError> {
        let origin = origin.into();
        let value: Value = serde_yaml::from_str(text).map_err(|source| DescriptorError::Parse {
            origin: origin.clone(),
            source,
        })?;
        Self::from_value(origin, value)
    }
}

fn unwrap_payload(value: Value) -> Value {
    let nested = value
        .get("src")
        .and_then(|src| src.get("serverless"))
        .or_else(|| value.get("serverless"))
        .cloned();
    nested.unwrap_or(value)
}

/// The subset of a service descriptor the proxy reads.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServiceDescriptor {
    pub custom: CustomSection,
    pub plugins: Option<Plugins>,
    pub functions: IndexMap<String, FunctionDecl>,
}

/// `custom:` options recognized by the proxy.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CustomSection {
    /// Port of the local backend. Presence enables route extraction.
    #[serde(deserialize_with = "port_number_or_text")]
    pub local_dev_port: Option<u16>,
    pub local_dev_path_prefix: Option<String>,
    pub debug: Option<bool>,
    pub custom_domain: Option<CustomDomain>,
}

/// Ports are written both as `6001` and as `'6001'`.
fn port_number_or_text<'de, D>(deserializer: D) -> Result<Option<u16>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Number(u16),
        Text(String),
    }

    match Option::<Port>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Port::Number(port)) => Ok(Some(port)),
        Some(Port::Text(text)) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("invalid localDevPort `{text}`"))),
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CustomDomain {
    pub domain_name: Option<String>,
}

/// `plugins:` is either a list of module names or the expanded
/// `{modules: [...], localPath: ...}` form, which never enables the prefix.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Plugins {
    List(Vec<String>),
    Other(Value),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FunctionDecl {
    pub events: Vec<EventDecl>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EventDecl {
    pub http: Option<HttpEvent>,
}

/// An `http` trigger, either `{method, path}` or the `"GET users/{id}"`
/// shorthand.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum HttpEvent {
    Detailed {
        method: Option<String>,
        path: Option<String>,
    },
    Shorthand(String),
}

impl HttpEvent {
    /// Method (uppercased) and path, when both are present.
    pub fn method_and_path(&self) -> Option<(String, &str)> {
        let (method, path) = match self {
            HttpEvent::Detailed {
                method: Some(method),
                path: Some(path),
            } => (method.as_str(), path.as_str()),
            HttpEvent::Detailed { .. } => return None,
            HttpEvent::Shorthand(text) => text.trim().split_once(char::is_whitespace)?,
        };
        let path = path.trim();
        if method.is_empty() || path.is_empty() {
            return None;
        }
        Some((method.to_uppercase(), path))
    }
}

impl ServiceDescriptor {
    /// Local backend port; `None` (or `0`) means the descriptor contributes
    /// no routes.
    pub fn local_dev_port(&self) -> Option<u16> {
        self.custom.local_dev_port.filter(|port| *port != 0)
    }

    pub fn debug(&self) -> bool {
        self.custom.debug.unwrap_or(false)
    }

    pub fn has_plugin(&self, name: &str) -> bool {
        matches!(&self.plugins, Some(Plugins::List(list)) if list.iter().any(|p| p == name))
    }

    /// Prefix prepended to forwarded paths for this descriptor's routes.
    ///
    /// An explicit `localDevPathPrefix` loses one leading and one trailing
    /// `/` and gains a single trailing `/`, so `/` stays `/`.
    pub fn path_prefix(&self) -> String {
        if let Some(prefix) = self
            .custom
            .local_dev_path_prefix
            .as_deref()
            .filter(|p| !p.is_empty())
        {
            let trimmed = prefix.strip_prefix('/').unwrap_or(prefix);
            let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);
            return format!("{trimmed}/");
        }
        if self.has_plugin(LOCAL_DEV_SERVER_PLUGIN) {
            return LOCAL_DEV_SERVER_PREFIX.to_string();
        }
        String::new()
    }

    /// Every `(METHOD, path)` http trigger in declaration order.
    pub fn http_events(&self) -> impl Iterator<Item = (String, &str)> + '_ {
        self.functions
            .values()
            .flat_map(|function| function.events.iter())
            .filter_map(|event| event.http.as_ref())
            .filter_map(HttpEvent::method_and_path)
    }

    pub fn custom_domain_name(&self) -> Option<&str> {
        self.custom
            .custom_domain
            .as_ref()
            .and_then(|domain| domain.domain_name.as_deref())
            .filter(|name| !name.is_empty())
    }
}
