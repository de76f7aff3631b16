//! Upstream target selection.
//!
//! # Responsibilities
//! - Decide between the debug backend and the fallback upstream
//! - Resolve the fallback: live custom domain first, then the static target
//! - Build the upstream URL for a request path and query
//!
//! # Design Decisions
//! - Only a matched entry with `debug` set goes to `localhost:{port}`
//! - The custom domain is looked up per request, never cached
//! - An unparseable custom domain is logged and the static target used

use std::sync::Arc;

use url::Url;

use crate::routing::RouteEntry;
use crate::service::ServiceConfig;

/// Where one request is forwarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Local debug backend on `localhost:{port}`.
    Debug { port: u16, path_prefix: String },
    /// The fallback upstream.
    Fallback(Url),
}

impl Target {
    /// Upstream URL for the incoming `path` and `query`.
    ///
    /// Debug targets get `/{prefix}{path}`; fallback targets get the path
    /// appended to any base path of the target URL.
    pub fn upstream_url(&self, path: &str, query: Option<&str>) -> Result<Url, url::ParseError> {
        let (mut url, full_path) = match self {
            Target::Debug { port, path_prefix } => {
                let url = Url::parse(&format!("http://localhost:{port}"))?;
                let path = path.strip_prefix('/').unwrap_or(path);
                let prefix = path_prefix.strip_prefix('/').unwrap_or(path_prefix);
                (url, format!("/{prefix}{path}"))
            }
            Target::Fallback(base) => {
                let base_path = base.path().trim_end_matches('/');
                let path = if path.starts_with('/') {
                    path.to_string()
                } else {
                    format!("/{path}")
                };
                (base.clone(), format!("{base_path}{path}"))
            }
        };
        url.set_path(&full_path);
        url.set_query(query);
        Ok(url)
    }

    /// Debug backends see the client's `Host`; fallback upstreams get their
    /// own authority.
    pub fn preserves_host(&self) -> bool {
        matches!(self, Target::Debug { .. })
    }

    /// Metric/log label.
    pub fn kind(&self) -> &'static str {
        match self {
            Target::Debug { .. } => "debug",
            Target::Fallback(_) => "fallback",
        }
    }
}

/// The upstream used when no debug route applies.
#[derive(Clone)]
pub struct FallbackTarget {
    static_target: Url,
    service: Arc<dyn ServiceConfig>,
}

impl FallbackTarget {
    pub fn new(static_target: Url, service: Arc<dyn ServiceConfig>) -> Self {
        Self {
            static_target,
            service,
        }
    }

    /// `https://{custom domain}` when the service has one, else the static
    /// target.
    pub fn resolve(&self) -> Url {
        if let Some(domain) = self.service.custom_domain_name() {
            match Url::parse(&format!("https://{domain}")) {
                Ok(url) => return url,
                Err(e) => tracing::warn!(
                    domain = %domain,
                    error = %e,
                    "Ignoring invalid custom domain"
                ),
            }
        }
        self.static_target.clone()
    }

    /// Pick the target for a (possibly absent) matched route.
    pub fn select(&self, route: Option<&RouteEntry>) -> Target {
        match route {
            Some(route) if route.debug => Target::Debug {
                port: route.port,
                path_prefix: route.path_prefix.clone(),
            },
            _ => Target::Fallback(self.resolve()),
        }
    }
}

impl std::fmt::Debug for FallbackTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackTarget")
            .field("static_target", &self.static_target.as_str())
            .finish_non_exhaustive()
    }
}
