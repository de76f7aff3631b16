//! Route table construction.
//!
//! # Responsibilities
//! - Extract route entries from descriptor records
//! - Keep entries per method in discovery order
//! - Compile each entry's path template once per table generation
//!
//! # Design Decisions
//! - A table is built completely before anyone can see it
//! - First registration of a `(method, path)` wins; later ones are skipped
//! - Every supported method has a (possibly empty) entry list

use std::collections::HashMap;

use axum::http::Method;

use crate::descriptor::DescriptorRecord;
use crate::routing::pattern::PathTemplate;

/// Methods the router keeps entry lists for.
pub const SUPPORTED_METHODS: [Method; 7] = [
    Method::GET,
    Method::HEAD,
    Method::POST,
    Method::PUT,
    Method::DELETE,
    Method::CONNECT,
    Method::OPTIONS,
];

/// One routable endpoint declared by a service descriptor.
#[derive(Debug, Clone)]
pub struct RouteEntry {
    pub method: Method,
    pub path_pattern: String,
    /// Prepended to the forwarded path when dispatching to the debug backend.
    pub path_prefix: String,
    /// Local backend port.
    pub port: u16,
    /// Dispatch to `localhost:{port}` instead of the fallback target.
    pub debug: bool,
    template: PathTemplate,
}

impl RouteEntry {
    pub fn new(method: Method, path_prefix: &str, path: &str, port: u16, debug: bool) -> Self {
        Self {
            method,
            path_pattern: path.to_string(),
            path_prefix: path_prefix.to_string(),
            port,
            debug,
            template: PathTemplate::compile(path),
        }
    }

    pub fn template(&self) -> &PathTemplate {
        &self.template
    }
}

/// Immutable snapshot of every route, grouped by method.
#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: HashMap<Method, Vec<RouteEntry>>,
    generation: u64,
}

impl RouteTable {
    /// A table with no routes, generation 0.
    pub fn empty() -> Self {
        let routes = SUPPORTED_METHODS
            .iter()
            .map(|method| (method.clone(), Vec::new()))
            .collect();
        Self {
            routes,
            generation: 0,
        }
    }

    /// Build a table from descriptor records.
    pub fn build(records: &[DescriptorRecord]) -> Self {
        let mut table = Self::empty();

        for record in records {
            let descriptor = &record.descriptor;
            let Some(port) = descriptor.local_dev_port() else {
                tracing::trace!(origin = %record.origin, "No localDevPort, skipping descriptor");
                continue;
            };
            let path_prefix = descriptor.path_prefix();
            let debug = descriptor.debug();

            for (method, path) in descriptor.http_events() {
                let Ok(method) = Method::from_bytes(method.as_bytes()) else {
                    tracing::warn!(origin = %record.origin, method = %method, "Invalid HTTP method, skipping route");
                    continue;
                };
                if !table.routes.contains_key(&method) {
                    tracing::warn!(
                        origin = %record.origin,
                        method = %method,
                        path = %path,
                        "Unsupported HTTP method, skipping route"
                    );
                    continue;
                }
                table.add_route(method, &path_prefix, path, port, debug);
            }
        }

        table
    }

    /// Register a route. Returns `false` (and changes nothing) when the
    /// method already has an entry for `path`, or the method is unsupported.
    pub fn add_route(
        &mut self,
        method: Method,
        path_prefix: &str,
        path: &str,
        port: u16,
        debug: bool,
    ) -> bool {
        let Some(routes) = self.routes.get_mut(&method) else {
            return false;
        };
        if routes.iter().any(|route| route.path_pattern == path) {
            tracing::debug!(method = %method, path = %path, "Route already registered");
            return false;
        }
        routes.push(RouteEntry::new(method, path_prefix, path, port, debug));
        true
    }

    /// Entries for `method` in table order; empty for unknown methods.
    pub fn routes(&self, method: &Method) -> &[RouteEntry] {
        self.routes.get(method).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.routes.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reload counter; 0 for the startup table.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn with_generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::empty()
    }
}
