//! Local development reverse proxy for serverless services.
//!
//! Routes declared in `serverless.yml` descriptors with a `localDevPort`
//! are matched per request; debug routes go to `localhost:{port}`, the rest
//! to the fallback upstream.

pub mod config;
pub mod descriptor;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod proxy;
pub mod routing;
pub mod service;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::{DevProxy, ServerError, Shutdown};
