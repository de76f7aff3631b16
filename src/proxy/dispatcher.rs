//! Request forwarding.
//!
//! # Responsibilities
//! - Forward a request to the selected target with `reqwest`
//! - Relay upstream status, headers and body unchanged (body streamed)
//! - Turn a failed forward into the JSON error response
//!
//! # Design Decisions
//! - Redirects are relayed to the client, never followed
//! - Environment proxy settings are ignored; upstreams are contacted directly
//! - Certificates are validated normally for HTTPS upstreams
//! - Once upstream headers are relayed the response has started; a later body
//!   error ends the stream instead of producing a second response

use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, HttpBody};
use axum::http::{header, Request};
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use url::Url;

use crate::config::UpstreamConfig;
use crate::http::response::strip_hop_by_hop;
use crate::proxy::error::ForwardError;
use crate::proxy::target::{FallbackTarget, Target};
use crate::routing::RouteEntry;
use crate::service::ServiceConfig;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("invalid fallback target `{target}`: {source}")]
    InvalidTarget {
        target: String,
        #[source]
        source: url::ParseError,
    },

    #[error("failed to build upstream client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Forwards requests to debug backends or the fallback upstream.
#[derive(Debug, Clone)]
pub struct ProxyDispatcher {
    client: reqwest::Client,
    fallback: FallbackTarget,
}

impl ProxyDispatcher {
    pub fn new(
        config: &UpstreamConfig,
        service: Arc<dyn ServiceConfig>,
    ) -> Result<Self, DispatchError> {
        let static_target =
            Url::parse(config.target.trim()).map_err(|source| DispatchError::InvalidTarget {
                target: config.target.clone(),
                source,
            })?;

        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .no_proxy()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .read_timeout(Duration::from_secs(config.read_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            fallback: FallbackTarget::new(static_target, service),
        })
    }

    /// Target for a (possibly absent) matched route.
    pub fn target_for(&self, route: Option<&RouteEntry>) -> Target {
        self.fallback.select(route)
    }

    /// Forward `request` to `target`, translating failures into the JSON
    /// error response.
    pub async fn dispatch(&self, request: Request<Body>, target: &Target) -> Response {
        match self.forward(request, target).await {
            Ok(response) => response,
            Err(error) => {
                tracing::warn!(
                    target_kind = target.kind(),
                    code = error.code.as_str(),
                    error = %error,
                    "Unable to proxy request"
                );
                crate::observability::metrics::record_forward_error(error.code.as_str());
                error.into_response()
            }
        }
    }

    async fn forward(&self, request: Request<Body>, target: &Target) -> Result<Response, ForwardError> {
        let (parts, body) = request.into_parts();
        let url = target
            .upstream_url(parts.uri.path(), parts.uri.query())
            .map_err(ForwardError::invalid_url)?;

        let mut headers = parts.headers;
        strip_hop_by_hop(&mut headers);
        if !target.preserves_host() {
            headers.remove(header::HOST);
        }

        tracing::debug!(method = %parts.method, upstream = %url, "Forwarding request");

        let mut outgoing = self
            .client
            .request(parts.method, url.clone())
            .headers(headers);
        if body.size_hint().exact() != Some(0) {
            outgoing = outgoing.body(reqwest::Body::wrap_stream(body.into_data_stream()));
        }

        let upstream = outgoing
            .send()
            .await
            .map_err(|e| ForwardError::from_reqwest(&e, &url))?;

        let status = upstream.status();
        let mut headers = upstream.headers().clone();
        strip_hop_by_hop(&mut headers);

        let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }
}
