//! HTTP server setup.
//!
//! # Responsibilities
//! - Create the Axum router with a single catch-all handler
//! - Wire up middleware (tracing, request ID)
//! - Serve on a bound listener until the shutdown future resolves
//! - Match each request against the current route table and dispatch it

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::Response,
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::http::request::{
    propagate_request_id_layer, request_span, set_request_id_layer, RequestIdExt,
};
use crate::observability::metrics;
use crate::proxy::ProxyDispatcher;
use crate::routing::RouteStore;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub routes: Arc<RouteStore>,
    pub dispatcher: Arc<ProxyDispatcher>,
}

/// HTTP front end of the proxy.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(state: AppState) -> Self {
        Self {
            router: Self::build_router(state),
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/", any(proxy_handler))
            .route("/{*path}", any(proxy_handler))
            .with_state(state)
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http().make_span_with(request_span::<Body>))
            .layer(set_request_id_layer())
    }

    /// Serve on `listener` until `shutdown` resolves, then drain in-flight
    /// requests.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!(address = %addr, "HTTP server stopped");
        Ok(())
    }
}

/// Waits for any in-flight route build, matches the request and forwards it.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let request_id = request.request_id().to_string();

    let table = state.routes.current().await;
    let route = table.match_route(request.method(), request.uri().path());

    match route {
        Some(entry) => tracing::debug!(
            request_id = %request_id,
            method = %request.method(),
            path = %request.uri().path(),
            template = %entry.template(),
            port = entry.port,
            debug = entry.debug,
            "Route matched"
        ),
        None => tracing::debug!(
            request_id = %request_id,
            method = %request.method(),
            path = %request.uri().path(),
            "No route matched"
        ),
    }

    let target = state.dispatcher.target_for(route);
    let response = state.dispatcher.dispatch(request, &target).await;

    metrics::record_request(target.kind(), response.status().as_u16(), start);
    response
}
