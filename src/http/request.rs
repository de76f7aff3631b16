//! Request identification.
//!
//! # Responsibilities
//! - Assign an `x-request-id` (UUID v4) to requests that arrive without one
//! - Echo the request ID on the response
//! - Give handlers a cheap way to read it
//!
//! # Design Decisions
//! - A client-supplied request ID is kept, so IDs can span tools
//! - The ID is forwarded upstream with the other request headers

use axum::http::{HeaderName, Request};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tracing::Span;

/// Header carrying the request ID.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Layer that assigns missing request IDs.
pub fn set_request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid)
}

/// Layer that copies the request ID onto the response.
pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::new(X_REQUEST_ID)
}

/// Span opened by the trace layer for each request. Runs inside
/// [`set_request_id_layer`], so the ID is always present.
pub fn request_span<B>(request: &Request<B>) -> Span {
    tracing::info_span!(
        "request",
        method = %request.method(),
        uri = %request.uri(),
        request_id = %request.request_id(),
    )
}

/// Read access to the request ID header.
pub trait RequestIdExt {
    fn request_id(&self) -> &str;
}

impl<B> RequestIdExt for Request<B> {
    fn request_id(&self) -> &str {
        self.headers()
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::sync::{Arc, Mutex};

    use axum::body::Body;
    use axum::http::Response;
    use tower::{ServiceBuilder, ServiceExt};
    use tracing::field::{Field, Visit};
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::Layer;

    async fn send(request: Request<Body>) -> (String, String) {
        let service = ServiceBuilder::new()
            .layer(set_request_id_layer())
            .layer(propagate_request_id_layer())
            .service_fn(|req: Request<Body>| async move {
                Ok::<_, Infallible>(Response::new(Body::from(req.request_id().to_string())))
            });

        let response = service.oneshot(request).await.unwrap();
        let header = response.headers()[X_REQUEST_ID].to_str().unwrap().to_string();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (header, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn assigns_and_keeps_request_ids() {
        let (header, seen) = send(Request::new(Body::empty())).await;
        assert!(uuid::Uuid::parse_str(&header).is_ok());
        assert_eq!(seen, header);

        let supplied = Request::builder()
            .header(X_REQUEST_ID, "abc-123")
            .body(Body::empty())
            .unwrap();
        let (header, seen) = send(supplied).await;
        assert_eq!(header, "abc-123");
        assert_eq!(seen, "abc-123");
    }

    #[test]
    fn missing_id_reads_as_unknown() {
        let request = Request::new(());
        assert_eq!(request.request_id(), "unknown");
    }

    /// Collects the `request_id` field of every new span.
    struct RequestIds(Arc<Mutex<Vec<String>>>);

    impl<S: tracing::Subscriber> Layer<S> for RequestIds {
        fn on_new_span(
            &self,
            attrs: &tracing::span::Attributes<'_>,
            _id: &tracing::span::Id,
            _ctx: Context<'_, S>,
        ) {
            struct Ids<'a>(&'a mut Vec<String>);

            impl Visit for Ids<'_> {
                fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
                    if field.name() == "request_id" {
                        self.0.push(format!("{value:?}"));
                    }
                }
            }

            attrs.record(&mut Ids(&mut self.0.lock().unwrap()));
        }
    }

    #[test]
    fn request_span_carries_the_request_id() {
        let ids = Arc::new(Mutex::new(Vec::new()));
        let subscriber = tracing_subscriber::registry().with(RequestIds(ids.clone()));
        let request = Request::builder()
            .uri("/bears/00")
            .header(X_REQUEST_ID, "abc-123")
            .body(())
            .unwrap();

        let span = tracing::subscriber::with_default(subscriber, || request_span(&request));

        assert!(span.metadata().is_some_and(|meta| meta.name() == "request"));
        assert_eq!(*ids.lock().unwrap(), vec!["abc-123".to_string()]);
    }
}
