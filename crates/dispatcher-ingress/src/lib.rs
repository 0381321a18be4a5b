#![forbid(unsafe_code)]
#![deny(unreachable_pub)]
#![deny(missing_docs)]

//! The HTTP ingress adapter: a small `axum` router translating inbound
//! orchestrator events into queued [`dispatcher_model::Job`]s, plus the
//! optional mTLS listener configuration.

mod handlers;
pub mod tls;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::{get, post};
use dispatcher_engine::{Catalog, QueueSender};
use tower::ServiceBuilder;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Shared state handed to every request handler.
#[derive(Clone)]
pub(crate) struct IngressState {
    pub(crate) catalog: Arc<Catalog>,
    pub(crate) sender: QueueSender,
    pub(crate) send_timeout: Duration,
}

/// Default deadline applied to `sender.send(job).await` before a full
/// queue degrades the request to `503 Service Unavailable`.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Build the ingress router.
///
/// `send_timeout` bounds how long a request waits for queue capacity
/// before answering `503`; pass [`DEFAULT_SEND_TIMEOUT`] unless the
/// deployment needs a tighter budget.
pub fn router(catalog: Arc<Catalog>, sender: QueueSender, send_timeout: Duration) -> Router {
    let state = IngressState {
        catalog,
        sender,
        send_timeout,
    };

    Router::new()
        .route("/api/v1/health", get(handlers::health))
        .route("/api/v1/event", post(handlers::on_event))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(send_timeout)),
        )
        .with_state(state)
}
