//! Engine routing and middleware assembly.
//!
//! The engine does not route: every request, any path, any method, falls
//! through to [`handle_request`](crate::handler::handle_request) and is
//! routed by the application itself. What the engine does own is the
//! middleware around that single callback: tracing, per-request timeout,
//! body size cap, and an optional connection concurrency limit.

use axum::Router;
use axum::extract::DefaultBodyLimit;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use gantry_common::EngineOptions;

use crate::handler::handle_request;
use crate::state::BridgeState;

/// Build the engine router around a bridge state.
pub fn build_router(state: BridgeState, options: &EngineOptions) -> Router {
    let router = Router::new()
        .fallback(handle_request)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(options.request_timeout()))
        .layer(DefaultBodyLimit::max(options.max_body_bytes));

    let router = match options.max_connections {
        Some(limit) => router.layer(GlobalConcurrencyLimitLayer::new(limit)),
        None => router,
    };

    router.with_state(state)
}
