//! The request bridge itself.
//!
//! `handle_request` is the single engine callback: it copies the inbound
//! request into a fresh [`RequestContext`], runs the application dispatch
//! under the gate with singleton state snapshotted around it, and
//! translates the outcome back into the engine response. Per-request
//! failures of any kind end as a response; the worker never dies.

use std::time::Instant;

use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::response::Response;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::request::RequestContext;
use crate::response::AppResponse;
use crate::state::BridgeState;

/// Engine request callback.
#[instrument(skip(state, req))]
pub async fn handle_request(State(state): State<BridgeState>, req: Request<Body>) -> Response {
    let start = Instant::now();
    let request_id = Uuid::new_v4().to_string();
    let method = req.method().to_string();
    let path = req.uri().path().to_string();

    let ctx = match RequestContext::from_engine(req, state.max_body_bytes()).await {
        Ok(ctx) => ctx,
        Err(reason) => {
            warn!(request_id = %request_id, %method, %path, reason = %reason, "rejected malformed request");
            return AppResponse::error(400, &reason).into_engine_response();
        }
    };

    let response = dispatch_bridged(&state, ctx).await;

    info!(
        request_id = %request_id,
        %method,
        %path,
        status = response.status,
        duration_ms = start.elapsed().as_millis(),
        "request completed"
    );

    response.into_engine_response()
}

/// Run one dispatch with the full bridging discipline applied.
///
/// Holds the gate for the whole call, snapshots and restores application
/// singleton state around it, contains panics at the task boundary, and
/// prepends buffered incidental output to the returned body.
pub async fn dispatch_bridged(state: &BridgeState, ctx: RequestContext) -> AppResponse {
    let _gate = state.gate().lock().await;

    let output = ctx.output.clone();
    let snapshot = state.app().snapshot();

    let app = state.app().clone();
    let result = tokio::spawn(async move { app.dispatch(ctx).await }).await;

    state.app().restore(snapshot);

    match result {
        Ok(Ok(mut response)) => {
            let buffered = output.take();
            response.prepend_body(&buffered);
            response
        }
        Ok(Err(dispatch_error)) => {
            error!(error = %dispatch_error, "dispatch failed");
            state.app().render_error(&dispatch_error)
        }
        Err(join_error) => {
            if join_error.is_panic() {
                error!("dispatch panicked");
            } else {
                error!("dispatch task was cancelled");
            }
            AppResponse::error(500, "internal server error")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use gantry_common::{DispatchError, EngineOptions};

    use crate::dispatch::{Dispatch, StateSnapshot};
    use crate::echo::EchoApp;

    fn state_for(app: Arc<dyn Dispatch>) -> BridgeState {
        BridgeState::new(app, &EngineOptions::default())
    }

    struct FailingApp;

    #[async_trait]
    impl Dispatch for FailingApp {
        async fn dispatch(&self, _ctx: RequestContext) -> Result<AppResponse, DispatchError> {
            Err(DispatchError::handler(418, "teapot refused"))
        }
    }

    struct PanickingApp;

    #[async_trait]
    impl Dispatch for PanickingApp {
        async fn dispatch(&self, _ctx: RequestContext) -> Result<AppResponse, DispatchError> {
            panic!("boom");
        }
    }

    /// Mutates its singleton counter during dispatch and echoes the value
    /// it observed on entry.
    struct CountingApp {
        counter: Mutex<u64>,
    }

    #[async_trait]
    impl Dispatch for CountingApp {
        async fn dispatch(&self, _ctx: RequestContext) -> Result<AppResponse, DispatchError> {
            let mut counter = self.counter.lock().unwrap();
            let seen = *counter;
            *counter += 1;
            Ok(AppResponse::text(200, &seen.to_string()))
        }

        fn snapshot(&self) -> StateSnapshot {
            Box::new(*self.counter.lock().unwrap())
        }

        fn restore(&self, snapshot: StateSnapshot) {
            if let Ok(value) = snapshot.downcast::<u64>() {
                *self.counter.lock().unwrap() = *value;
            }
        }
    }

    struct OutputApp;

    #[async_trait]
    impl Dispatch for OutputApp {
        async fn dispatch(&self, ctx: RequestContext) -> Result<AppResponse, DispatchError> {
            ctx.output.write_str("incidental:");
            Ok(AppResponse::text(200, "body"))
        }
    }

    #[tokio::test]
    async fn test_dispatch_error_is_rendered() {
        let state = state_for(Arc::new(FailingApp));
        let response = dispatch_bridged(&state, RequestContext::new("GET", "/")).await;

        assert_eq!(response.status, 418);
        assert!(String::from_utf8_lossy(&response.body).contains("teapot refused"));
    }

    #[tokio::test]
    async fn test_panic_becomes_500() {
        let state = state_for(Arc::new(PanickingApp));
        let response = dispatch_bridged(&state, RequestContext::new("GET", "/")).await;

        assert_eq!(response.status, 500);
    }

    #[tokio::test]
    async fn test_worker_survives_panics() {
        let state = state_for(Arc::new(PanickingApp));
        for _ in 0..3 {
            let response = dispatch_bridged(&state, RequestContext::new("GET", "/")).await;
            assert_eq!(response.status, 500);
        }
    }

    #[tokio::test]
    async fn test_sequential_requests_do_not_observe_mutations() {
        let state = state_for(Arc::new(CountingApp {
            counter: Mutex::new(0),
        }));

        let first = dispatch_bridged(&state, RequestContext::new("GET", "/")).await;
        let second = dispatch_bridged(&state, RequestContext::new("GET", "/")).await;

        // Both dispatches see the pristine counter: the first one's
        // mutation was rolled back before the second ran.
        assert_eq!(first.body, b"0");
        assert_eq!(second.body, b"0");
    }

    #[tokio::test]
    async fn test_buffered_output_is_prepended() {
        let state = state_for(Arc::new(OutputApp));
        let response = dispatch_bridged(&state, RequestContext::new("GET", "/")).await;

        assert_eq!(response.body, b"incidental:body");
    }

    #[tokio::test]
    async fn test_echo_round_trip_body() {
        let state = state_for(Arc::new(EchoApp));
        let mut ctx = RequestContext::new("GET", "/echo");
        ctx.query.push(("foo".to_string(), "bar".to_string()));

        let response = dispatch_bridged(&state, ctx).await;

        assert_eq!(response.status, 200);
        assert_eq!(response.body, br#"{"foo":"bar"}"#);
    }
}
