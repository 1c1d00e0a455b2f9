//! Shared bridge state.
//!
//! [`BridgeState`] holds the application and the dispatch gate shared by
//! all request handlers. It is cloned per request, so everything inside is
//! `Arc`ed.

use std::sync::Arc;

use gantry_common::EngineOptions;

use crate::dispatch::Dispatch;

/// Shared state across all request handlers.
#[derive(Clone)]
pub struct BridgeState {
    /// The application behind the bridge.
    app: Arc<dyn Dispatch>,
    /// Serializes dispatches: exactly one request executes at a time per
    /// process, which is what makes snapshot/restore sound.
    gate: Arc<tokio::sync::Mutex<()>>,
    /// Request body cap, from the engine options.
    max_body_bytes: usize,
}

impl BridgeState {
    /// Create state around an application.
    pub fn new(app: Arc<dyn Dispatch>, options: &EngineOptions) -> Self {
        Self {
            app,
            gate: Arc::new(tokio::sync::Mutex::new(())),
            max_body_bytes: options.max_body_bytes,
        }
    }

    /// The application.
    pub fn app(&self) -> &Arc<dyn Dispatch> {
        &self.app
    }

    /// The dispatch gate.
    pub(crate) fn gate(&self) -> &tokio::sync::Mutex<()> {
        &self.gate
    }

    /// The request body cap in bytes.
    pub fn max_body_bytes(&self) -> usize {
        self.max_body_bytes
    }
}

impl std::fmt::Debug for BridgeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeState")
            .field("max_body_bytes", &self.max_body_bytes)
            .finish_non_exhaustive()
    }
}
