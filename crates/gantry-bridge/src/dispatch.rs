//! The application-facing seam of the bridge.
//!
//! [`Dispatch`] is the contract an embedded application implements: one
//! async call from request context to response, plus optional hooks for
//! error rendering, singleton-state isolation, and in-place reload.

use std::any::Any;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use gantry_common::DispatchError;

use crate::request::RequestContext;
use crate::response::AppResponse;

/// Opaque capture of application singleton state, taken before a dispatch
/// and handed back to [`Dispatch::restore`] afterwards.
pub type StateSnapshot = Box<dyn Any + Send>;

/// The application behind the bridge.
///
/// Exactly one dispatch runs at a time per server process; the bridge
/// guarantees this, which is what makes the snapshot/restore pair a sound
/// isolation mechanism.
#[async_trait]
pub trait Dispatch: Send + Sync + 'static {
    /// Turn one request into one response.
    ///
    /// Anything written to `ctx.output` during the call is prepended to the
    /// returned body by the bridge.
    async fn dispatch(&self, ctx: RequestContext) -> Result<AppResponse, DispatchError>;

    /// Render a dispatch error as a response.
    ///
    /// The default produces a JSON error body with the error's status.
    fn render_error(&self, error: &DispatchError) -> AppResponse {
        AppResponse::error(error.status(), &error.to_string())
    }

    /// Capture mutable singleton state before a dispatch.
    ///
    /// Applications with no shared mutable state keep the no-op default.
    fn snapshot(&self) -> StateSnapshot {
        Box::new(())
    }

    /// Restore state captured by [`Dispatch::snapshot`].
    fn restore(&self, _snapshot: StateSnapshot) {}

    /// Invoked when the server receives a reload signal (SIGHUP).
    fn on_reload(&self) {}
}

/// Shared buffer for incidental output produced during a dispatch.
///
/// The bridge drains it after the call and prepends the contents to the
/// response body, so output written outside the response object is not
/// lost.
#[derive(Clone, Debug, Default)]
pub struct OutputBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl OutputBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw bytes.
    pub fn write(&self, bytes: &[u8]) {
        self.lock().extend_from_slice(bytes);
    }

    /// Append a string.
    pub fn write_str(&self, s: &str) {
        self.write(s.as_bytes());
    }

    /// Drain the buffered bytes, leaving the buffer empty.
    pub fn take(&self) -> Vec<u8> {
        std::mem::take(&mut *self.lock())
    }

    /// Whether nothing has been buffered.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<u8>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
