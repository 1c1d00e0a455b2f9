//! The embedded HTTP server.
//!
//! [`BridgeServer`] owns one server instance: it binds the listener,
//! maintains the lifecycle records (PID file and startup state) for the
//! duration of the run, forwards SIGHUP to the application's reload hook,
//! and serves until a shutdown signal arrives.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{info, warn};

use gantry_common::{LifecycleError, ServerConfig, ServerError};
use gantry_lifecycle::{LifecyclePaths, StartupState, pidfile, startup};

use crate::dispatch::Dispatch;
use crate::router::build_router;
use crate::state::BridgeState;

/// One embedded server instance wrapping an application.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use gantry_bridge::{BridgeServer, EchoApp};
/// use gantry_common::ServerConfig;
///
/// let server = BridgeServer::new(ServerConfig::default(), Arc::new(EchoApp));
/// server.run().await?;
/// ```
pub struct BridgeServer {
    /// Resolved server configuration.
    config: ServerConfig,
    /// Shared bridge state.
    state: BridgeState,
}

impl BridgeServer {
    /// Create a server around an application.
    pub fn new(config: ServerConfig, app: Arc<dyn Dispatch>) -> Self {
        let state = BridgeState::new(app, &config.engine);
        Self { config, state }
    }

    /// The server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The shared bridge state.
    pub fn state(&self) -> &BridgeState {
        &self.state
    }

    /// Run the server until shutdown.
    ///
    /// Writes the PID record and startup state after the listener is bound,
    /// and removes both on the way out, whether the engine loop ended
    /// cleanly or with an error.
    ///
    /// # Errors
    ///
    /// Fails if another instance is recorded as running at the same PID
    /// file, if the address cannot be bound, or if the engine loop errors.
    pub async fn run(self) -> Result<(), ServerError> {
        let paths = LifecyclePaths::resolve(self.config.pid_file.as_deref());

        if let Some(pid) = pidfile::current_pid(&paths)? {
            return Err(LifecycleError::AlreadyRunning { pid }.into());
        }

        let addr = self.config.bind_addr();
        let listener = TcpListener::bind(&addr).await.map_err(|source| {
            ServerError::Bind {
                addr: addr.clone(),
                source,
            }
        })?;

        pidfile::write_pid(&paths.pid_file, std::process::id()).map_err(LifecycleError::from)?;
        StartupState::new(self.config.clone()).persist(&paths)?;

        spawn_reload_listener(self.state.app().clone());

        info!(%addr, pid = std::process::id(), "starting server");

        let app = build_router(self.state, &self.config.engine);

        let result = if self.config.engine.graceful_shutdown {
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await
        } else {
            axum::serve(listener, app).await
        };

        // Records come off even when the engine loop failed.
        if let Err(e) = pidfile::remove_pid(&paths.pid_file) {
            warn!(error = %e, "failed to remove PID record");
        }
        if let Err(e) = startup::remove(&paths) {
            warn!(error = %e, "failed to remove startup state");
        }

        result.map_err(|source| ServerError::Serve { source })?;

        info!("server shutdown complete");
        Ok(())
    }

    /// Start the server on an ephemeral port and return a test handle.
    ///
    /// Skips the lifecycle records: test instances are not managed by the
    /// control actions.
    pub async fn start_test(app: Arc<dyn Dispatch>) -> Result<TestHandle, ServerError> {
        let config = ServerConfig::default();
        let state = BridgeState::new(app, &config.engine);
        let router = build_router(state.clone(), &config.engine);

        let listener = TcpListener::bind("127.0.0.1:0").await.map_err(|source| {
            ServerError::Bind {
                addr: "127.0.0.1:0".to_string(),
                source,
            }
        })?;

        let addr = listener
            .local_addr()
            .map_err(|source| ServerError::Serve { source })?;

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

        let handle = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        Ok(TestHandle {
            addr,
            state,
            shutdown_tx: Some(shutdown_tx),
            handle,
        })
    }
}

/// Handle for a test server instance.
pub struct TestHandle {
    /// The address the server is bound to.
    addr: SocketAddr,
    /// Shared bridge state.
    state: BridgeState,
    /// Shutdown signal sender.
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    /// Server task handle.
    handle: tokio::task::JoinHandle<Result<(), std::io::Error>>,
}

impl TestHandle {
    /// Get the server address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get the server URL.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the shared bridge state.
    pub fn state(&self) -> &BridgeState {
        &self.state
    }

    /// Shutdown the server gracefully.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        let _ = self.handle.await;
    }
}

/// Forward SIGHUP to the application's reload hook.
#[cfg(unix)]
fn spawn_reload_listener(app: Arc<dyn Dispatch>) {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::hangup()) {
        Ok(mut hangup) => {
            tokio::spawn(async move {
                while hangup.recv().await.is_some() {
                    info!("reload signal received");
                    app.on_reload();
                }
            });
        }
        Err(e) => warn!(error = %e, "failed to install reload signal handler"),
    }
}

#[cfg(not(unix))]
fn spawn_reload_listener(_app: Arc<dyn Dispatch>) {}

/// Wait for shutdown signal (SIGTERM or SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::echo::EchoApp;
    use crate::response::Cookie;

    #[test]
    fn test_server_creation() {
        let config = ServerConfig::default().with_port(3000);
        let server = BridgeServer::new(config, Arc::new(EchoApp));
        assert_eq!(server.config().bind_addr(), "127.0.0.1:3000");
    }

    #[tokio::test]
    async fn test_echo_round_trip_over_http() {
        let handle = BridgeServer::start_test(Arc::new(EchoApp)).await.unwrap();

        let response = reqwest::get(format!("{}/echo?foo=bar", handle.url()))
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(response.text().await.unwrap(), r#"{"foo":"bar"}"#);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_cookie_reaches_the_wire() {
        use async_trait::async_trait;
        use gantry_common::DispatchError;

        use crate::dispatch::Dispatch;
        use crate::request::RequestContext;
        use crate::response::AppResponse;

        struct CookieApp;

        #[async_trait]
        impl Dispatch for CookieApp {
            async fn dispatch(&self, _ctx: RequestContext) -> Result<AppResponse, DispatchError> {
                Ok(AppResponse::text(200, "ok")
                    .with_cookie(Cookie::new("session", "abc").http_only()))
            }
        }

        let handle = BridgeServer::start_test(Arc::new(CookieApp)).await.unwrap();

        let response = reqwest::get(handle.url()).await.unwrap();
        let set_cookie = response
            .headers()
            .get("set-cookie")
            .and_then(|v| v.to_str().ok())
            .unwrap();
        assert_eq!(set_cookie, "session=abc; HttpOnly");

        handle.shutdown().await;
    }
}
