//! Error types for gantry.
//!
//! This module defines a hierarchy of error types using `thiserror`:
//! - [`LifecycleError`]: failures while controlling the server process
//! - [`DispatchError`]: application-level failures during request dispatch
//! - [`ServerError`]: failures while binding and running the embedded engine

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors from the server lifecycle controller.
///
/// These errors are fatal to the CLI invocation that triggered them: the
/// binary prints them and exits nonzero.
#[derive(Error, Debug)]
pub enum LifecycleError {
    /// A control action was attempted but no live server was found.
    ///
    /// Raised when the PID file is absent, or when it recorded a process
    /// that is no longer alive (the stale record is cleaned up on detection).
    #[error("server not running (no live PID record at {pid_file})", pid_file = .pid_file.display())]
    NotRunning {
        /// Path of the PID file that was checked.
        pid_file: PathBuf,
    },

    /// A start was attempted while a live PID record exists.
    #[error("server already running (pid {pid})")]
    AlreadyRunning {
        /// PID of the running server.
        pid: u32,
    },

    /// Restart could not recover the persisted startup configuration.
    #[error("cannot restart: startup state missing or unreadable at {state_file}", state_file = .state_file.display())]
    RestartStateMissing {
        /// Path of the startup-state file that was expected.
        state_file: PathBuf,
    },

    /// The process survived the full SIGTERM/SIGKILL escalation.
    #[error("process {pid} did not exit after SIGKILL")]
    StopTimeout {
        /// PID of the process that refused to die.
        pid: u32,
    },

    /// Signal delivery to the recorded PID failed.
    #[error("failed to signal pid {pid}: {source}")]
    Signal {
        /// Target PID.
        pid: u32,
        /// Underlying OS error.
        source: io::Error,
    },

    /// Filesystem operation on the PID or startup-state record failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The operation is not available on this platform.
    #[error("{0} is not supported on this platform")]
    Unsupported(&'static str),
}

impl LifecycleError {
    /// Create a new `NotRunning` error.
    pub fn not_running(pid_file: impl Into<PathBuf>) -> Self {
        Self::NotRunning {
            pid_file: pid_file.into(),
        }
    }

    /// Returns `true` if this error means no server was found to act on.
    pub fn is_not_running(&self) -> bool {
        matches!(self, Self::NotRunning { .. })
    }
}

/// Application-level failure during request dispatch.
///
/// These errors are caught per request by the bridge, converted into an
/// HTTP error response, and never crash the worker.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// The application rejected the request with a specific status.
    #[error("{message}")]
    Handler {
        /// HTTP status to respond with.
        status: u16,
        /// Message rendered into the error body.
        message: String,
    },

    /// An internal application failure with no specific status.
    #[error("dispatch failed: {0}")]
    Internal(String),
}

impl DispatchError {
    /// Create a new `Handler` error with an explicit status code.
    pub fn handler(status: u16, message: impl Into<String>) -> Self {
        Self::Handler {
            status,
            message: message.into(),
        }
    }

    /// Create a new `Internal` error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// The HTTP status this error should be rendered with.
    pub fn status(&self) -> u16 {
        match self {
            Self::Handler { status, .. } => *status,
            Self::Internal(_) => 500,
        }
    }
}

/// Errors from the embedded engine server.
#[derive(Error, Debug)]
pub enum ServerError {
    /// The listener could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address that was requested.
        addr: String,
        /// Underlying OS error.
        source: io::Error,
    },

    /// The engine loop terminated with an error.
    #[error("server error: {source}")]
    Serve {
        /// Underlying OS error.
        source: io::Error,
    },

    /// A lifecycle record could not be maintained.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}
