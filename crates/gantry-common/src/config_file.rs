//! Bootstrap file loading for gantry.
//!
//! This module defines the TOML bootstrap file passed with `-s`:
//! - [`ConfigFile`]: top-level file structure
//! - [`ServerSection`]: listen address and process management settings
//!
//! CLI flags take precedence over file values; file values take precedence
//! over built-in defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{EngineOptions, ServerConfig};

/// Top-level bootstrap file structure.
///
/// # Example
///
/// ```toml
/// [server]
/// host = "0.0.0.0"
/// port = 8083
/// daemonize = false
/// pid_file = "/var/run/gantry.pid"
///
/// [engine]
/// worker_threads = 4
/// request_timeout_secs = 30
/// max_body_bytes = 2097152
/// log_level = "info"
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ConfigFile {
    /// Listen address and process management settings.
    #[serde(default)]
    pub server: ServerSection,

    /// Engine tuning options.
    #[serde(default)]
    pub engine: EngineOptions,
}

impl ConfigFile {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigFileError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigFileError::Io {
            path: path.as_ref().display().to_string(),
            source: e,
        })?;

        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string cannot be parsed as TOML.
    pub fn from_toml(content: &str) -> Result<Self, ConfigFileError> {
        toml::from_str(content).map_err(|e| ConfigFileError::Parse {
            message: e.to_string(),
        })
    }

    /// Resolve into a [`ServerConfig`], filling gaps with defaults.
    pub fn into_config(self) -> ServerConfig {
        let base = ServerConfig::default();
        ServerConfig {
            host: self.server.host.unwrap_or(base.host),
            port: self.server.port.unwrap_or(base.port),
            daemonize: self.server.daemonize.unwrap_or(base.daemonize),
            pid_file: self.server.pid_file,
            engine: self.engine,
        }
    }
}

/// `[server]` section of the bootstrap file.
///
/// All fields are optional so the file only has to state what it changes.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ServerSection {
    /// Host to bind.
    pub host: Option<String>,
    /// Port to bind.
    pub port: Option<u16>,
    /// Detach from the terminal.
    pub daemonize: Option<bool>,
    /// PID file location.
    pub pid_file: Option<PathBuf>,
}

/// Errors from bootstrap file loading.
#[derive(Error, Debug)]
pub enum ConfigFileError {
    /// The file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path that was attempted.
        path: String,
        /// Underlying OS error.
        source: std::io::Error,
    },

    /// The file content is not valid TOML for this structure.
    #[error("failed to parse config file: {message}")]
    Parse {
        /// Parser diagnostic.
        message: String,
    },
}
