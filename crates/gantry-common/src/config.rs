//! Configuration structures for gantry.
//!
//! This module defines configuration for the embedded engine and the server
//! process around it:
//! - [`ServerConfig`]: where to listen and how the process is managed
//! - [`EngineOptions`]: the statically enumerated set of engine tuning keys
//!
//! Engine options are deliberately a closed set. Every recognized key has a
//! typed effect on the engine; values are validated when set, and unknown
//! keys are dropped (never silently carried along as opaque strings).

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// The closed set of recognized engine option names.
///
/// CLI tokens of the form `--<name>=<value>` are filtered against this set;
/// the same names appear under `[engine]` in the bootstrap file.
pub const OPTION_NAMES: &[&str] = &[
    "worker_threads",
    "max_connections",
    "request_timeout_secs",
    "max_body_bytes",
    "graceful_shutdown",
    "log_level",
    "log_file",
];

/// A recognized option was given a value of the wrong shape.
#[derive(Error, Debug, PartialEq, Eq)]
#[error("invalid value {value:?} for option {name} (expected {expected})")]
pub struct OptionValueError {
    /// The option name.
    pub name: &'static str,
    /// The rejected raw value.
    pub value: String,
    /// Human description of the expected shape.
    pub expected: &'static str,
}

/// Engine tuning options.
///
/// Each field corresponds to one entry of [`OPTION_NAMES`] and has a typed
/// effect: runtime sizing, middleware limits, or log routing. The engine
/// itself (tokio + hyper) owns scheduling and connection handling; these
/// options are the only knobs the bridge passes through to it.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EngineOptions {
    /// Worker threads for the engine runtime. `None` uses the tokio default
    /// (one per core).
    #[serde(default)]
    pub worker_threads: Option<usize>,

    /// Cap on concurrently served connections. `None` means unlimited.
    #[serde(default)]
    pub max_connections: Option<usize>,

    /// Per-request timeout in seconds, enforced by the engine middleware.
    #[serde(default = "defaults::request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Maximum accepted request body size in bytes.
    #[serde(default = "defaults::max_body_bytes")]
    pub max_body_bytes: usize,

    /// Drain in-flight requests on SIGTERM/ctrl-c before exiting.
    #[serde(default = "defaults::graceful_shutdown")]
    pub graceful_shutdown: bool,

    /// Log filter directive (e.g. `info` or `gantry=debug`). `None` defers
    /// to `RUST_LOG` or the built-in default.
    #[serde(default)]
    pub log_level: Option<String>,

    /// Log destination file. `None` logs to stderr.
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            worker_threads: None,
            max_connections: None,
            request_timeout_secs: defaults::request_timeout_secs(),
            max_body_bytes: defaults::max_body_bytes(),
            graceful_shutdown: defaults::graceful_shutdown(),
            log_level: None,
            log_file: None,
        }
    }
}

impl EngineOptions {
    /// Whether `name` belongs to the recognized option set.
    pub fn is_recognized(name: &str) -> bool {
        OPTION_NAMES.contains(&name)
    }

    /// Set one option from its textual value.
    ///
    /// Returns `Ok(true)` if the option was recognized and applied,
    /// `Ok(false)` if the name is unknown (the value is dropped with a
    /// warning), and an error if a recognized option was given a value
    /// that does not parse to its type.
    pub fn set(&mut self, name: &str, value: &str) -> Result<bool, OptionValueError> {
        match name {
            "worker_threads" => self.worker_threads = Some(parse("worker_threads", value)?),
            "max_connections" => self.max_connections = Some(parse("max_connections", value)?),
            "request_timeout_secs" => {
                self.request_timeout_secs = parse("request_timeout_secs", value)?;
            }
            "max_body_bytes" => self.max_body_bytes = parse("max_body_bytes", value)?,
            "graceful_shutdown" => self.graceful_shutdown = parse_bool("graceful_shutdown", value)?,
            "log_level" => self.log_level = Some(value.to_string()),
            "log_file" => self.log_file = Some(PathBuf::from(value)),
            _ => {
                warn!(option = name, "dropping unrecognized engine option");
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Apply a batch of `(name, value)` pairs, dropping unrecognized names.
    ///
    /// The applied subset is always contained in [`OPTION_NAMES`].
    pub fn apply_pairs<'a, I>(&mut self, pairs: I) -> Result<Vec<&'static str>, OptionValueError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut applied = Vec::new();
        for (name, value) in pairs {
            if self.set(name, value)? {
                if let Some(canonical) = OPTION_NAMES.iter().find(|n| **n == name) {
                    applied.push(*canonical);
                }
            }
        }
        Ok(applied)
    }

    /// The request timeout as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Serialize back into `--name=value` CLI tokens for relaunching.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(n) = self.worker_threads {
            args.push(format!("--worker_threads={n}"));
        }
        if let Some(n) = self.max_connections {
            args.push(format!("--max_connections={n}"));
        }
        args.push(format!("--request_timeout_secs={}", self.request_timeout_secs));
        args.push(format!("--max_body_bytes={}", self.max_body_bytes));
        args.push(format!("--graceful_shutdown={}", self.graceful_shutdown));
        if let Some(ref level) = self.log_level {
            args.push(format!("--log_level={level}"));
        }
        if let Some(ref file) = self.log_file {
            args.push(format!("--log_file={}", file.display()));
        }
        args
    }
}

fn parse<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, OptionValueError> {
    value.parse().map_err(|_| OptionValueError {
        name,
        value: value.to_string(),
        expected: "an unsigned integer",
    })
}

fn parse_bool(name: &'static str, value: &str) -> Result<bool, OptionValueError> {
    match value {
        "true" | "1" | "on" | "yes" => Ok(true),
        "false" | "0" | "off" | "no" => Ok(false),
        _ => Err(OptionValueError {
            name,
            value: value.to_string(),
            expected: "a boolean",
        }),
    }
}

/// Server process configuration.
///
/// This is the full description of one server instance: listen address,
/// background mode, lifecycle record location, and engine options. It is
/// persisted verbatim as the startup state so that `restart` can re-launch
/// the exact same instance.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
    /// Detach from the terminal and run in the background.
    #[serde(default)]
    pub daemonize: bool,
    /// PID file location. `None` uses the platform default
    /// (`<tmp>/gantry.pid`).
    #[serde(default)]
    pub pid_file: Option<PathBuf>,
    /// Engine tuning options.
    #[serde(default)]
    pub engine: EngineOptions,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: defaults::host(),
            port: defaults::port(),
            daemonize: false,
            pid_file: None,
            engine: EngineOptions::default(),
        }
    }
}

impl ServerConfig {
    /// Set the host to bind.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the port to bind.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Run detached in the background.
    pub fn with_daemonize(mut self, daemonize: bool) -> Self {
        self.daemonize = daemonize;
        self
    }

    /// Set an explicit PID file location.
    pub fn with_pid_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.pid_file = Some(path.into());
        self
    }

    /// Replace the engine options.
    pub fn with_engine(mut self, engine: EngineOptions) -> Self {
        self.engine = engine;
        self
    }

    /// The `host:port` string the listener binds to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Rebuild the CLI argument vector that reproduces this configuration.
    ///
    /// Used for deterministic relaunch on `restart`; the daemonize flag is
    /// intentionally omitted because relaunched processes are always spawned
    /// detached.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![
            "-h".to_string(),
            self.host.clone(),
            "-p".to_string(),
            self.port.to_string(),
        ];
        if let Some(ref pid_file) = self.pid_file {
            args.push("--pid-file".to_string());
            args.push(pid_file.display().to_string());
        }
        args.extend(self.engine.to_args());
        args
    }
}

mod defaults {
    pub fn host() -> String {
        "127.0.0.1".to_string()
    }

    pub fn port() -> u16 {
        8083
    }

    pub fn request_timeout_secs() -> u64 {
        30
    }

    pub fn max_body_bytes() -> usize {
        2 * 1024 * 1024
    }

    pub fn graceful_shutdown() -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_options_defaults() {
        let opts = EngineOptions::default();
        assert_eq!(opts.request_timeout_secs, 30);
        assert_eq!(opts.max_body_bytes, 2 * 1024 * 1024);
        assert!(opts.graceful_shutdown);
        assert!(opts.worker_threads.is_none());
    }

    #[test]
    fn test_set_recognized_option() {
        let mut opts = EngineOptions::default();
        assert!(opts.set("worker_threads", "4").unwrap());
        assert_eq!(opts.worker_threads, Some(4));

        assert!(opts.set("graceful_shutdown", "false").unwrap());
        assert!(!opts.graceful_shutdown);
    }

    #[test]
    fn test_set_unknown_option_is_dropped() {
        let mut opts = EngineOptions::default();
        let before = opts.clone();
        assert!(!opts.set("reactor_num", "8").unwrap());
        assert_eq!(opts, before);
    }

    #[test]
    fn test_set_ill_typed_value_rejected() {
        let mut opts = EngineOptions::default();
        let err = opts.set("worker_threads", "many").unwrap_err();
        assert_eq!(err.name, "worker_threads");

        let err = opts.set("graceful_shutdown", "maybe").unwrap_err();
        assert_eq!(err.expected, "a boolean");
    }

    #[test]
    fn test_applied_subset_of_whitelist() {
        let mut opts = EngineOptions::default();
        let applied = opts
            .apply_pairs(vec![
                ("worker_threads", "2"),
                ("bogus_key", "1"),
                ("max_body_bytes", "1024"),
                ("another_unknown", "x"),
            ])
            .unwrap();

        assert_eq!(applied, vec!["worker_threads", "max_body_bytes"]);
        for name in &applied {
            assert!(OPTION_NAMES.contains(name));
        }
        assert_eq!(opts.max_body_bytes, 1024);
    }

    #[test]
    fn test_server_config_builder() {
        let config = ServerConfig::default()
            .with_host("0.0.0.0")
            .with_port(9000)
            .with_daemonize(true);

        assert_eq!(config.bind_addr(), "0.0.0.0:9000");
        assert!(config.daemonize);
    }

    #[test]
    fn test_to_args_round_trip_shape() {
        let mut engine = EngineOptions::default();
        engine.set("worker_threads", "2").unwrap();

        let config = ServerConfig::default()
            .with_host("10.0.0.1")
            .with_port(8080)
            .with_pid_file("/tmp/g.pid")
            .with_engine(engine);

        let args = config.to_args();
        assert!(args.contains(&"-h".to_string()));
        assert!(args.contains(&"10.0.0.1".to_string()));
        assert!(args.contains(&"--worker_threads=2".to_string()));
        assert!(args.contains(&"--pid-file".to_string()));
        // Relaunch never re-daemonizes via the flag.
        assert!(!args.contains(&"-d".to_string()));
    }
}
