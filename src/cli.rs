//! Command-line surface.
//!
//! The binary takes one optional positional action (defaulting to `start`)
//! plus short flags for the listen address and process management. Tokens
//! of the form `--name=value` are engine options, extracted from the
//! argument vector before clap sees it and validated against the
//! recognized option set.
//!
//! `-h` is the host flag, matching the historical interface; a bare `-h`
//! prints usage instead of binding anywhere. Help lives on `--help`.

use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueEnum};

use gantry_common::{ConfigFile, ServerConfig};

/// Long flags owned by the CLI itself. Everything else of the form
/// `--name=value` is treated as an engine option.
const CLI_LONG_FLAGS: &[&str] = &["host", "port", "config", "daemonize", "pid-file", "help", "version"];

/// Lifecycle action, taken as the first positional argument.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    /// Start the server (the default).
    Start,
    /// Stop the recorded server process.
    Stop,
    /// Ask the running server to reload in place.
    Reload,
    /// Stop, then relaunch from the persisted startup state.
    Restart,
    /// Report whether a server is running.
    Status,
}

/// Embedded HTTP server with a PID-file based lifecycle manager.
#[derive(Parser, Debug)]
#[command(name = "gantry", version, disable_help_flag = true)]
pub struct Cli {
    /// Action to perform.
    #[arg(value_enum)]
    pub action: Option<Action>,

    /// Host to bind. A bare `-h` prints usage.
    #[arg(short = 'h', long = "host", num_args = 0..=1, value_name = "HOST")]
    pub host: Option<Option<String>>,

    /// Port to bind.
    #[arg(short = 'p', long = "port", value_name = "PORT")]
    pub port: Option<u16>,

    /// Bootstrap configuration file (TOML).
    #[arg(short = 's', long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Detach from the terminal and run in the background.
    #[arg(short = 'd', long = "daemonize")]
    pub daemonize: bool,

    /// PID file location.
    #[arg(long = "pid-file", value_name = "FILE")]
    pub pid_file: Option<PathBuf>,

    /// Print help.
    #[arg(long = "help", action = ArgAction::HelpLong)]
    help: Option<bool>,
}

impl Cli {
    /// The requested action, defaulting to `start`.
    pub fn action(&self) -> Action {
        self.action.unwrap_or(Action::Start)
    }

    /// Whether a bare `-h` was given (usage requested, no host value).
    pub fn wants_usage(&self) -> bool {
        matches!(self.host, Some(None))
    }
}

/// Split engine option tokens (`--name=value`) out of an argument vector.
///
/// Returns the remaining arguments for clap and the extracted pairs in
/// order of appearance. Long flags the CLI owns are left in place even in
/// `--flag=value` form.
pub fn split_engine_options(argv: Vec<String>) -> (Vec<String>, Vec<(String, String)>) {
    let mut cli_args = Vec::new();
    let mut engine_pairs = Vec::new();

    for arg in argv {
        if let Some(body) = arg.strip_prefix("--") {
            if let Some((name, value)) = body.split_once('=') {
                if !CLI_LONG_FLAGS.contains(&name) {
                    engine_pairs.push((name.to_string(), value.to_string()));
                    continue;
                }
            }
        }
        cli_args.push(arg);
    }

    (cli_args, engine_pairs)
}

/// Resolve the effective server configuration.
///
/// Precedence: CLI flags over bootstrap file values over built-in
/// defaults. Engine option pairs are applied last; unrecognized names are
/// dropped, ill-typed values are an error.
pub fn resolve_config(cli: &Cli, engine_pairs: &[(String, String)]) -> anyhow::Result<ServerConfig> {
    let mut config = match &cli.config {
        Some(path) => ConfigFile::from_file(path)?.into_config(),
        None => ServerConfig::default(),
    };

    if let Some(Some(ref host)) = cli.host {
        config.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if cli.daemonize {
        config.daemonize = true;
    }
    if let Some(ref pid_file) = cli.pid_file {
        config.pid_file = Some(pid_file.clone());
    }

    config
        .engine
        .apply_pairs(engine_pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())))?;

    Ok(config)
}
