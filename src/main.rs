//! Gantry CLI entry point.
//!
//! One binary covers both sides of the lifecycle: `gantry` (no action)
//! starts the server, in the foreground or detached with `-d`; `stop`,
//! `reload`, `restart`, and `status` act on the instance recorded in the
//! PID file.

mod cli;

use std::sync::Arc;

use anyhow::Context;
use clap::{CommandFactory, Parser};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gantry_bridge::{BridgeServer, EchoApp};
use gantry_common::{LifecycleError, ServerConfig};
use gantry_lifecycle::{LifecyclePaths, daemon, pidfile};

use crate::cli::{Action, Cli};

fn main() -> anyhow::Result<()> {
    let (args, engine_pairs) = cli::split_engine_options(std::env::args().collect());
    let cli = Cli::parse_from(args);

    if cli.wants_usage() {
        Cli::command().print_help()?;
        return Ok(());
    }

    let config = cli::resolve_config(&cli, &engine_pairs)?;

    init_tracing(&config)?;

    if cli.action() == Action::Start {
        return start(config);
    }

    let paths = LifecyclePaths::resolve(config.pid_file.as_deref());
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build runtime")?;

    runtime.block_on(async {
        match cli.action() {
            Action::Stop => {
                let pid = gantry_lifecycle::stop(&paths).await?;
                println!("gantry stopped (pid {pid})");
            }
            Action::Reload => {
                let pid = gantry_lifecycle::reload(&paths)?;
                println!("sent reload signal to gantry (pid {pid})");
            }
            Action::Restart => {
                let pid = gantry_lifecycle::restart(&paths).await?;
                println!("gantry restarted (pid {pid})");
            }
            Action::Status => match gantry_lifecycle::status(&paths)? {
                Some(pid) => println!("gantry is running (pid {pid})"),
                None => println!("gantry is not running"),
            },
            Action::Start => {}
        }
        Ok(())
    })
}

/// Start the server, detaching first if requested.
fn start(config: ServerConfig) -> anyhow::Result<()> {
    if config.daemonize && !daemon::already_detached() {
        // The detached child's stdio is null, so a duplicate start has to
        // fail here in the parent to be visible at all.
        ensure_not_running(&config)?;
        let pid = daemon::spawn_detached(&config.to_args())
            .context("failed to spawn background process")?;
        println!("gantry started in background (pid {pid})");
        return Ok(());
    }

    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();
    if let Some(n) = config.engine.worker_threads {
        builder.worker_threads(n);
    }
    let runtime = builder.build().context("failed to build runtime")?;

    info!(addr = %config.bind_addr(), "starting gantry");

    runtime.block_on(async {
        let server = BridgeServer::new(config, Arc::new(EchoApp));
        server.run().await
    })?;

    Ok(())
}

/// Fail with `AlreadyRunning` if a live server is recorded at the
/// configured PID file. Stale records are cleaned up and start proceeds.
fn ensure_not_running(config: &ServerConfig) -> Result<(), LifecycleError> {
    let paths = LifecyclePaths::resolve(config.pid_file.as_deref());
    match pidfile::current_pid(&paths)? {
        Some(pid) => Err(LifecycleError::AlreadyRunning { pid }),
        None => Ok(()),
    }
}

/// Initialize tracing from the resolved engine options.
///
/// `log_level` takes precedence over `RUST_LOG`; `log_file` routes output
/// to a file (appending) instead of stderr.
fn init_tracing(config: &ServerConfig) -> anyhow::Result<()> {
    let filter = match &config.engine.log_level {
        Some(level) => tracing_subscriber::EnvFilter::try_new(level)
            .with_context(|| format!("invalid log_level {level:?}"))?,
        None => tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "info,gantry=debug".into()),
    };

    let registry = tracing_subscriber::registry().with(filter);

    match &config.engine.log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(Arc::new(file))
                        .with_ansi(false),
                )
                .init();
        }
        None => {
            registry.with(tracing_subscriber::fmt::layer()).init();
        }
    }

    Ok(())
}
