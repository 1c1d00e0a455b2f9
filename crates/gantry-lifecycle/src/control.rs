//! Control actions against a running server: stop, reload, restart, status.
//!
//! All actions resolve the target through the PID record and re-validate it
//! with a liveness probe first. Stopping escalates SIGTERM -> SIGKILL with
//! bounded liveness polling between the two, so a process that exits
//! promptly is never force-killed and a stuck one cannot stall the CLI
//! forever.

use std::time::Duration;

use tokio::time::sleep;
use tracing::{info, warn};

use gantry_common::LifecycleError;

use crate::pidfile::{self, LifecyclePaths, Liveness};
use crate::startup::{self, StartupState};

const POLL_INTERVAL: Duration = Duration::from_millis(100);
/// Liveness polls granted after SIGTERM before escalating.
const TERM_POLLS: u32 = 30;
/// Liveness polls granted after SIGKILL before giving up.
const KILL_POLLS: u32 = 20;
/// Settle delay between stop and relaunch on restart.
const RESTART_SETTLE: Duration = Duration::from_millis(200);

/// Stop the recorded server process and remove its lifecycle records.
///
/// Fails with `NotRunning` before any signal is sent if no live PID record
/// exists. Returns the PID that was stopped.
pub async fn stop(paths: &LifecyclePaths) -> Result<u32, LifecycleError> {
    let pid = require_running(paths)?;
    terminate(pid).await?;
    pidfile::remove_pid(&paths.pid_file)?;
    startup::remove(paths)?;
    info!(pid, "server stopped");
    Ok(pid)
}

/// Ask the recorded server process to reload in place (SIGHUP).
///
/// What "reload" means is up to the running server: its signal handler
/// invokes the application's reload hook.
#[cfg(unix)]
pub fn reload(paths: &LifecyclePaths) -> Result<u32, LifecycleError> {
    use nix::errno::Errno;
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid;

    let pid = require_running(paths)?;

    match signal::kill(Pid::from_raw(pid as i32), Signal::SIGHUP) {
        Ok(()) => {
            info!(pid, "sent reload signal");
            Ok(pid)
        }
        Err(Errno::ESRCH) => {
            // Vanished between probe and signal; treat as not running.
            pidfile::remove_pid(&paths.pid_file)?;
            startup::remove(paths)?;
            Err(LifecycleError::not_running(&paths.pid_file))
        }
        Err(e) => Err(signal_error(pid, e)),
    }
}

#[cfg(not(unix))]
pub fn reload(_paths: &LifecyclePaths) -> Result<u32, LifecycleError> {
    Err(LifecycleError::Unsupported("reload"))
}

/// Restart the server from its persisted startup state.
///
/// Loads the state first so a missing record fails before the running
/// server is touched. Returns the PID of the relaunched process.
pub async fn restart(paths: &LifecyclePaths) -> Result<u32, LifecycleError> {
    let state = StartupState::load(paths)?;
    stop(paths).await?;
    sleep(RESTART_SETTLE).await;
    state.relaunch()
}

/// The PID of the live server, if any. Stale records are cleaned up.
pub fn status(paths: &LifecyclePaths) -> Result<Option<u32>, LifecycleError> {
    pidfile::current_pid(paths)
}

fn require_running(paths: &LifecyclePaths) -> Result<u32, LifecycleError> {
    pidfile::current_pid(paths)?.ok_or_else(|| LifecycleError::not_running(&paths.pid_file))
}

/// SIGTERM, bounded liveness polling, then SIGKILL and a final poll.
#[cfg(unix)]
async fn terminate(pid: u32) -> Result<(), LifecycleError> {
    use nix::errno::Errno;
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid;

    let target = Pid::from_raw(pid as i32);

    match signal::kill(target, Signal::SIGTERM) {
        Ok(()) => {}
        Err(Errno::ESRCH) => return Ok(()),
        Err(e) => return Err(signal_error(pid, e)),
    }

    for _ in 0..TERM_POLLS {
        sleep(POLL_INTERVAL).await;
        if pidfile::probe(pid) == Liveness::Dead {
            return Ok(());
        }
    }

    warn!(pid, "graceful window elapsed, sending SIGKILL");
    match signal::kill(target, Signal::SIGKILL) {
        Ok(()) => {}
        Err(Errno::ESRCH) => return Ok(()),
        Err(e) => return Err(signal_error(pid, e)),
    }

    for _ in 0..KILL_POLLS {
        sleep(POLL_INTERVAL).await;
        if pidfile::probe(pid) == Liveness::Dead {
            return Ok(());
        }
    }

    Err(LifecycleError::StopTimeout { pid })
}

#[cfg(not(unix))]
async fn terminate(_pid: u32) -> Result<(), LifecycleError> {
    Err(LifecycleError::Unsupported("stop"))
}

#[cfg(unix)]
fn signal_error(pid: u32, errno: nix::errno::Errno) -> LifecycleError {
    LifecycleError::Signal {
        pid,
        source: std::io::Error::from_raw_os_error(errno as i32),
    }
}
