//! Detached background execution.
//!
//! Instead of fork(2), a background server is produced by re-executing the
//! current binary in a new process group with stdio detached. The child
//! carries a marker environment variable so it never tries to detach again.

use std::io;
use std::process::{Command, Stdio};

use tracing::debug;

/// Marker set on detached children to break the re-exec recursion.
pub const DETACH_ENV: &str = "GANTRY_DETACHED";

/// Whether this process was spawned as a detached child.
pub fn already_detached() -> bool {
    std::env::var_os(DETACH_ENV).is_some()
}

/// Re-execute the current binary detached, with the given arguments.
///
/// The child gets its own process group, null stdio, and the detach marker.
/// Returns the child PID. The caller (foreground CLI) is expected to exit
/// shortly after.
pub fn spawn_detached(args: &[String]) -> io::Result<u32> {
    let exe = std::env::current_exe()?;

    let mut cmd = Command::new(exe);
    cmd.args(args)
        .env(DETACH_ENV, "1")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    let child = cmd.spawn()?;
    let pid = child.id();
    debug!(pid, "spawned detached process");
    Ok(pid)
}
