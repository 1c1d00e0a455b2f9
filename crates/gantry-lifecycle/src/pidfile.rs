//! PID record I/O and process liveness probing.
//!
//! Format: a single line of text holding the decimal PID.
//!
//! Writes go through a temp file + rename so concurrent readers never see a
//! partial record. Reads that find a recorded PID always re-validate it
//! against the OS before trusting it; a record whose process is gone is
//! removed on the spot.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use gantry_common::LifecycleError;

/// Default PID file name under the system temp directory.
const DEFAULT_PID_FILE: &str = "gantry.pid";

/// Resolved locations of the lifecycle records for one server instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecyclePaths {
    /// The PID record.
    pub pid_file: PathBuf,
    /// The persisted startup configuration, kept beside the PID record.
    pub state_file: PathBuf,
}

impl LifecyclePaths {
    /// Derive both record paths from a PID file location.
    pub fn new(pid_file: impl Into<PathBuf>) -> Self {
        let pid_file = pid_file.into();
        let state_file = pid_file.with_extension("state.json");
        Self {
            pid_file,
            state_file,
        }
    }

    /// Resolve paths from an optional override, defaulting to
    /// `<tmp>/gantry.pid`.
    pub fn resolve(pid_file: Option<&Path>) -> Self {
        match pid_file {
            Some(path) => Self::new(path),
            None => Self::new(std::env::temp_dir().join(DEFAULT_PID_FILE)),
        }
    }
}

impl Default for LifecyclePaths {
    fn default() -> Self {
        Self::resolve(None)
    }
}

/// Result of an OS-level process liveness probe.
///
/// Tri-state rather than boolean so that a permission failure is never
/// mistaken for "not running".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    /// The process exists and is signalable.
    Alive,
    /// No process with that PID exists.
    Dead,
    /// A process exists but we may not signal it.
    PermissionDenied,
}

/// Probe a PID with the null signal (`kill(pid, 0)`).
#[cfg(unix)]
pub fn probe(pid: u32) -> Liveness {
    use nix::errno::Errno;
    use nix::sys::signal;
    use nix::unistd::Pid;

    match signal::kill(Pid::from_raw(pid as i32), None) {
        Ok(()) => Liveness::Alive,
        Err(Errno::ESRCH) => Liveness::Dead,
        Err(_) => Liveness::PermissionDenied,
    }
}

/// Liveness probing is unavailable off Unix; report `Dead` so control
/// actions fail with `NotRunning` instead of signalling blindly.
#[cfg(not(unix))]
pub fn probe(_pid: u32) -> Liveness {
    Liveness::Dead
}

/// Write the PID record atomically (temp file + rename).
pub fn write_pid(path: &Path, pid: u32) -> io::Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }

    let temp_path = path.with_extension("pid.tmp");
    fs::write(&temp_path, format!("{pid}\n"))?;
    fs::rename(&temp_path, path)?;

    debug!(path = %path.display(), pid, "wrote PID record");
    Ok(())
}

/// Read the recorded PID. Returns `None` if no record exists.
pub fn read_pid(path: &Path) -> io::Result<Option<u32>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };

    let pid = content
        .trim()
        .parse::<u32>()
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "malformed PID record"))?;

    Ok(Some(pid))
}

/// Remove the PID record. Idempotent: a missing file is not an error.
pub fn remove_pid(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// The PID of the live server, if any.
///
/// Validates the record against a liveness probe. A stale record (the
/// process is gone) or a malformed one is deleted together with the startup
/// state, and `None` is returned. `PermissionDenied` counts as running:
/// something is there, we just cannot touch it.
pub fn current_pid(paths: &LifecyclePaths) -> Result<Option<u32>, LifecycleError> {
    let pid = match read_pid(&paths.pid_file) {
        Ok(Some(pid)) => pid,
        Ok(None) => return Ok(None),
        Err(e) if e.kind() == io::ErrorKind::InvalidData => {
            warn!(path = %paths.pid_file.display(), "removing malformed PID record");
            remove_pid(&paths.pid_file)?;
            crate::startup::remove(paths)?;
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };

    match probe(pid) {
        Liveness::Alive | Liveness::PermissionDenied => Ok(Some(pid)),
        Liveness::Dead => {
            warn!(pid, "removing stale PID record");
            remove_pid(&paths.pid_file)?;
            crate::startup::remove(paths)?;
            Ok(None)
        }
    }
}

/// Whether a live server is recorded at these paths.
pub fn is_running(paths: &LifecyclePaths) -> bool {
    matches!(current_pid(paths), Ok(Some(_)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_paths(dir: &TempDir) -> LifecyclePaths {
        LifecyclePaths::new(dir.path().join("gantry.pid"))
    }

    #[test]
    fn test_paths_derivation() {
        let paths = LifecyclePaths::new("/tmp/gantry.pid");
        assert_eq!(paths.state_file, PathBuf::from("/tmp/gantry.state.json"));

        let default = LifecyclePaths::resolve(None);
        assert!(default.pid_file.ends_with("gantry.pid"));
    }

    #[test]
    fn test_write_read_remove_round_trip() {
        let dir = TempDir::new().unwrap();
        let paths = temp_paths(&dir);

        assert_eq!(read_pid(&paths.pid_file).unwrap(), None);

        write_pid(&paths.pid_file, 4242).unwrap();
        assert_eq!(read_pid(&paths.pid_file).unwrap(), Some(4242));

        remove_pid(&paths.pid_file).unwrap();
        assert_eq!(read_pid(&paths.pid_file).unwrap(), None);

        // Second remove is idempotent.
        remove_pid(&paths.pid_file).unwrap();
    }

    #[test]
    fn test_malformed_record_is_an_error() {
        let dir = TempDir::new().unwrap();
        let paths = temp_paths(&dir);
        fs::write(&paths.pid_file, "not-a-pid\n").unwrap();

        let err = read_pid(&paths.pid_file).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    #[cfg(unix)]
    fn test_probe_self_is_alive() {
        assert_eq!(probe(std::process::id()), Liveness::Alive);
    }

    #[test]
    #[cfg(unix)]
    fn test_probe_impossible_pid_is_dead() {
        assert_eq!(probe(999_999), Liveness::Dead);
    }

    #[test]
    fn test_current_pid_cleans_up_malformed_record() {
        let dir = TempDir::new().unwrap();
        let paths = temp_paths(&dir);
        fs::write(&paths.pid_file, "not-a-pid\n").unwrap();

        assert_eq!(current_pid(&paths).unwrap(), None);
        // The garbage record was deleted on detection.
        assert!(!paths.pid_file.exists());
    }

    #[test]
    #[cfg(unix)]
    fn test_current_pid_cleans_up_stale_record() {
        let dir = TempDir::new().unwrap();
        let paths = temp_paths(&dir);

        write_pid(&paths.pid_file, 999_999).unwrap();
        assert_eq!(current_pid(&paths).unwrap(), None);
        // Stale record was deleted on detection.
        assert!(!paths.pid_file.exists());
    }

    #[test]
    #[cfg(unix)]
    fn test_is_running_for_live_record() {
        let dir = TempDir::new().unwrap();
        let paths = temp_paths(&dir);

        assert!(!is_running(&paths));
        write_pid(&paths.pid_file, std::process::id()).unwrap();
        assert!(is_running(&paths));

        remove_pid(&paths.pid_file).unwrap();
        assert!(!is_running(&paths));
    }
}
