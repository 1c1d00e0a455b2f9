//! Persisted startup state for deterministic restart.
//!
//! The full [`ServerConfig`] used at start time is written as JSON beside
//! the PID record. `restart` re-launches from this file instead of scraping
//! the process table for the original command line.

use std::fs;
use std::io;

use serde::{Deserialize, Serialize};
use tracing::info;

use gantry_common::{LifecycleError, ServerConfig};

use crate::daemon;
use crate::pidfile::LifecyclePaths;

/// The startup-state record: everything needed to re-launch this instance.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StartupState {
    /// The resolved configuration the server was started with.
    pub config: ServerConfig,
}

impl StartupState {
    /// Wrap a resolved configuration.
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Persist atomically beside the PID record.
    pub fn persist(&self, paths: &LifecyclePaths) -> Result<(), LifecycleError> {
        if let Some(dir) = paths.state_file.parent() {
            fs::create_dir_all(dir)?;
        }

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| LifecycleError::Io(io::Error::other(e)))?;

        let temp_path = paths.state_file.with_extension("json.tmp");
        fs::write(&temp_path, json)?;
        fs::rename(&temp_path, &paths.state_file)?;
        Ok(())
    }

    /// Load the persisted state, or fail with `RestartStateMissing`.
    pub fn load(paths: &LifecyclePaths) -> Result<Self, LifecycleError> {
        let content =
            fs::read_to_string(&paths.state_file).map_err(|_| LifecycleError::RestartStateMissing {
                state_file: paths.state_file.clone(),
            })?;

        serde_json::from_str(&content).map_err(|_| LifecycleError::RestartStateMissing {
            state_file: paths.state_file.clone(),
        })
    }

    /// Spawn a fresh detached server process from this state.
    ///
    /// Returns the PID of the spawned process. The new process writes its
    /// own PID record once its listener is bound.
    pub fn relaunch(&self) -> Result<u32, LifecycleError> {
        let args = self.config.to_args();
        let pid = daemon::spawn_detached(&args)?;
        info!(pid, addr = %self.config.bind_addr(), "relaunched server");
        Ok(pid)
    }
}

/// Remove the startup-state record. Idempotent.
pub fn remove(paths: &LifecyclePaths) -> io::Result<()> {
    match fs::remove_file(&paths.state_file) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_persist_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let paths = LifecyclePaths::new(dir.path().join("gantry.pid"));

        let config = ServerConfig::default().with_host("0.0.0.0").with_port(9999);
        let state = StartupState::new(config);

        state.persist(&paths).unwrap();
        let loaded = StartupState::load(&paths).unwrap();
        assert_eq!(loaded, state);
    }

    #[test]
    fn test_load_missing_state() {
        let dir = TempDir::new().unwrap();
        let paths = LifecyclePaths::new(dir.path().join("gantry.pid"));

        let err = StartupState::load(&paths).unwrap_err();
        assert!(matches!(err, LifecycleError::RestartStateMissing { .. }));
    }

    #[test]
    fn test_load_corrupt_state() {
        let dir = TempDir::new().unwrap();
        let paths = LifecyclePaths::new(dir.path().join("gantry.pid"));
        fs::write(&paths.state_file, "{ nonsense").unwrap();

        let err = StartupState::load(&paths).unwrap_err();
        assert!(matches!(err, LifecycleError::RestartStateMissing { .. }));
    }

    #[test]
    fn test_remove_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let paths = LifecyclePaths::new(dir.path().join("gantry.pid"));

        remove(&paths).unwrap();
        StartupState::new(ServerConfig::default())
            .persist(&paths)
            .unwrap();
        remove(&paths).unwrap();
        assert!(!paths.state_file.exists());
    }
}
