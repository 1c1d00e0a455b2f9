//! Process lifecycle control for gantry.
//!
//! This crate owns everything about the server *process* as opposed to the
//! server *traffic*:
//! - PID record I/O and liveness probing ([`pidfile`])
//! - stop / reload / restart / status control actions ([`control`])
//! - persisted startup state for deterministic restart ([`startup`])
//! - detached background re-execution ([`daemon`])
//!
//! The PID record is the sole identity of a running server, but presence of
//! the file alone is never trusted: every consumer validates it against an
//! OS-level liveness probe and cleans up stale records on detection.

pub mod control;
pub mod daemon;
pub mod pidfile;
pub mod startup;

pub use control::{reload, restart, status, stop};
pub use pidfile::{LifecyclePaths, Liveness};
pub use startup::StartupState;
