//! Common types, errors, and configuration for gantry.
//!
//! This crate provides shared functionality used across the gantry workspace:
//! - Error types using `thiserror` for type-safe error handling
//! - Server and engine configuration structures
//! - TOML bootstrap file loading

pub mod config;
pub mod config_file;
pub mod error;

pub use config::{EngineOptions, OPTION_NAMES, OptionValueError, ServerConfig};
pub use config_file::{ConfigFile, ConfigFileError};
pub use error::{DispatchError, LifecycleError, ServerError};
