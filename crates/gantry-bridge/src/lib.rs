//! Request bridge between the embedded HTTP engine and the application.
//!
//! This crate connects two collaborators it does not implement: the HTTP
//! engine (tokio + axum + hyper, which owns sockets, the event loop, and
//! connection handling) and the application behind the [`Dispatch`] trait
//! (which owns routing and business logic). On each request it:
//!
//! - builds an explicit [`RequestContext`] (headers, query, form, cookies,
//!   uploaded files, raw body) fresh for the request
//! - snapshots application singleton state, dispatches, restores the
//!   snapshot, so state never leaks between requests of a long-lived process
//! - translates the returned [`AppResponse`] (status, headers, cookies,
//!   body) back into the engine's response
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use gantry_bridge::{BridgeServer, EchoApp};
//! use gantry_common::ServerConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::default();
//!     let server = BridgeServer::new(config, Arc::new(EchoApp));
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod dispatch;
pub mod echo;
pub mod handler;
pub mod request;
pub mod response;
pub mod router;
pub mod server;
pub mod state;

pub use dispatch::{Dispatch, OutputBuffer, StateSnapshot};
pub use echo::EchoApp;
pub use request::{RequestContext, UploadedFile};
pub use response::{AppResponse, Cookie};
pub use server::{BridgeServer, TestHandle};
pub use state::BridgeState;
