//! Settlement action server.
//!
//! Hosts the settlement signer behind a small HTTP API so browser clients can
//! obtain a PKP signature for a finished practice session.
//!
//! # Modules
//!
//! - [`handlers`] - Axum route handlers and router builder
//! - [`backend`] - Signing backend selection
//! - [`timeout`] - Signing round deadline
//! - [`error`] - Service error types
//! - [`config`] - Server configuration with environment variable expansion
//! - [`util`] - Shutdown signal handling

pub mod backend;
pub mod config;
pub mod error;
pub mod handlers;
pub mod timeout;
pub mod util;

pub use handlers::{ActionState, action_router};
