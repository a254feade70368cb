#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! HTTP transport for karaoke session settlement.
//!
//! # Modules
//!
//! - [`client`] - [`SettlementClient`], which dispatches built requests to a
//!   settlement action
//! - [`remote_signer`] - [`RemoteSigner`], a threshold signer backed by a
//!   signing node
//! - [`error`] - Transport error types
//!
//! # Feature Flags
//!
//! - `telemetry` - Tracing spans around outbound requests

pub mod client;
pub mod error;
pub mod remote_signer;

mod transport;

pub use client::{Health, SettlementClient};
pub use error::ClientError;
pub use remote_signer::RemoteSigner;
