#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Core types for karaoke session settlement.
//!
//! When a learner finishes a practice session, the client reports how many
//! credits the session consumed. A remote action packs
//! `(userId, sessionId, creditsUsed)` exactly as the settlement contract's
//! `abi.encodePacked` does, hashes it with Keccak-256, and has a distributed
//! key (a PKP) threshold-sign the digest. The client submits that signature
//! on-chain, where the contract recovers the signer and decrements credits.
//!
//! # Modules
//!
//! - [`builder`] - Client-side request construction and validation
//! - [`encoding`] - Packed ABI encoding shared with the verifying contract
//! - [`error`] - Closed error taxonomy carried on the wire
//! - [`proto`] - JSON wire types and client-side response verification
//! - [`settle`] - The settlement signer pipeline
//! - [`signer`] - The injected threshold-signing capability
//! - [`timestamp`] - Unix timestamps
//! - [`types`] - Typed request values and field parsing
//!
//! # Feature Flags
//!
//! - `telemetry` - Enables tracing instrumentation of the signing pipeline

pub mod builder;
pub mod encoding;
pub mod error;
pub mod proto;
pub mod settle;
pub mod signer;
pub mod timestamp;
pub mod types;

pub use builder::{SessionTelemetry, SettlementRequestBuilder};
pub use encoding::{CanonicalMessage, derive_session_id};
pub use error::{ErrorKind, SettlementError, SigningError};
pub use proto::{SettlementParams, SettlementReceipt, SettlementResponse, VerificationError};
pub use settle::{SettlementSigner, SignedSettlement};
pub use signer::{SignRequest, ThresholdSigner};
pub use types::{Credits, PkpPublicKey, SettlementRequest};
