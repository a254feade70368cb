#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! EVM support for karaoke session settlement.
//!
//! - [`keyring`] - [`LocalKeyShareSigner`], an in-process threshold signer
//!   backed by Alloy local signers
//! - [`contract`] - The settlement contract interface and an off-chain
//!   replica of its signer check
//!
//! # Feature Flags
//!
//! - `telemetry` - Tracing for key-share signing

pub mod contract;
pub mod keyring;

pub use contract::{ISessionSettlement, recover_call_signer, settle_session_call};
pub use keyring::{KeyShare, KeyringError, LocalKeyShareSigner};
