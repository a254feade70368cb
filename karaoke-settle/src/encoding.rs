//! Packed ABI encoding shared with the verifying contract.
//!
//! The settlement contract recomputes
//! `keccak256(abi.encodePacked(userId, sessionId, creditsUsed))` from its call
//! arguments and recovers the signer from that digest. The bytes produced here
//! must match that reconstruction exactly, or recovery yields a different
//! address and the settlement is rejected on-chain.
//!
//! Packed layout (84 bytes, no padding between fields):
//!
//! | offset | width | field         | Solidity type |
//! |--------|-------|---------------|---------------|
//! | 0      | 20    | `userId`      | `address`     |
//! | 20     | 32    | `sessionId`   | `bytes32`     |
//! | 52     | 32    | `creditsUsed` | `uint256`     |
//!
//! The digest is signed as-is. An EIP-191 "Ethereum Signed Message" prefix, if
//! the verifier uses one, is applied only during on-chain recovery.

use alloy_primitives::{Address, B256, keccak256};
use alloy_sol_types::SolValue;

use crate::timestamp::UnixTimestamp;
use crate::types::Credits;

/// Length of the packed `(address, bytes32, uint256)` message.
pub const CANONICAL_MESSAGE_LEN: usize = 20 + 32 + 32;

/// The exact bytes whose Keccak-256 digest is threshold-signed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalMessage(Vec<u8>);

impl CanonicalMessage {
    /// Packs `(address, bytes32, uint256)` in contract order.
    #[must_use]
    pub fn encode(user_id: &Address, session_id: &B256, credits_used: &Credits) -> Self {
        let packed = (*user_id, *session_id, credits_used.as_u256()).abi_encode_packed();
        debug_assert_eq!(packed.len(), CANONICAL_MESSAGE_LEN);
        Self(packed)
    }

    /// Returns the packed bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Keccak-256 digest of the packed bytes; the value that gets signed.
    #[must_use]
    pub fn hash(&self) -> B256 {
        keccak256(&self.0)
    }
}

impl AsRef<[u8]> for CanonicalMessage {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Derives a session identifier from who practiced what, and when.
///
/// `keccak256(abi.encodePacked(address user, uint64 startedAt, string songId))`.
/// Two sessions collide only if the same user starts the same song within the
/// same second.
#[must_use]
pub fn derive_session_id(user: &Address, song_id: &str, started_at: UnixTimestamp) -> B256 {
    let mut packed = Vec::with_capacity(20 + 8 + song_id.len());
    packed.extend_from_slice(user.as_slice());
    packed.extend_from_slice(&started_at.to_be_bytes());
    packed.extend_from_slice(song_id.as_bytes());
    keccak256(packed)
}
