//! Solidity interface of the settlement contract.
//!
//! The contract rebuilds `keccak256(abi.encodePacked(user, sessionId, creditsUsed))`
//! from its call arguments, recovers the signer with `ecrecover`, and only
//! decrements credits when the signer is its trusted PKP. [`recover_call_signer`]
//! performs that same check off-chain, which lets clients reject a bad
//! signature before paying gas.

use alloy_primitives::{Address, Bytes, Signature, SignatureError};
use alloy_sol_types::sol;
use karaoke_settle::{CanonicalMessage, Credits, SettlementReceipt};

sol! {
    /// Session settlement contract surface used by clients.
    ///
    /// `settleSession` reverts with `UntrustedSigner` when the recovered address
    /// is not the configured PKP, and with `SessionAlreadySettled` on replay.
    #[allow(missing_docs)]
    #[derive(Debug)]
    interface ISessionSettlement {
        function settleSession(address user, bytes32 sessionId, uint256 creditsUsed, bytes signature) external;
        function trustedPkp() external view returns (address);
        function creditsOf(address user) external view returns (uint256);
        function isSettled(bytes32 sessionId) external view returns (bool);

        event SessionSettled(address indexed user, bytes32 indexed sessionId, uint256 creditsUsed);

        error UntrustedSigner(address recovered);
        error SessionAlreadySettled(bytes32 sessionId);
        error InsufficientCredits(address user, uint256 available, uint256 requested);
    }
}

/// Builds the `settleSession` call for a signed settlement.
#[must_use]
pub fn settle_session_call(
    receipt: &SettlementReceipt,
    signature: &Signature,
) -> ISessionSettlement::settleSessionCall {
    ISessionSettlement::settleSessionCall {
        user: receipt.user_id,
        sessionId: receipt.session_id,
        creditsUsed: receipt.credits_used.as_u256(),
        signature: Bytes::copy_from_slice(&signature.as_bytes()),
    }
}

/// Recovers the signer the contract would see for this call.
///
/// # Errors
///
/// Returns [`SignatureError`] if the signature bytes are not a 65-byte
/// `r ‖ s ‖ v` signature or do not recover to a valid key.
pub fn recover_call_signer(
    call: &ISessionSettlement::settleSessionCall,
) -> Result<Address, SignatureError> {
    let digest = CanonicalMessage::encode(
        &call.user,
        &call.sessionId,
        &Credits::from(call.creditsUsed),
    )
    .hash();
    Signature::from_raw(&call.signature)?.recover_address_from_prehash(&digest)
}
