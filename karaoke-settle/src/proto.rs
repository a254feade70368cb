//! Wire format of the settlement action.
//!
//! The action is a JSON-in/JSON-out call:
//!
//! ```json
//! { "userId": "0x…", "sessionId": "0x…", "creditsUsed": 30, "pkpPublicKey": "0x04…" }
//! ```
//!
//! answered by either
//!
//! ```json
//! { "success": true,
//!   "settlement": { "userId": "0x…", "sessionId": "0x…", "creditsUsed": "30",
//!                   "messageHash": "0x…", "timestamp": 1700000000 },
//!   "signature": "0x…(65 bytes)" }
//! ```
//!
//! or `{ "success": false, "error": "…", "errorKind": "missingParameter" }`.

use alloy_primitives::{Address, B256, Signature, SignatureError, hex};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::encoding::CanonicalMessage;
use crate::error::{ErrorKind, SettlementError};
use crate::timestamp::UnixTimestamp;
use crate::types::{Credits, SettlementRequest};

/// Loosely-typed request parameters exactly as received.
///
/// Every field is an arbitrary JSON value so that absent, `null` and
/// wrongly-typed inputs all reach validation instead of failing
/// deserialization as a whole.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementParams {
    /// Paying account address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Value>,
    /// 32-byte session identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Value>,
    /// Non-negative integer credit count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credits_used: Option<Value>,
    /// PKP public key naming the signing quorum.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pkp_public_key: Option<Value>,
}

impl From<&SettlementRequest> for SettlementParams {
    fn from(request: &SettlementRequest) -> Self {
        Self {
            user_id: Some(Value::String(request.user_id.to_checksum(None))),
            session_id: Some(Value::String(request.session_id.to_string())),
            credits_used: Some(Value::String(request.credits_used.to_string())),
            pkp_public_key: Some(Value::String(request.pkp_public_key.to_string())),
        }
    }
}

/// What was signed, echoed back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementReceipt {
    /// Paying account. Serialized in EIP-55 mixed case.
    #[serde(serialize_with = "checksummed")]
    pub user_id: Address,
    /// Practice session identifier.
    pub session_id: B256,
    /// Credits to decrement.
    pub credits_used: Credits,
    /// Keccak-256 digest of the packed message; the value actually signed.
    pub message_hash: B256,
    /// Signer wall-clock time. Not part of the signed payload.
    pub timestamp: UnixTimestamp,
}

impl SettlementReceipt {
    /// Re-packs the echoed fields into the message the contract will rebuild.
    #[must_use]
    pub fn canonical_message(&self) -> CanonicalMessage {
        CanonicalMessage::encode(&self.user_id, &self.session_id, &self.credits_used)
    }
}

/// Response of the settlement action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettlementResponse {
    /// The digest was signed.
    Success {
        /// Signed fields and digest.
        settlement: SettlementReceipt,
        /// ECDSA signature over `settlement.message_hash`.
        signature: Signature,
    },
    /// Settlement not recorded; credits not reconciled.
    Failure {
        /// Human-readable description.
        error: String,
        /// Machine-readable error tag.
        kind: ErrorKind,
    },
}

impl SettlementResponse {
    /// Returns `true` if the settlement was signed.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Returns the error tag of a failed settlement.
    #[must_use]
    pub const fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { kind, .. } => Some(*kind),
        }
    }

    /// Checks a successful response before it is submitted on-chain.
    ///
    /// Recomputes the digest from the echoed fields, compares it with the
    /// returned `messageHash`, recovers the signer from the signature and
    /// compares it with `expected_signer` (the PKP address).
    ///
    /// # Errors
    ///
    /// Returns [`VerificationError`] describing the first mismatch.
    pub fn verify(&self, expected_signer: Address) -> Result<&SettlementReceipt, VerificationError> {
        let (settlement, signature) = match self {
            Self::Success {
                settlement,
                signature,
            } => (settlement, signature),
            Self::Failure { error, .. } => {
                return Err(VerificationError::NotSigned(error.clone()));
            }
        };
        let recomputed = settlement.canonical_message().hash();
        if recomputed != settlement.message_hash {
            return Err(VerificationError::HashMismatch {
                returned: settlement.message_hash,
                recomputed,
            });
        }
        let recovered = signature.recover_address_from_prehash(&settlement.message_hash)?;
        if recovered != expected_signer {
            return Err(VerificationError::SignerMismatch {
                expected: expected_signer,
                recovered,
            });
        }
        Ok(settlement)
    }
}

impl From<SettlementError> for SettlementResponse {
    fn from(error: SettlementError) -> Self {
        Self::Failure {
            kind: error.kind(),
            error: error.to_string(),
        }
    }
}

/// Client-side rejection of a settlement response.
#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    /// The action reported failure.
    #[error("settlement was not signed: {0}")]
    NotSigned(String),
    /// The echoed fields do not hash to the returned digest.
    #[error("message hash mismatch: returned {returned}, recomputed {recomputed}")]
    HashMismatch {
        /// Digest in the response.
        returned: B256,
        /// Digest of the echoed fields.
        recomputed: B256,
    },
    /// The signature could not be recovered.
    #[error("invalid signature: {0}")]
    Recovery(#[from] SignatureError),
    /// Recovered signer is not the PKP address.
    #[error("signature recovers to {recovered}, expected {expected}")]
    SignerMismatch {
        /// PKP address.
        expected: Address,
        /// Address recovered from the signature.
        recovered: Address,
    },
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettlementResponseWire {
    success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    settlement: Option<SettlementReceipt>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "signature_hex"
    )]
    signature: Option<Signature>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error_kind: Option<ErrorKind>,
}

impl Serialize for SettlementResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let wire = match self {
            Self::Success {
                settlement,
                signature,
            } => SettlementResponseWire {
                success: true,
                settlement: Some(settlement.clone()),
                signature: Some(*signature),
                error: None,
                error_kind: None,
            },
            Self::Failure { error, kind } => SettlementResponseWire {
                success: false,
                settlement: None,
                signature: None,
                error: Some(error.clone()),
                error_kind: Some(*kind),
            },
        };
        wire.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SettlementResponse {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = SettlementResponseWire::deserialize(deserializer)?;
        if wire.success {
            let settlement = wire
                .settlement
                .ok_or_else(|| serde::de::Error::missing_field("settlement"))?;
            let signature = wire
                .signature
                .ok_or_else(|| serde::de::Error::missing_field("signature"))?;
            Ok(Self::Success {
                settlement,
                signature,
            })
        } else {
            let error = wire
                .error
                .ok_or_else(|| serde::de::Error::missing_field("error"))?;
            // Older actions return only a message; those failures came from the signing step.
            let kind = wire.error_kind.unwrap_or(ErrorKind::Signing);
            Ok(Self::Failure { error, kind })
        }
    }
}

fn checksummed<S: Serializer>(address: &Address, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&address.to_checksum(None))
}

/// 65-byte `r ‖ s ‖ v` hex encoding, `v` in {27, 28}.
pub mod signature_hex {
    use super::{Deserialize, Deserializer, Serializer, Signature, hex};

    /// Serializes an optional signature as `0x`-prefixed hex.
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(
        signature: &Option<Signature>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match signature {
            Some(sig) => serializer.serialize_str(&hex::encode_prefixed(sig.as_bytes())),
            None => serializer.serialize_none(),
        }
    }

    /// Deserializes an optional `0x`-prefixed 65-byte signature.
    ///
    /// # Errors
    ///
    /// Fails on invalid hex or a wrong length.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Signature>, D::Error> {
        let Some(s) = Option::<String>::deserialize(deserializer)? else {
            return Ok(None);
        };
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        Signature::from_raw(&bytes)
            .map(Some)
            .map_err(serde::de::Error::custom)
    }
}
