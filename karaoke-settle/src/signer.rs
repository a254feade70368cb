//! The "sign with distributed key" capability.
//!
//! Settlement never holds key material. It hands a digest to a
//! [`ThresholdSigner`], which asks the key-share quorum named by a PKP public
//! key to produce an ECDSA signature. Backends live in other crates: a local
//! key-share keyring in `karaoke-settle-evm` and an HTTP signing-node client
//! in `karaoke-settle-http`.

use std::sync::Arc;

use alloy_primitives::{B256, Signature};
use serde::{Deserialize, Serialize};

use crate::error::SigningError;
use crate::types::PkpPublicKey;

/// Default name attached to settlement signature requests.
pub const DEFAULT_SIG_NAME: &str = "settlementSig";

/// A single threshold-signing request: `{ toSign, publicKey, sigName }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignRequest {
    /// 32-byte digest to sign. Signed as-is, with no message prefix.
    pub to_sign: B256,
    /// Key naming the signing quorum.
    pub public_key: PkpPublicKey,
    /// Label identifying this signature among others in the same round.
    pub sig_name: String,
}

/// A backend that can obtain a threshold ECDSA signature.
///
/// A call may take several seconds while signing nodes run their protocol.
/// Implementations must not retry internally: a blind retry can produce a
/// second valid signature for the same settlement.
#[async_trait::async_trait]
pub trait ThresholdSigner: Send + Sync {
    /// Signs `request.to_sign` with the quorum of `request.public_key`.
    ///
    /// # Errors
    ///
    /// Returns [`SigningError`] if the quorum is unknown, unreachable, or the
    /// round fails.
    async fn sign(&self, request: &SignRequest) -> Result<Signature, SigningError>;
}

#[async_trait::async_trait]
impl<T: ThresholdSigner + ?Sized> ThresholdSigner for Arc<T> {
    async fn sign(&self, request: &SignRequest) -> Result<Signature, SigningError> {
        (**self).sign(request).await
    }
}

#[async_trait::async_trait]
impl<T: ThresholdSigner + ?Sized> ThresholdSigner for Box<T> {
    async fn sign(&self, request: &SignRequest) -> Result<Signature, SigningError> {
        (**self).sign(request).await
    }
}
