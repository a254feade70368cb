//! Local key-share signing.
//!
//! [`LocalKeyShareSigner`] holds key material in-process and answers signing
//! requests for the PKPs whose keys it holds. It stands in for a signing-node
//! quorum in development and tests. Because the digest is signed with RFC 6979
//! nonces, the same digest and key always yield the same signature, exactly
//! as a quorum would.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use alloy_primitives::{Address, B256, Signature};
use alloy_signer_local::PrivateKeySigner;
use karaoke_settle::{PkpPublicKey, SignRequest, SigningError, ThresholdSigner};

/// A signing key that can act for one PKP.
///
/// Implemented for [`PrivateKeySigner`] and for `Arc`-wrapped shares so one
/// key can back several keyrings without copying the secret.
pub trait KeyShare: Send + Sync {
    /// Address controlled by this share's key.
    fn address(&self) -> Address;

    /// Signs a 32-byte digest without any prefix.
    fn sign_hash(
        &self,
        hash: &B256,
    ) -> impl Future<Output = Result<Signature, alloy_signer::Error>> + Send;
}

impl KeyShare for PrivateKeySigner {
    fn address(&self) -> Address {
        Self::address(self)
    }

    async fn sign_hash(&self, hash: &B256) -> Result<Signature, alloy_signer::Error> {
        alloy_signer::Signer::sign_hash(self, hash).await
    }
}

impl<T: KeyShare> KeyShare for Arc<T> {
    fn address(&self) -> Address {
        (**self).address()
    }

    async fn sign_hash(&self, hash: &B256) -> Result<Signature, alloy_signer::Error> {
        (**self).sign_hash(hash).await
    }
}

/// A private key in the keyring configuration could not be parsed.
#[derive(Debug, thiserror::Error)]
#[error("invalid private key at position {index}: {reason}")]
pub struct KeyringError {
    /// Zero-based position of the key in the input.
    pub index: usize,
    /// Parser message. Never contains the key itself.
    pub reason: String,
}

/// In-process [`ThresholdSigner`] keyed by PKP address.
///
/// A request is routed by deriving the Ethereum address of its PKP public key;
/// a share whose key controls that address signs it.
pub struct LocalKeyShareSigner<K = PrivateKeySigner> {
    shares: HashMap<Address, K>,
}

impl<K> std::fmt::Debug for LocalKeyShareSigner<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalKeyShareSigner")
            .field("pkps", &self.shares.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<K> Default for LocalKeyShareSigner<K> {
    fn default() -> Self {
        Self {
            shares: HashMap::new(),
        }
    }
}

impl<K: KeyShare> LocalKeyShareSigner<K> {
    /// Creates an empty keyring.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a share, returning the keyring.
    #[must_use]
    pub fn with_share(mut self, share: K) -> Self {
        self.insert(share);
        self
    }

    /// Adds a share, returning any share it replaced for the same address.
    pub fn insert(&mut self, share: K) -> Option<K> {
        self.shares.insert(share.address(), share)
    }

    /// Returns `true` if a share for this PKP is held.
    #[must_use]
    pub fn holds(&self, pkp: &PkpPublicKey) -> bool {
        self.shares.contains_key(&pkp.address())
    }

    /// Addresses of all held PKPs, sorted.
    #[must_use]
    pub fn addresses(&self) -> Vec<Address> {
        let mut addresses: Vec<_> = self.shares.keys().copied().collect();
        addresses.sort_unstable();
        addresses
    }

    /// Number of held shares.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shares.len()
    }

    /// Returns `true` if no share is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shares.is_empty()
    }
}

impl LocalKeyShareSigner<PrivateKeySigner> {
    /// Builds a keyring from hex private keys (with or without `0x`).
    ///
    /// # Errors
    ///
    /// Returns [`KeyringError`] for the first key that fails to parse.
    pub fn from_private_keys<I, S>(keys: I) -> Result<Self, KeyringError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut keyring = Self::new();
        for (index, key) in keys.into_iter().enumerate() {
            let share: PrivateKeySigner =
                key.as_ref().trim().parse().map_err(|e| KeyringError {
                    index,
                    reason: format!("{e}"),
                })?;
            keyring.insert(share);
        }
        Ok(keyring)
    }
}

#[async_trait::async_trait]
impl<K: KeyShare> ThresholdSigner for LocalKeyShareSigner<K> {
    async fn sign(&self, request: &SignRequest) -> Result<Signature, SigningError> {
        let pkp_address = request.public_key.address();
        let share = self
            .shares
            .get(&pkp_address)
            .ok_or_else(|| SigningError::UnknownKey(request.public_key.to_string()))?;
        #[cfg(feature = "telemetry")]
        tracing::debug!(pkp = %pkp_address, sig_name = %request.sig_name, "signing with local key share");
        share
            .sign_hash(&request.to_sign)
            .await
            .map_err(|e| SigningError::Backend(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{address, b256};
    use karaoke_settle::{ErrorKind, SettlementParams, SettlementResponse, SettlementSigner};
    use serde_json::json;

    const PRIVATE_KEY: &str = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";
    const PKP: &str = "0x044e3b81af9c2234cad09d679ce6035ed1392347ce64ce405f5dcd36228a25de6e47fd35c4215d1edf53e6f83de344615ce719bdb0fd878f6ed76f06dd277956de";
    const PKP_ADDRESS: Address = address!("0x2c7536E3605D9C16a7a3D7b1898e529396a65c23");

    fn params(session_id: &str, pkp: &str) -> SettlementParams {
        SettlementParams {
            user_id: Some(json!("0x8C9c3F5B86E83F3C03e909dC46b5C599Cb0AF89C")),
            session_id: Some(json!(session_id)),
            credits_used: Some(json!(30)),
            pkp_public_key: Some(json!(pkp)),
        }
    }

    #[test]
    fn test_keyring_routes_by_pkp_address() {
        let keyring = LocalKeyShareSigner::from_private_keys([PRIVATE_KEY]).unwrap();
        assert_eq!(keyring.addresses(), vec![PKP_ADDRESS]);
        assert!(keyring.holds(&PKP.parse().unwrap()));
    }

    #[test]
    fn test_invalid_key_reports_position_only() {
        let err = LocalKeyShareSigner::from_private_keys([PRIVATE_KEY, "0xnothex"]).unwrap_err();
        assert_eq!(err.index, 1);
        assert!(!err.to_string().contains(PRIVATE_KEY));
    }

    #[tokio::test]
    async fn test_golden_vector_recovers_to_pkp() {
        let keyring = LocalKeyShareSigner::from_private_keys([PRIVATE_KEY]).unwrap();
        let signer = SettlementSigner::new(keyring);
        let response = signer
            .settle(&params(
                "0xa3f1c2d4e5b60718293a4b5c6d7e8f90112233445566778899aabbccddeeff00",
                PKP,
            ))
            .await;
        let receipt = response.verify(PKP_ADDRESS).unwrap();
        assert_eq!(
            receipt.message_hash,
            b256!("0x5070727f510d31086a6e8176380073eafbfa7313088dfc4feffe97deb468374e")
        );
    }

    #[tokio::test]
    async fn test_unknown_pkp_is_a_signing_failure() {
        let other: PrivateKeySigner =
            "0x0000000000000000000000000000000000000000000000000000000000000001".parse().unwrap();
        let signer = SettlementSigner::new(LocalKeyShareSigner::new().with_share(other));
        let response = signer
            .settle(&params(
                "0x0000000000000000000000000000000000000000000000000000000000000001",
                PKP,
            ))
            .await;
        assert!(matches!(
            response,
            SettlementResponse::Failure {
                kind: ErrorKind::Signing,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_shared_key_behind_arc() {
        let share = Arc::new(PRIVATE_KEY.parse::<PrivateKeySigner>().unwrap());
        let a = LocalKeyShareSigner::new().with_share(Arc::clone(&share));
        let b = LocalKeyShareSigner::new().with_share(share);
        let request = SignRequest {
            to_sign: b256!("0x5070727f510d31086a6e8176380073eafbfa7313088dfc4feffe97deb468374e"),
            public_key: PKP.parse().unwrap(),
            sig_name: "settlementSig".into(),
        };
        assert_eq!(a.sign(&request).await.unwrap(), b.sign(&request).await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_settlements_for_different_sessions() {
        let signer = SettlementSigner::new(LocalKeyShareSigner::from_private_keys([PRIVATE_KEY]).unwrap());
        let first = params(
            "0x1111111111111111111111111111111111111111111111111111111111111111",
            PKP,
        );
        let second = params(
            "0x2222222222222222222222222222222222222222222222222222222222222222",
            PKP,
        );
        let (a, b) = futures_util::future::join(signer.settle(&first), signer.settle(&second)).await;
        let a = a.verify(PKP_ADDRESS).unwrap().clone();
        let b = b.verify(PKP_ADDRESS).unwrap().clone();
        assert_ne!(a.session_id, b.session_id);
        assert_ne!(a.message_hash, b.message_hash);
    }
}
