//! The settlement signer.
//!
//! Each invocation walks
//! `Received → Validating → Encoding → Hashing → Signing → Responded`.
//! Nothing is shared between invocations, so any number may run
//! concurrently. A failure at any stage ends the walk with a
//! [`SettlementResponse::Failure`]; nothing is retried.

use std::fmt;

use alloy_primitives::Signature;
#[cfg(feature = "telemetry")]
use tracing::instrument;

use crate::error::SettlementError;
use crate::proto::{SettlementParams, SettlementReceipt, SettlementResponse};
use crate::signer::{DEFAULT_SIG_NAME, SignRequest, ThresholdSigner};
use crate::timestamp::UnixTimestamp;
use crate::types::SettlementRequest;

/// Pipeline stage of a single settlement invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Parameters arrived.
    Received,
    /// Checking presence and shape of every field.
    Validating,
    /// Packing `(address, bytes32, uint256)`.
    Encoding,
    /// Keccak-256 over the packed bytes.
    Hashing,
    /// Waiting on the signing quorum.
    Signing,
    /// A response was produced.
    Responded,
}

impl Stage {
    /// Lower-case stage name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Validating => "validating",
            Self::Encoding => "encoding",
            Self::Hashing => "hashing",
            Self::Signing => "signing",
            Self::Responded => "responded",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Emits a stage transition when telemetry is enabled.
macro_rules! stage {
    ($stage:expr) => {{
        #[cfg(feature = "telemetry")]
        tracing::debug!(stage = %$stage, "settlement stage");
    }};
}

/// Settlement signed by the quorum, before it is shaped into a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedSettlement {
    /// Signed fields and digest.
    pub receipt: SettlementReceipt,
    /// Signature over `receipt.message_hash`.
    pub signature: Signature,
}

impl From<SignedSettlement> for SettlementResponse {
    fn from(signed: SignedSettlement) -> Self {
        Self::Success {
            settlement: signed.receipt,
            signature: signed.signature,
        }
    }
}

/// Turns settlement requests into signed settlements using an injected
/// [`ThresholdSigner`].
#[derive(Debug, Clone)]
pub struct SettlementSigner<S> {
    signer: S,
    sig_name: String,
}

impl<S> SettlementSigner<S> {
    /// Creates a settlement signer over the given backend.
    pub fn new(signer: S) -> Self {
        Self {
            signer,
            sig_name: DEFAULT_SIG_NAME.to_owned(),
        }
    }

    /// Overrides the `sigName` attached to signing requests.
    #[must_use]
    pub fn with_sig_name(mut self, sig_name: impl Into<String>) -> Self {
        self.sig_name = sig_name.into();
        self
    }

    /// Returns the `sigName` attached to signing requests.
    #[must_use]
    pub fn sig_name(&self) -> &str {
        &self.sig_name
    }

    /// Returns the signing backend.
    pub const fn backend(&self) -> &S {
        &self.signer
    }
}

impl<S: ThresholdSigner> SettlementSigner<S> {
    /// Runs the whole pipeline and always produces a response.
    ///
    /// This is the remote-invocation boundary: every failure is folded into
    /// [`SettlementResponse::Failure`].
    pub async fn settle(&self, params: &SettlementParams) -> SettlementResponse {
        let response = match self.try_settle(params).await {
            Ok(signed) => signed.into(),
            Err(e) => {
                #[cfg(feature = "telemetry")]
                tracing::warn!(kind = ?e.kind(), error = %e, "settlement failed");
                e.into()
            }
        };
        stage!(Stage::Responded);
        response
    }

    /// Validates raw parameters, then signs.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::MissingParameter`] or
    /// [`SettlementError::Encoding`] before any signing attempt, or
    /// [`SettlementError::Signing`] if the round fails.
    #[cfg_attr(feature = "telemetry", instrument(name = "settlement.settle", skip_all, err))]
    pub async fn try_settle(
        &self,
        params: &SettlementParams,
    ) -> Result<SignedSettlement, SettlementError> {
        stage!(Stage::Received);
        stage!(Stage::Validating);
        let request =
            SettlementRequest::from_params(params).map_err(|e| e.into_missing_parameter())?;
        self.sign_request(&request).await
    }

    /// Signs an already validated request.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::Signing`] if the round fails.
    #[cfg_attr(feature = "telemetry", instrument(
        name = "settlement.sign",
        skip_all,
        err,
        fields(user = %request.user_id, session = %request.session_id, credits = %request.credits_used)
    ))]
    pub async fn sign_request(
        &self,
        request: &SettlementRequest,
    ) -> Result<SignedSettlement, SettlementError> {
        stage!(Stage::Encoding);
        let message = request.canonical_message();
        stage!(Stage::Hashing);
        let message_hash = message.hash();
        stage!(Stage::Signing);
        let sign_request = SignRequest {
            to_sign: message_hash,
            public_key: request.pkp_public_key,
            sig_name: self.sig_name.clone(),
        };
        let signature = self.signer.sign(&sign_request).await?;
        #[cfg(feature = "telemetry")]
        tracing::info!(message_hash = %message_hash, "settlement signed");
        Ok(SignedSettlement {
            receipt: SettlementReceipt {
                user_id: request.user_id,
                session_id: request.session_id,
                credits_used: request.credits_used,
                message_hash,
                timestamp: UnixTimestamp::now(),
            },
            signature,
        })
    }
}
