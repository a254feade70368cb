//! Client-side construction of settlement requests.
//!
//! The builder runs the same field checks as the signer, synchronously and
//! before any network call, so malformed input never costs a signing round.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::encoding::derive_session_id;
use crate::error::SettlementError;
use crate::proto::SettlementParams;
use crate::timestamp::UnixTimestamp;
use crate::types::{Credits, PkpPublicKey, SettlementRequest};

/// Summary of a finished practice session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionTelemetry {
    /// Song that was practiced.
    pub song_id: String,
    /// When practice began.
    pub started_at: UnixTimestamp,
    /// Lines the learner got through.
    pub lines_completed: u32,
    /// Credits consumed, as computed by credit tracking.
    pub credits_consumed: u64,
}

impl SessionTelemetry {
    /// Session identifier derived from user, song and start time.
    #[must_use]
    pub fn session_id(&self, user: &Address) -> alloy_primitives::B256 {
        derive_session_id(user, &self.song_id, self.started_at)
    }
}

/// Accumulates settlement fields and validates them on [`build`](Self::build).
///
/// Setters accept anything convertible to a JSON value, mirroring what a
/// browser client hands over; nothing is checked until `build`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettlementRequestBuilder {
    params: SettlementParams,
}

impl SettlementRequestBuilder {
    /// Starts an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from raw wire parameters.
    #[must_use]
    pub const fn from_params(params: SettlementParams) -> Self {
        Self { params }
    }

    /// Prefills every field from a finished session.
    ///
    /// The session id is derived with [`derive_session_id`].
    #[must_use]
    pub fn from_telemetry(
        user: Address,
        pkp_public_key: &PkpPublicKey,
        telemetry: &SessionTelemetry,
    ) -> Self {
        Self::new()
            .user_id(user.to_checksum(None))
            .session_id(telemetry.session_id(&user).to_string())
            .credits_used(Credits::from(telemetry.credits_consumed).to_string())
            .pkp_public_key(pkp_public_key.to_string())
    }

    /// Sets `userId`.
    #[must_use]
    pub fn user_id(mut self, value: impl Into<Value>) -> Self {
        self.params.user_id = Some(value.into());
        self
    }

    /// Sets `sessionId`.
    #[must_use]
    pub fn session_id(mut self, value: impl Into<Value>) -> Self {
        self.params.session_id = Some(value.into());
        self
    }

    /// Sets `creditsUsed`.
    #[must_use]
    pub fn credits_used(mut self, value: impl Into<Value>) -> Self {
        self.params.credits_used = Some(value.into());
        self
    }

    /// Sets `pkpPublicKey`.
    #[must_use]
    pub fn pkp_public_key(mut self, value: impl Into<Value>) -> Self {
        self.params.pkp_public_key = Some(value.into());
        self
    }

    /// Validates and returns the request. The builder is left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::Validation`] for an absent or malformed
    /// field, or [`SettlementError::Encoding`] when `creditsUsed` overflows
    /// `uint256`.
    pub fn build(&self) -> Result<SettlementRequest, SettlementError> {
        SettlementRequest::from_params(&self.params).map_err(|e| e.into_validation())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, Field, ParamIssue, ValidationError};
    use alloy_primitives::address;

    const PKP: &str = "0x044e3b81af9c2234cad09d679ce6035ed1392347ce64ce405f5dcd36228a25de6e47fd35c4215d1edf53e6f83de344615ce719bdb0fd878f6ed76f06dd277956de";

    fn complete() -> SettlementRequestBuilder {
        SettlementRequestBuilder::new()
            .user_id("0x8C9c3F5B86E83F3C03e909dC46b5C599Cb0AF89C")
            .session_id("0xa3f1c2d4e5b60718293a4b5c6d7e8f90112233445566778899aabbccddeeff00")
            .credits_used(30)
            .pkp_public_key(PKP)
    }

    #[test]
    fn test_build_is_idempotent() {
        let builder = complete();
        let a = builder.build().unwrap();
        let b = builder.build().unwrap();
        assert_eq!(a, b);
        assert_eq!(complete().build().unwrap(), a);
    }

    #[test]
    fn test_missing_field_is_a_validation_error() {
        let err = SettlementRequestBuilder::new()
            .user_id("0x8C9c3F5B86E83F3C03e909dC46b5C599Cb0AF89C")
            .credits_used(30)
            .pkp_public_key(PKP)
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            SettlementError::Validation(ValidationError {
                field: Field::SessionId,
                issue: ParamIssue::Missing,
            })
        );
    }

    #[test]
    fn test_negative_credits_rejected() {
        let err = complete().credits_used(-1).build().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_fractional_credits_rejected() {
        let err = complete().credits_used(0.5).build().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_round_trip_through_params() {
        let request = complete().build().unwrap();
        let params = SettlementParams::from(&request);
        let rebuilt = SettlementRequestBuilder::from_params(params).build().unwrap();
        assert_eq!(rebuilt, request);
    }

    #[test]
    fn test_from_telemetry_derives_session_id() {
        let user = address!("0x8C9c3F5B86E83F3C03e909dC46b5C599Cb0AF89C");
        let telemetry = SessionTelemetry {
            song_id: "heat-waves".into(),
            started_at: UnixTimestamp::from_secs(1_700_000_000),
            lines_completed: 12,
            credits_consumed: 3,
        };
        let pkp: PkpPublicKey = PKP.parse().unwrap();
        let request = SettlementRequestBuilder::from_telemetry(user, &pkp, &telemetry)
            .build()
            .unwrap();
        assert_eq!(request.user_id, user);
        assert_eq!(request.session_id, telemetry.session_id(&user));
        assert_eq!(request.credits_used, Credits::from(3));
        assert_eq!(request.pkp_public_key, pkp);
    }
}
