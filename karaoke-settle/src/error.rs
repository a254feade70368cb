//! Error taxonomy for session settlement.
//!
//! Every failure of the settlement flow maps onto one of four kinds:
//!
//! - [`ValidationError`] - client-side check before the request is dispatched
//! - [`MissingParameterError`] - the same check repeated inside the signer
//! - [`EncodingError`] - a value does not fit its fixed packed width
//! - [`SigningError`] - the threshold-signing round failed or timed out
//!
//! [`SettlementError`] is the closed union of all four. Its [`ErrorKind`] tag is
//! carried on the wire so callers can branch on kind without parsing messages.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A settlement request field, named as it appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    /// `userId`, the paying account address.
    UserId,
    /// `sessionId`, the 32-byte practice session identifier.
    SessionId,
    /// `creditsUsed`, the credits consumed in the session.
    CreditsUsed,
    /// `pkpPublicKey`, the distributed key that must co-sign.
    PkpPublicKey,
}

impl Field {
    /// All request fields in canonical order.
    pub const ALL: [Self; 4] = [
        Self::UserId,
        Self::SessionId,
        Self::CreditsUsed,
        Self::PkpPublicKey,
    ];

    /// Returns the camelCase wire name of the field.
    #[must_use]
    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::UserId => "userId",
            Self::SessionId => "sessionId",
            Self::CreditsUsed => "creditsUsed",
            Self::PkpPublicKey => "pkpPublicKey",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// What is wrong with a single field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamIssue {
    /// Absent, `null` or empty.
    Missing,
    /// Present but not of the expected shape.
    Malformed(String),
}

impl fmt::Display for ParamIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => f.write_str("is missing"),
            Self::Malformed(reason) => write!(f, "is malformed: {reason}"),
        }
    }
}

/// Client-side rejection of a request before any network call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field} {issue}")]
pub struct ValidationError {
    /// The offending field.
    pub field: Field,
    /// What is wrong with it.
    pub issue: ParamIssue,
}

/// Signer-side rejection of a request. Signing is never attempted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("missing or invalid parameter: {field} {issue}")]
pub struct MissingParameterError {
    /// The offending field.
    pub field: Field,
    /// What is wrong with it.
    pub issue: ParamIssue,
}

/// A value that cannot be packed into its fixed width.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot encode {field}: {reason}")]
pub struct EncodingError {
    /// The field whose value overflowed.
    pub field: Field,
    /// Human-readable reason.
    pub reason: String,
}

/// Failure of the distributed signing round.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SigningError {
    /// No key-share quorum is known for the requested public key.
    #[error("no signing quorum for public key {0}")]
    UnknownKey(String),
    /// The round did not complete in time.
    #[error("signing timed out after {0:?}")]
    Timeout(Duration),
    /// The backend reported a failure.
    #[error("signing failed: {0}")]
    Backend(String),
}

/// Outcome of checking a single field, before the caller decides which
/// side of the boundary it is on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    /// The field is absent or of the wrong shape.
    Invalid(Field, ParamIssue),
    /// The field is well-formed but overflows its packed width.
    Encoding(EncodingError),
}

impl FieldError {
    pub(crate) const fn missing(field: Field) -> Self {
        Self::Invalid(field, ParamIssue::Missing)
    }

    pub(crate) fn malformed(field: Field, reason: impl Into<String>) -> Self {
        Self::Invalid(field, ParamIssue::Malformed(reason.into()))
    }

    /// Classifies the failure as seen by the request builder.
    #[must_use]
    pub fn into_validation(self) -> SettlementError {
        match self {
            Self::Invalid(field, issue) => ValidationError { field, issue }.into(),
            Self::Encoding(e) => e.into(),
        }
    }

    /// Classifies the failure as seen by the settlement signer.
    #[must_use]
    pub fn into_missing_parameter(self) -> SettlementError {
        match self {
            Self::Invalid(field, issue) => MissingParameterError { field, issue }.into(),
            Self::Encoding(e) => e.into(),
        }
    }
}

/// Machine-readable error tag carried in failure responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    /// See [`ValidationError`].
    Validation,
    /// See [`MissingParameterError`].
    MissingParameter,
    /// See [`EncodingError`].
    Encoding,
    /// See [`SigningError`].
    Signing,
}

/// Any failure of the settlement flow.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettlementError {
    /// Rejected by the request builder.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Rejected by the signer's own validation.
    #[error(transparent)]
    MissingParameter(#[from] MissingParameterError),
    /// A value overflowed its packed width.
    #[error(transparent)]
    Encoding(#[from] EncodingError),
    /// The signing round failed.
    #[error(transparent)]
    Signing(#[from] SigningError),
}

impl SettlementError {
    /// Returns the error's kind tag.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::MissingParameter(_) => ErrorKind::MissingParameter,
            Self::Encoding(_) => ErrorKind::Encoding,
            Self::Signing(_) => ErrorKind::Signing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_error_classification_depends_on_side() {
        let err = FieldError::missing(Field::SessionId);
        assert_eq!(err.clone().into_validation().kind(), ErrorKind::Validation);
        assert_eq!(
            err.into_missing_parameter().kind(),
            ErrorKind::MissingParameter
        );
    }

    #[test]
    fn test_encoding_error_keeps_its_kind_on_both_sides() {
        let err = FieldError::Encoding(EncodingError {
            field: Field::CreditsUsed,
            reason: "exceeds uint256".into(),
        });
        assert_eq!(err.clone().into_validation().kind(), ErrorKind::Encoding);
        assert_eq!(err.into_missing_parameter().kind(), ErrorKind::Encoding);
    }

    #[test]
    fn test_messages_name_the_wire_field() {
        let err: SettlementError = MissingParameterError {
            field: Field::PkpPublicKey,
            issue: ParamIssue::Missing,
        }
        .into();
        assert_eq!(
            err.to_string(),
            "missing or invalid parameter: pkpPublicKey is missing"
        );
    }

    #[test]
    fn test_error_kind_serializes_camel_case() {
        let json = serde_json::to_string(&ErrorKind::MissingParameter).unwrap();
        assert_eq!(json, "\"missingParameter\"");
    }

    #[test]
    fn test_timeout_message() {
        let err = SigningError::Timeout(Duration::from_secs(30));
        assert_eq!(err.to_string(), "signing timed out after 30s");
        let err = SigningError::Timeout(Duration::from_millis(1500));
        assert_eq!(err.to_string(), "signing timed out after 1.5s");
    }
}
