//! Typed settlement values and their field-level parsing.
//!
//! Parsing is shared by both sides of the remote-invocation boundary: the
//! request builder reports problems as [`ValidationError`](crate::error::ValidationError)s
//! and the signer as [`MissingParameterError`](crate::error::MissingParameterError)s,
//! but they agree on what a well-formed field looks like.

use std::fmt;
use std::str::FromStr;

use alloy_primitives::{Address, B256, U256, hex};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::encoding::CanonicalMessage;
use crate::error::{EncodingError, Field, FieldError};
use crate::proto::SettlementParams;

/// Length of an uncompressed secp256k1 public key without the SEC1 tag byte.
const RAW_PUBLIC_KEY_LEN: usize = 64;

/// SEC1 tag of an uncompressed point.
const SEC1_UNCOMPRESSED_TAG: u8 = 0x04;

/// Public key of a programmable key pair (PKP).
///
/// The private key is split across a quorum of signing nodes; this key names
/// that quorum. Accepted as uncompressed SEC1 hex (`0x04` followed by 64 bytes)
/// or as the raw 64-byte `x ‖ y` form, and always displayed as SEC1.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PkpPublicKey([u8; RAW_PUBLIC_KEY_LEN]);

impl PkpPublicKey {
    /// Wraps a raw `x ‖ y` public key.
    #[must_use]
    pub const fn from_raw(raw: [u8; RAW_PUBLIC_KEY_LEN]) -> Self {
        Self(raw)
    }

    /// Returns the raw `x ‖ y` bytes.
    #[must_use]
    pub const fn as_raw(&self) -> &[u8; RAW_PUBLIC_KEY_LEN] {
        &self.0
    }

    /// Ethereum address controlled by this key. On-chain verification
    /// compares recovered signers against this address.
    #[must_use]
    pub fn address(&self) -> Address {
        Address::from_raw_public_key(&self.0)
    }
}

impl fmt::Debug for PkpPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PkpPublicKey").field(&self.to_string()).finish()
    }
}

impl fmt::Display for PkpPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{SEC1_UNCOMPRESSED_TAG:02x}{}", hex::encode(self.0))
    }
}

/// A public key string that is neither SEC1-uncompressed nor raw.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct PkpPublicKeyParseError(String);

impl FromStr for PkpPublicKey {
    type Err = PkpPublicKeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s.trim())
            .map_err(|e| PkpPublicKeyParseError(format!("invalid hex: {e}")))?;
        let raw = match bytes.as_slice() {
            [SEC1_UNCOMPRESSED_TAG, rest @ ..] if rest.len() == RAW_PUBLIC_KEY_LEN => rest,
            raw if raw.len() == RAW_PUBLIC_KEY_LEN => raw,
            other => {
                return Err(PkpPublicKeyParseError(format!(
                    "expected an uncompressed secp256k1 key (65 bytes with 0x04 prefix or 64 raw bytes), got {} bytes",
                    other.len()
                )));
            }
        };
        let mut key = [0u8; RAW_PUBLIC_KEY_LEN];
        key.copy_from_slice(raw);
        Ok(Self(key))
    }
}

impl Serialize for PkpPublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PkpPublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Credits consumed by a practice session, as the contract's `uint256`.
///
/// Serialized as a decimal string so values above 2^53 survive JSON
/// round-trips through JavaScript clients.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Credits(U256);

impl Credits {
    /// Zero credits.
    pub const ZERO: Self = Self(U256::ZERO);

    /// Returns the value as a `U256`.
    #[must_use]
    pub const fn as_u256(&self) -> U256 {
        self.0
    }

    /// Parses credits from a loosely-typed JSON value.
    ///
    /// Accepts non-negative JSON integers, decimal strings and `0x`-prefixed
    /// hex strings. Negative or fractional values are malformed. Integers too
    /// wide for `uint256` are reported as [`FieldError::Encoding`] rather
    /// than truncated.
    ///
    /// # Errors
    ///
    /// Returns a [`FieldError`] for [`Field::CreditsUsed`].
    pub fn from_json(value: &Value) -> Result<Self, FieldError> {
        const FIELD: Field = Field::CreditsUsed;
        match value {
            Value::Null => Err(FieldError::missing(FIELD)),
            Value::Number(n) => {
                if let Some(v) = n.as_u64() {
                    return Ok(Self(U256::from(v)));
                }
                // Numbers keep their literal text, so integers past u64 still
                // arrive digit-for-digit.
                let literal = n.to_string();
                if literal.bytes().all(|b| b.is_ascii_digit()) {
                    Self::from_text(&literal)
                } else if literal
                    .strip_prefix('-')
                    .is_some_and(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
                {
                    Err(FieldError::malformed(FIELD, "must be non-negative"))
                } else {
                    Err(FieldError::malformed(FIELD, "must be an integer"))
                }
            }
            Value::String(s) => Self::from_text(s.trim()),
            other => Err(FieldError::malformed(
                FIELD,
                format!("expected an integer, got {}", json_type_name(other)),
            )),
        }
    }

    fn from_text(s: &str) -> Result<Self, FieldError> {
        const FIELD: Field = Field::CreditsUsed;
        if s.is_empty() {
            return Err(FieldError::missing(FIELD));
        }
        if s.starts_with('-') {
            return Err(FieldError::malformed(FIELD, "must be non-negative"));
        }
        let (digits, radix) = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(hex_digits) => (hex_digits, 16),
            None => (s, 10),
        };
        if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
            return Err(FieldError::malformed(FIELD, "must be an integer"));
        }
        // The digits are well-formed, so the only remaining failure is overflow.
        U256::from_str_radix(digits, u64::from(radix))
            .map(Self)
            .map_err(|_| {
                FieldError::Encoding(EncodingError {
                    field: FIELD,
                    reason: "value does not fit in uint256".to_owned(),
                })
            })
    }
}

impl From<u64> for Credits {
    fn from(value: u64) -> Self {
        Self(U256::from(value))
    }
}

impl From<U256> for Credits {
    fn from(value: U256) -> Self {
        Self(value)
    }
}

impl fmt::Display for Credits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Credits {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Credits {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_json(&value).map_err(|e| match e {
            FieldError::Invalid(field, issue) => {
                serde::de::Error::custom(format!("{field} {issue}"))
            }
            FieldError::Encoding(e) => serde::de::Error::custom(e),
        })
    }
}

/// A fully validated settlement request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementRequest {
    /// Paying account.
    pub user_id: Address,
    /// Practice session identifier.
    pub session_id: B256,
    /// Credits to decrement on-chain.
    pub credits_used: Credits,
    /// Quorum that must co-sign.
    pub pkp_public_key: PkpPublicKey,
}

impl SettlementRequest {
    /// Validates loosely-typed wire parameters field by field, in canonical order.
    ///
    /// # Errors
    ///
    /// Returns the first [`FieldError`] encountered.
    pub fn from_params(params: &SettlementParams) -> Result<Self, FieldError> {
        let user_id = parse_hex_field::<Address>(
            Field::UserId,
            params.user_id.as_ref(),
            "expected a 20-byte hex address",
        )?;
        let session_id = parse_hex_field::<B256>(
            Field::SessionId,
            params.session_id.as_ref(),
            "expected a 32-byte hex value",
        )?;
        let credits_used =
            Credits::from_json(params.credits_used.as_ref().unwrap_or(&Value::Null))?;
        let pkp_public_key = non_empty_str(Field::PkpPublicKey, params.pkp_public_key.as_ref())?
            .parse::<PkpPublicKey>()
            .map_err(|e| FieldError::malformed(Field::PkpPublicKey, e.to_string()))?;
        Ok(Self {
            user_id,
            session_id,
            credits_used,
            pkp_public_key,
        })
    }

    /// The packed message the verifying contract reconstructs.
    #[must_use]
    pub fn canonical_message(&self) -> CanonicalMessage {
        CanonicalMessage::encode(&self.user_id, &self.session_id, &self.credits_used)
    }
}

fn non_empty_str(field: Field, value: Option<&Value>) -> Result<&str, FieldError> {
    match value {
        None | Some(Value::Null) => Err(FieldError::missing(field)),
        Some(Value::String(s)) if s.trim().is_empty() => Err(FieldError::missing(field)),
        Some(Value::String(s)) => Ok(s.trim()),
        Some(other) => Err(FieldError::malformed(
            field,
            format!("expected a string, got {}", json_type_name(other)),
        )),
    }
}

fn parse_hex_field<T: FromStr>(
    field: Field,
    value: Option<&Value>,
    expected: &'static str,
) -> Result<T, FieldError> {
    let s = non_empty_str(field, value)?;
    s.parse::<T>()
        .map_err(|_| FieldError::malformed(field, expected))
}

const fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParamIssue;
    use alloy_primitives::{address, b256};
    use serde_json::json;

    const PKP: &str = "0x044e3b81af9c2234cad09d679ce6035ed1392347ce64ce405f5dcd36228a25de6e47fd35c4215d1edf53e6f83de344615ce719bdb0fd878f6ed76f06dd277956de";

    fn params() -> SettlementParams {
        SettlementParams {
            user_id: Some(json!("0x8C9c3F5B86E83F3C03e909dC46b5C599Cb0AF89C")),
            session_id: Some(json!(
                "0xa3f1c2d4e5b60718293a4b5c6d7e8f90112233445566778899aabbccddeeff00"
            )),
            credits_used: Some(json!(30)),
            pkp_public_key: Some(json!(PKP)),
        }
    }

    #[test]
    fn test_pkp_address_derivation() {
        let pkp: PkpPublicKey = PKP.parse().unwrap();
        assert_eq!(
            pkp.address(),
            address!("0x2c7536E3605D9C16a7a3D7b1898e529396a65c23")
        );
    }

    #[test]
    fn test_pkp_accepts_raw_form_and_displays_sec1() {
        let raw = &PKP[4..];
        let pkp: PkpPublicKey = raw.parse().unwrap();
        assert_eq!(pkp.to_string(), PKP);
    }

    #[test]
    fn test_pkp_rejects_compressed_key() {
        let compressed = format!("0x02{}", &PKP[4..68]);
        assert!(compressed.parse::<PkpPublicKey>().is_err());
    }

    #[test]
    fn test_from_params_accepts_unchecksummed_mixed_case_address() {
        let request = SettlementRequest::from_params(&params()).unwrap();
        assert_eq!(
            request.user_id,
            address!("0x8c9c3F5b86E83f3C03E909DC46b5C599CB0af89c")
        );
        assert_eq!(
            request.session_id,
            b256!("0xa3f1c2d4e5b60718293a4b5c6d7e8f90112233445566778899aabbccddeeff00")
        );
        assert_eq!(request.credits_used, Credits::from(30));
    }

    #[test]
    fn test_from_params_reports_each_missing_field() {
        for field in Field::ALL {
            let mut p = params();
            match field {
                Field::UserId => p.user_id = None,
                Field::SessionId => p.session_id = Some(Value::Null),
                Field::CreditsUsed => p.credits_used = None,
                Field::PkpPublicKey => p.pkp_public_key = Some(json!("")),
            }
            assert_eq!(
                SettlementRequest::from_params(&p),
                Err(FieldError::Invalid(field, ParamIssue::Missing)),
                "{field}"
            );
        }
    }

    #[test]
    fn test_short_session_id_is_malformed() {
        let mut p = params();
        p.session_id = Some(json!("0x1234"));
        assert!(matches!(
            SettlementRequest::from_params(&p),
            Err(FieldError::Invalid(Field::SessionId, ParamIssue::Malformed(_)))
        ));
    }

    #[test]
    fn test_credits_accepts_zero_and_strings() {
        assert_eq!(Credits::from_json(&json!(0)).unwrap(), Credits::ZERO);
        assert_eq!(Credits::from_json(&json!("42")).unwrap(), Credits::from(42));
        assert_eq!(Credits::from_json(&json!("0x2a")).unwrap(), Credits::from(42));
    }

    #[test]
    fn test_credits_rejects_negative_and_fractional() {
        for value in [json!(-1), json!("-7"), json!(1.5), json!("2.5"), json!(true)] {
            assert!(
                matches!(
                    Credits::from_json(&value),
                    Err(FieldError::Invalid(Field::CreditsUsed, ParamIssue::Malformed(_)))
                ),
                "{value}"
            );
        }
    }

    #[test]
    fn test_credits_overflow_is_an_encoding_error() {
        let too_big = format!("0x1{}", "0".repeat(64));
        assert!(matches!(
            Credits::from_json(&json!(too_big)),
            Err(FieldError::Encoding(_))
        ));
        let max = format!("0x{}", "f".repeat(64));
        assert_eq!(Credits::from_json(&json!(max)).unwrap().as_u256(), U256::MAX);
    }

    #[test]
    fn test_credits_accepts_integer_literals_wider_than_u64() {
        let value: Value = serde_json::from_str("18446744073709551616").unwrap();
        assert_eq!(
            Credits::from_json(&value).unwrap().as_u256(),
            U256::from(u64::MAX) + U256::from(1)
        );
    }

    #[test]
    fn test_credits_integer_literal_past_uint256_is_an_encoding_error() {
        let literal = format!("2{}", "0".repeat(80));
        let value: Value = serde_json::from_str(&literal).unwrap();
        assert!(matches!(
            Credits::from_json(&value),
            Err(FieldError::Encoding(_))
        ));
        let err = SettlementRequest::from_params(&SettlementParams {
            credits_used: Some(value),
            ..params()
        })
        .unwrap_err();
        assert_eq!(
            err.into_missing_parameter().kind(),
            crate::error::ErrorKind::Encoding
        );
    }

    #[test]
    fn test_credits_wide_negative_literal_is_malformed() {
        let value: Value = serde_json::from_str("-100000000000000000000000").unwrap();
        assert!(matches!(
            Credits::from_json(&value),
            Err(FieldError::Invalid(Field::CreditsUsed, ParamIssue::Malformed(ref r))) if r == "must be non-negative"
        ));
    }

    #[test]
    fn test_credits_serializes_as_decimal_string() {
        let json = serde_json::to_string(&Credits::from(30)).unwrap();
        assert_eq!(json, "\"30\"");
        let back: Credits = serde_json::from_str("30").unwrap();
        assert_eq!(back, Credits::from(30));
    }
}
