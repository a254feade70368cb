//! A [`ThresholdSigner`] that delegates to a signing node over HTTP.
//!
//! The node receives the `{ toSign, publicKey, sigName }` request as JSON and
//! answers with `{ "signature": "0x…" }` (65 bytes, `r ‖ s ‖ v`) or
//! `{ "error": "…" }`. Requests are sent once; the signer never retries.

use std::time::Duration;

use alloy_primitives::Signature;
use http::HeaderMap;
use karaoke_settle::proto::signature_hex;
use karaoke_settle::{SignRequest, SigningError, ThresholdSigner};
use serde::Deserialize;
use url::Url;

#[cfg(feature = "telemetry")]
use tracing::instrument;

use crate::error::ClientError;
use crate::transport::JsonTransport;

#[derive(Deserialize)]
struct SignResponse {
    #[serde(default, with = "signature_hex")]
    signature: Option<Signature>,
    #[serde(default)]
    error: Option<String>,
}

/// Signing-node client.
#[derive(Clone, Debug)]
pub struct RemoteSigner {
    sign_url: Url,
    transport: JsonTransport,
}

impl RemoteSigner {
    /// Default timeout for one signing round.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Creates a signer posting to `sign_url`.
    #[must_use]
    pub fn new(sign_url: Url) -> Self {
        Self {
            sign_url,
            transport: JsonTransport::new(Some(Self::DEFAULT_TIMEOUT)),
        }
    }

    /// Returns the signing endpoint.
    pub const fn sign_url(&self) -> &Url {
        &self.sign_url
    }

    /// Attaches custom headers, such as node credentials, to every request.
    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.transport.headers = headers;
        self
    }

    /// Sets the per-round timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.transport.timeout = Some(timeout);
        self
    }

    fn map_error(&self, err: ClientError) -> SigningError {
        if err.is_timeout() {
            SigningError::Timeout(self.transport.timeout.unwrap_or_default())
        } else {
            SigningError::Backend(err.to_string())
        }
    }
}

impl TryFrom<&str> for RemoteSigner {
    type Error = ClientError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let url = Url::parse(value).map_err(|e| ClientError::UrlParse {
            context: "Failed to parse signing node url",
            source: e,
        })?;
        Ok(Self::new(url))
    }
}

#[async_trait::async_trait]
impl ThresholdSigner for RemoteSigner {
    #[cfg_attr(
        feature = "telemetry",
        instrument(
            name = "karaoke.remote_signer.sign",
            skip_all,
            fields(sig_name = %request.sig_name, to_sign = %request.to_sign),
            err
        )
    )]
    async fn sign(&self, request: &SignRequest) -> Result<Signature, SigningError> {
        let response: SignResponse = self
            .transport
            .post_json(&self.sign_url, "POST sign", request)
            .await
            .map_err(|e| self.map_error(e))?;
        let signature = match (response.signature, response.error) {
            (Some(signature), _) => signature,
            (None, Some(error)) => return Err(SigningError::Backend(error)),
            (None, None) => {
                return Err(SigningError::Backend(
                    "signing node returned no signature".into(),
                ));
            }
        };
        let expected = request.public_key.address();
        let recovered = signature
            .recover_address_from_prehash(&request.to_sign)
            .map_err(|e| SigningError::Backend(format!("unrecoverable node signature: {e}")))?;
        if recovered != expected {
            return Err(SigningError::Backend(format!(
                "node signature recovers to {recovered}, expected {expected}"
            )));
        }
        Ok(signature)
    }
}
