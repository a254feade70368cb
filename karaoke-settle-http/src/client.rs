//! A client for a remote settlement action.
//!
//! [`SettlementClient`] is the browser-side half of the flow: it validates a
//! request locally with [`SettlementRequestBuilder`], posts it to the
//! action's `/settle` endpoint, and returns the structured response. The
//! action reports failures in the response body, so a settlement failure is
//! an `Ok(SettlementResponse::Failure { .. })`; only transport problems are
//! errors here.

use std::time::Duration;

use http::HeaderMap;
use karaoke_settle::{
    SettlementParams, SettlementRequest, SettlementRequestBuilder, SettlementResponse,
};
use serde::{Deserialize, Serialize};
use url::Url;

#[cfg(feature = "telemetry")]
use tracing::instrument;

use crate::error::ClientError;
use crate::transport::JsonTransport;

/// Body of `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    /// Always `"ok"` when the service answers.
    pub status: String,
    /// Version of the serving crate.
    pub version: String,
}

/// A client for a settlement action reachable over HTTP.
#[derive(Clone, Debug)]
pub struct SettlementClient {
    /// Base URL of the action (e.g. `https://action.example/`)
    base_url: Url,
    /// Full URL to `POST /settle` requests
    settle_url: Url,
    /// Full URL to `GET /health` requests
    health_url: Url,
    transport: JsonTransport,
}

impl SettlementClient {
    /// Default request timeout. Threshold signing takes seconds, not milliseconds.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Constructs a client from a base URL, with `./settle` and `./health`
    /// resolved relative to it.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::UrlParse`] if URL construction fails.
    pub fn try_new(base_url: Url) -> Result<Self, ClientError> {
        let settle_url = base_url
            .join("./settle")
            .map_err(|e| ClientError::UrlParse {
                context: "Failed to construct ./settle URL",
                source: e,
            })?;
        let health_url = base_url
            .join("./health")
            .map_err(|e| ClientError::UrlParse {
                context: "Failed to construct ./health URL",
                source: e,
            })?;
        Ok(Self {
            base_url,
            settle_url,
            health_url,
            transport: JsonTransport::new(Some(Self::DEFAULT_TIMEOUT)),
        })
    }

    /// Returns the base URL used by this client.
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Returns the computed `./settle` URL.
    pub const fn settle_url(&self) -> &Url {
        &self.settle_url
    }

    /// Returns the computed `./health` URL.
    pub const fn health_url(&self) -> &Url {
        &self.health_url
    }

    /// Returns the configured timeout, if any.
    pub const fn timeout(&self) -> &Option<Duration> {
        &self.transport.timeout
    }

    /// Attaches custom headers to all future requests.
    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.transport.headers = headers;
        self
    }

    /// Sets a timeout for all future requests.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.transport.timeout = Some(timeout);
        self
    }

    /// Removes the request timeout.
    #[must_use]
    pub const fn without_timeout(mut self) -> Self {
        self.transport.timeout = None;
        self
    }

    /// Validates the builder's fields and dispatches the request.
    ///
    /// Nothing is sent if validation fails.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Rejected`] for invalid fields, or a transport
    /// error if the action could not be reached.
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "karaoke.settlement_client.submit", skip_all, err)
    )]
    pub async fn submit(
        &self,
        builder: &SettlementRequestBuilder,
    ) -> Result<SettlementResponse, ClientError> {
        let request = builder.build()?;
        self.settle_request(&request).await
    }

    /// Sends an already validated request.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if the HTTP request fails.
    pub async fn settle_request(
        &self,
        request: &SettlementRequest,
    ) -> Result<SettlementResponse, ClientError> {
        self.settle(&SettlementParams::from(request)).await
    }

    /// Sends a `POST /settle` request with raw parameters.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if the HTTP request fails.
    pub async fn settle(
        &self,
        params: &SettlementParams,
    ) -> Result<SettlementResponse, ClientError> {
        self.transport
            .post_json(&self.settle_url, "POST /settle", params)
            .await
    }

    /// Sends a `GET /health` request.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if the HTTP request fails.
    pub async fn health(&self) -> Result<Health, ClientError> {
        self.transport
            .get_json(&self.health_url, "GET /health")
            .await
    }
}

/// Converts a string URL into a `SettlementClient`, parsing the URL and calling `try_new`.
impl TryFrom<&str> for SettlementClient {
    type Error = ClientError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        // Normalize: strip trailing slashes and add a single trailing slash
        let mut normalized = value.trim_end_matches('/').to_string();
        normalized.push('/');
        let url = Url::parse(&normalized).map_err(|e| ClientError::UrlParse {
            context: "Failed to parse base url",
            source: e,
        })?;
        Self::try_new(url)
    }
}

impl TryFrom<String> for SettlementClient {
    type Error = ClientError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}
