//! Shared JSON-over-HTTP plumbing.

use std::fmt::Display;
use std::time::Duration;

use http::{HeaderMap, StatusCode};
use reqwest::{Client, RequestBuilder};
use url::Url;

use crate::error::ClientError;

/// A reqwest client plus the headers and timeout applied to every request.
#[derive(Clone, Debug, Default)]
pub(crate) struct JsonTransport {
    client: Client,
    pub(crate) headers: HeaderMap,
    pub(crate) timeout: Option<Duration>,
}

impl JsonTransport {
    pub(crate) fn new(timeout: Option<Duration>) -> Self {
        Self {
            client: Client::new(),
            headers: HeaderMap::new(),
            timeout,
        }
    }

    /// POSTs `payload` as JSON and decodes a `200 OK` JSON body.
    ///
    /// `context` names the call in errors and traces (e.g. `"POST /settle"`).
    pub(crate) async fn post_json<T, R>(
        &self,
        url: &Url,
        context: &'static str,
        payload: &T,
    ) -> Result<R, ClientError>
    where
        T: serde::Serialize + Sync + ?Sized,
        R: serde::de::DeserializeOwned,
    {
        let req = self.client.post(url.clone()).json(payload);
        self.send(req, context).await
    }

    /// GETs `url` and decodes a `200 OK` JSON body.
    pub(crate) async fn get_json<R>(&self, url: &Url, context: &'static str) -> Result<R, ClientError>
    where
        R: serde::de::DeserializeOwned,
    {
        let req = self.client.get(url.clone());
        self.send(req, context).await
    }

    async fn send<R>(&self, mut req: RequestBuilder, context: &'static str) -> Result<R, ClientError>
    where
        R: serde::de::DeserializeOwned,
    {
        for (key, value) in &self.headers {
            req = req.header(key, value);
        }
        if let Some(timeout) = self.timeout {
            req = req.timeout(timeout);
        }
        let http_response = req
            .send()
            .await
            .map_err(|e| ClientError::Http { context, source: e });

        let result = match http_response {
            Ok(response) if response.status() == StatusCode::OK => response
                .json::<R>()
                .await
                .map_err(|e| ClientError::JsonDeserialization { context, source: e }),
            Ok(response) => {
                let status = response.status();
                match response.text().await {
                    Ok(body) => Err(ClientError::HttpStatus {
                        context,
                        status,
                        body,
                    }),
                    Err(e) => Err(ClientError::ResponseBodyRead { context, source: e }),
                }
            }
            Err(e) => Err(e),
        };

        record_result(&result, context);

        result
    }
}

/// Emits an error event for a failed request.
#[cfg(feature = "telemetry")]
fn record_result<R, E: Display>(result: &Result<R, E>, context: &'static str) {
    if let Err(err) = result {
        tracing::event!(tracing::Level::ERROR, error = %err, request = context, "HTTP request failed");
    }
}

/// Noop if telemetry feature is off.
#[cfg(not(feature = "telemetry"))]
fn record_result<R, E: Display>(_result: &Result<R, E>, _context: &'static str) {}
