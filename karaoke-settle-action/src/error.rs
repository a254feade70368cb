//! Error types for the settlement action service.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use karaoke_settle::{ErrorKind, SettlementResponse};

/// Errors that can occur in the settlement action service.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    /// The request body is not valid JSON.
    #[error("invalid request body: {0}")]
    InvalidBody(#[from] serde_json::Error),

    /// The request body is JSON but not an object.
    #[error("invalid request body: expected a JSON object")]
    NotAnObject,

    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    /// A configured key share is invalid.
    #[error(transparent)]
    Keyring(#[from] karaoke_settle_evm::KeyringError),

    /// Binding or serving failed.
    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

impl IntoResponse for ActionError {
    fn into_response(self) -> Response {
        match self {
            // Callers read the outcome from the body, never from the status.
            Self::InvalidBody(_) | Self::NotAnObject => {
                let body = SettlementResponse::Failure {
                    error: self.to_string(),
                    kind: ErrorKind::MissingParameter,
                };
                (StatusCode::OK, axum::Json(body)).into_response()
            }
            Self::Config(_) | Self::Keyring(_) | Self::Io(_) => {
                let body = serde_json::json!({ "error": self.to_string() });
                (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(body)).into_response()
            }
        }
    }
}
