//! Axum route handlers for the settlement action.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use karaoke_settle::{SettlementParams, SettlementResponse, SettlementSigner};
use karaoke_settle_http::Health;
use serde_json::Value;

use crate::backend::DynSigner;
use crate::error::ActionError;

/// Shared application state for the action service.
pub type ActionState = Arc<SettlementSigner<DynSigner>>;

/// `POST /settle` - Validates, hashes and signs a settlement.
///
/// Always answers `200 OK`; success or failure is carried in the body. A body
/// that is not a JSON object becomes a `missingParameter` failure.
///
/// # Errors
///
/// Returns [`ActionError::InvalidBody`] for unparseable JSON and
/// [`ActionError::NotAnObject`] for any other JSON shape; both render as a
/// failure body.
pub async fn post_settle(
    State(signer): State<ActionState>,
    body: Bytes,
) -> Result<Json<SettlementResponse>, ActionError> {
    let body: Value = serde_json::from_slice(&body)?;
    if !body.is_object() {
        return Err(ActionError::NotAnObject);
    }
    let params: SettlementParams = serde_json::from_value(body)?;
    let response = signer.settle(&params).await;
    tracing::info!(
        success = response.is_success(),
        error_kind = ?response.error_kind(),
        "Settlement handled"
    );
    Ok(Json(response))
}

/// `GET /health` - Liveness probe.
pub async fn get_health() -> Json<Health> {
    Json(Health {
        status: "ok".to_owned(),
        version: env!("CARGO_PKG_VERSION").to_owned(),
    })
}

/// Creates an Axum [`axum::Router`] with all action endpoints.
///
/// Endpoints:
/// - `POST /settle` - sign a session settlement
/// - `GET /health` - liveness probe
pub fn action_router(state: ActionState) -> axum::Router {
    axum::Router::new()
        .route("/settle", axum::routing::post(post_settle))
        .route("/health", axum::routing::get(get_health))
        .with_state(state)
}
