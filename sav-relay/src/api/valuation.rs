//! Valuation endpoint
//!
//! `POST /` with `{"imageDataUrl": "..."}` → 200 `ValuationResult` JSON,
//! or 500 `{"error": "..."}`.

use crate::{AppState, RelayError, RelayResult};
use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use sav_common::api::RelayRequest;
use sav_common::ValuationResult;
use tracing::info;

/// POST / handler
///
/// **Errors (all 500):**
/// - credential not configured
/// - body missing, not JSON, or lacking `imageDataUrl`
/// - empty image payload
/// - upstream failure or malformed upstream response
pub async fn valuate(
    State(state): State<AppState>,
    payload: Result<Json<RelayRequest>, JsonRejection>,
) -> RelayResult<Json<ValuationResult>> {
    let client = state.client.as_ref().ok_or(RelayError::MissingCredential)?;

    let Json(request) = payload.map_err(|e| RelayError::InvalidRequest(e.body_text()))?;

    info!(
        payload_bytes = request.image_data_url.len(),
        "Relaying valuation request"
    );

    let result = client.value_image(&request.image_data_url).await?;
    Ok(Json(result))
}

/// Build valuation routes
pub fn valuation_routes() -> Router<AppState> {
    Router::new().route("/", post(valuate))
}
