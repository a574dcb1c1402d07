//! HTTP API handlers for sav-relay

pub mod health;
pub mod valuation;

pub use health::health_routes;
pub use valuation::valuation_routes;

use axum::{http::StatusCode, Json};
use sav_common::api::RelayErrorBody;

/// Fallback for unknown routes
pub async fn not_found() -> (StatusCode, Json<RelayErrorBody>) {
    (
        StatusCode::NOT_FOUND,
        Json(RelayErrorBody::new("Not found")),
    )
}
