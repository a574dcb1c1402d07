//! sav-relay library - valuation relay service
//!
//! Stateless pass-through that holds the upstream credential server-side so
//! untrusted capture clients never see it. Same request/response contract as
//! the valuation client; adds CORS handling for browser callers.

use axum::extract::DefaultBodyLimit;
use axum::http::Method;
use axum::Router;
use chrono::{DateTime, Utc};
use sav_common::config::DEFAULT_MAX_BODY_BYTES;
use sav_valuation::ValuationClient;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod api;
pub mod error;

pub use crate::error::{RelayError, RelayResult};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Valuation client; `None` when no upstream credential is configured
    pub client: Option<ValuationClient>,
    /// Service startup timestamp for uptime reporting
    pub startup_time: DateTime<Utc>,
    /// Largest accepted request body in bytes
    pub max_body_bytes: usize,
}

impl AppState {
    pub fn new(client: Option<ValuationClient>) -> Self {
        Self {
            client,
            startup_time: Utc::now(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }
}

/// Permissive CORS: any origin, any request headers
///
/// Every `OPTIONS` request is answered here with 200 and an empty body
/// before routing reaches a handler.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}

/// Build application router
///
/// Bodies above `state.max_body_bytes` are rejected before the handler
/// forwards anything upstream.
pub fn build_router(state: AppState) -> Router {
    let body_limit = DefaultBodyLimit::max(state.max_body_bytes);

    Router::new()
        .merge(api::valuation_routes())
        .merge(api::health_routes())
        .fallback(api::not_found)
        .layer(body_limit)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer())
        .with_state(state)
}
