//! Error types for sav-relay
//!
//! Every failure maps to 500 with `{"error": "<message>", ...}`. The extra
//! `kind`/`retryable` fields let a calling client tell terminal failures
//! from transient ones without parsing the message.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sav_common::api::RelayErrorBody;
use sav_valuation::{ErrorKind, ValuationError};
use thiserror::Error;

/// `kind` for caller bodies the relay could not parse
pub const INVALID_REQUEST_KIND: &str = "InvalidRequest";

/// Relay error type
#[derive(Debug, Error)]
pub enum RelayError {
    /// No upstream credential configured on the server
    #[error("Upstream API key is not configured on the relay")]
    MissingCredential,

    /// Caller body missing or not `{ imageDataUrl: string }`
    #[error("Invalid request body: {0}")]
    InvalidRequest(String),

    /// Valuation failed (empty image, upstream failure, malformed response)
    #[error(transparent)]
    Valuation(#[from] ValuationError),
}

impl RelayError {
    /// Wire body for this error
    pub fn to_body(&self) -> RelayErrorBody {
        let mut body = RelayErrorBody::new(self.to_string());
        match self {
            RelayError::MissingCredential => {
                body.kind = Some(ErrorKind::Config.as_str().to_string());
                body.retryable = Some(false);
                body.detail = Some(self.to_string());
            }
            RelayError::InvalidRequest(detail) => {
                body.kind = Some(INVALID_REQUEST_KIND.to_string());
                body.retryable = Some(false);
                body.detail = Some(detail.clone());
            }
            RelayError::Valuation(e) => {
                body.kind = Some(e.kind().as_str().to_string());
                body.retryable = Some(e.is_transient());
                body.detail = Some(e.detail());
                body.upstream_status = e.upstream_status();
            }
        }
        body
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let body = self.to_body();
        tracing::error!(
            error = %body.error,
            kind = body.kind.as_deref().unwrap_or("unknown"),
            "Relay request failed"
        );

        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

/// Result type for relay handlers
pub type RelayResult<T> = Result<T, RelayError>;
