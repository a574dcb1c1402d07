//! Shared API request/response types
//!
//! The relay service returns `ValuationResult` verbatim as its success body,
//! so the JSON field names here are part of the relay's public contract.

use serde::{Deserialize, Serialize};

// ========================================
// Valuation Types
// ========================================

/// Outcome of a successful image valuation
///
/// Serialized in camelCase:
///
/// ```
/// use sav_common::api::types::ValuationResult;
///
/// let result = ValuationResult {
///     item_name: "Projector".to_string(),
///     estimated_value: 450.0,
///     detected_objects: vec![],
/// };
/// let json = serde_json::to_value(&result).unwrap();
/// assert_eq!(json["itemName"], "Projector");
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValuationResult {
    /// Name of the primary detected item (non-empty)
    pub item_name: String,

    /// Estimated value of the primary item in USD (finite, >= 0)
    pub estimated_value: f64,

    /// Secondary items found in the same image, in upstream order
    #[serde(default)]
    pub detected_objects: Vec<DetectedObject>,
}

impl ValuationResult {
    /// Sum of the primary and all secondary estimated values
    pub fn total_value(&self) -> f64 {
        self.estimated_value
            + self
                .detected_objects
                .iter()
                .map(|o| o.estimated_value)
                .sum::<f64>()
    }
}

/// A secondary item found in the same image
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedObject {
    pub name: String,
    /// Estimated value in USD (>= 0)
    pub estimated_value: f64,
    /// Detection confidence in [0, 1]
    pub confidence: f64,
}

// ========================================
// Relay Types
// ========================================

/// Request body accepted by the relay's `POST /`
///
/// ```
/// use sav_common::api::types::RelayRequest;
///
/// let req: RelayRequest =
///     serde_json::from_str(r#"{"imageDataUrl":"data:image/png;base64,AAAA"}"#).unwrap();
/// assert_eq!(req.image_data_url, "data:image/png;base64,AAAA");
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayRequest {
    pub image_data_url: String,
}

/// Error body returned by the relay on any failure
///
/// Every relay failure is a 500, so the optional fields carry what a
/// calling client needs to tell terminal failures from transient ones:
///
/// ```
/// use sav_common::api::types::RelayErrorBody;
///
/// let body: RelayErrorBody = serde_json::from_str(
///     r#"{"error":"Malformed upstream response: no name","kind":"MalformedUpstreamResponse","retryable":false,"detail":"no name"}"#,
/// ).unwrap();
/// assert_eq!(body.retryable, Some(false));
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayErrorBody {
    /// Human-readable message
    pub error: String,

    /// Error kind name (e.g. "MalformedUpstreamResponse")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// Whether resubmitting the same request could succeed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,

    /// Message without the kind prefix
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    /// Status the upstream API answered with, when it answered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream_status: Option<u16>,
}

impl RelayErrorBody {
    /// Message-only body
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            kind: None,
            retryable: None,
            detail: None,
            upstream_status: None,
        }
    }
}
