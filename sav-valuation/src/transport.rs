//! Transport seam between the valuation client and the network
//!
//! The client only sees status codes and bodies. Two deployments satisfy the
//! same contract:
//! - [`UpstreamTransport`] talks to the inference API directly and holds the
//!   credential
//! - [`RelayTransport`] forwards the image to a relay that holds the
//!   credential server-side

use crate::error::ValuationError;
use crate::inference::InferenceRequest;
use async_trait::async_trait;
use sav_common::api::RelayRequest;
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = concat!("sav/", env!("CARGO_PKG_VERSION"));

/// Raw upstream answer; non-success statuses are not errors at this layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Network-level failure: no usable HTTP response was received
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct TransportFault(pub String);

impl From<TransportFault> for ValuationError {
    fn from(fault: TransportFault) -> Self {
        ValuationError::TransportFault(fault.0)
    }
}

impl From<reqwest::Error> for TransportFault {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportFault(format!("request timed out: {}", err))
        } else if err.is_connect() {
            TransportFault(format!("connection failed: {}", err))
        } else {
            TransportFault(err.to_string())
        }
    }
}

/// Sends one built request and returns whatever came back
#[async_trait]
pub trait InferenceTransport: Send + Sync {
    /// Transport identifier for logs (e.g., "upstream", "relay")
    fn name(&self) -> &'static str;

    async fn send(&self, request: &InferenceRequest) -> Result<TransportResponse, TransportFault>;
}

fn build_http_client(timeout: Duration) -> Result<reqwest::Client, ValuationError> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .map_err(|e| ValuationError::Config(format!("HTTP client build failed: {}", e)))
}

async fn read_response(response: reqwest::Response) -> Result<TransportResponse, TransportFault> {
    let status = response.status().as_u16();
    let body = response.text().await?;
    Ok(TransportResponse { status, body })
}

// ========================================
// Direct upstream
// ========================================

/// Posts chat-completion requests straight to the inference API
pub struct UpstreamTransport {
    http_client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl UpstreamTransport {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ValuationError> {
        Ok(Self {
            http_client: build_http_client(timeout)?,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl InferenceTransport for UpstreamTransport {
    fn name(&self) -> &'static str {
        "upstream"
    }

    async fn send(&self, request: &InferenceRequest) -> Result<TransportResponse, TransportFault> {
        tracing::debug!(endpoint = %self.endpoint, model = %request.body().model, "Posting to upstream inference API");

        let response = self
            .http_client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(request.body())
            .send()
            .await?;

        read_response(response).await
    }
}

// ========================================
// Relay
// ========================================

/// Posts `{ imageDataUrl }` to a relay endpoint that holds the credential
pub struct RelayTransport {
    http_client: reqwest::Client,
    relay_url: String,
}

impl RelayTransport {
    pub fn new(relay_url: impl Into<String>, timeout: Duration) -> Result<Self, ValuationError> {
        Ok(Self {
            http_client: build_http_client(timeout)?,
            relay_url: relay_url.into(),
        })
    }

    pub fn relay_url(&self) -> &str {
        &self.relay_url
    }
}

#[async_trait]
impl InferenceTransport for RelayTransport {
    fn name(&self) -> &'static str {
        "relay"
    }

    async fn send(&self, request: &InferenceRequest) -> Result<TransportResponse, TransportFault> {
        tracing::debug!(relay_url = %self.relay_url, "Posting to valuation relay");

        let payload = RelayRequest {
            image_data_url: request.image_data_url().to_string(),
        };

        let response = self
            .http_client
            .post(&self.relay_url)
            .json(&payload)
            .send()
            .await?;

        read_response(response).await
    }
}
