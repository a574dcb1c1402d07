//! Valuation client
//!
//! The only component that performs network I/O and retry orchestration.
//! Drives a [`RetryMachine`] over an injected [`InferenceTransport`]:
//! build request → send → classify → (wait and resend | finish).
//!
//! Cancellation is caller-driven. Dropping the returned future stops all
//! further attempts; [`ValuationClient::value_image_with_cancel`] does the
//! same through a token and reports how many attempts were made.

use crate::backoff::RetryPolicy;
use crate::error::{ErrorKind, Result, ValuationError};
use crate::inference::{extract_error_message, parse_response, InferenceRequest, RequestBuilder};
use crate::retry::{Event, RetryMachine, Step};
use crate::transport::{InferenceTransport, TransportResponse};
use sav_common::api::RelayErrorBody;
use sav_common::ValuationResult;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Turns captured images into validated valuation results
#[derive(Clone)]
pub struct ValuationClient {
    transport: Arc<dyn InferenceTransport>,
    builder: RequestBuilder,
    policy: RetryPolicy,
}

impl ValuationClient {
    pub fn new(
        transport: Arc<dyn InferenceTransport>,
        builder: RequestBuilder,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            builder,
            policy,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn transport_name(&self) -> &'static str {
        self.transport.name()
    }

    /// Value one image payload (data URL)
    pub async fn value_image(&self, image_data_url: &str) -> Result<ValuationResult> {
        self.value_image_with_cancel(image_data_url, &CancellationToken::new())
            .await
    }

    /// Value one image payload, stopping early once `cancel` fires
    pub async fn value_image_with_cancel(
        &self,
        image_data_url: &str,
        cancel: &CancellationToken,
    ) -> Result<ValuationResult> {
        // EmptyInput surfaces here, before any network activity
        let request = self.builder.build(image_data_url)?;

        let call_id = Uuid::new_v4();
        let mut machine = RetryMachine::new(self.policy.clone());
        machine.handle(Event::Start);

        loop {
            match machine.next_step() {
                Step::Send => {
                    let attempt = machine.state().attempt + 1;
                    debug!(
                        call_id = %call_id,
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        transport = self.transport.name(),
                        "Sending valuation request"
                    );

                    let event = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => Event::Cancelled,
                        outcome = self.attempt(&request) => match outcome {
                            Ok(result) => Event::Succeeded(result),
                            Err(err) => {
                                warn!(call_id = %call_id, attempt, error = %err, "Valuation attempt failed");
                                Event::Failed(err)
                            }
                        },
                    };
                    machine.handle(event);
                }
                Step::Wait(delay) => {
                    info!(
                        call_id = %call_id,
                        attempt = machine.state().attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Transient failure, will retry after backoff"
                    );

                    let event = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => Event::Cancelled,
                        _ = tokio::time::sleep(delay) => Event::DelayElapsed,
                    };
                    machine.handle(event);
                }
                Step::Finish => break,
            }
        }

        let attempts = machine.state().attempt;
        let outcome = machine.into_outcome().ok_or_else(|| {
            ValuationError::Config("retry loop ended without an outcome".to_string())
        })?;

        match &outcome {
            Ok(result) => info!(
                call_id = %call_id,
                attempts,
                item = %result.item_name,
                estimated_value = result.estimated_value,
                detected_objects = result.detected_objects.len(),
                "Valuation succeeded"
            ),
            Err(err) => warn!(
                call_id = %call_id,
                attempts,
                kind = ?err.kind(),
                error = %err,
                "Valuation failed"
            ),
        }

        outcome
    }

    /// One transport round trip, classified
    async fn attempt(&self, request: &InferenceRequest) -> Result<ValuationResult> {
        let response = self.transport.send(request).await?;

        if !response.is_success() {
            return Err(classify_status(&response));
        }

        parse_response(&response.body)
    }
}

/// Map a non-success response onto the error taxonomy
///
/// A relay error body carrying a `kind` is mapped back onto the error the
/// relay hit, so terminal failures behind the relay stay terminal.
/// Otherwise 5xx is transient and everything else that is not 2xx is
/// terminal.
pub fn classify_status(response: &TransportResponse) -> ValuationError {
    if let Some(err) = classify_relay_error(response) {
        return err;
    }

    let message = extract_error_message(&response.body);
    if response.status >= 500 {
        ValuationError::UpstreamServerError {
            status: response.status,
            message,
        }
    } else {
        ValuationError::UpstreamClientError {
            status: response.status,
            message,
        }
    }
}

fn classify_relay_error(response: &TransportResponse) -> Option<ValuationError> {
    let body: RelayErrorBody = serde_json::from_str(&response.body).ok()?;
    let kind = body.kind.as_deref()?;
    let status = body.upstream_status.unwrap_or(response.status);
    let detail = body.detail.clone().unwrap_or_else(|| body.error.clone());

    let err = match ErrorKind::from_name(kind) {
        _ if body.retryable == Some(true) => ValuationError::UpstreamServerError {
            status,
            message: detail,
        },
        Some(ErrorKind::EmptyInput) => ValuationError::EmptyInput,
        Some(ErrorKind::MalformedUpstreamResponse) => {
            ValuationError::MalformedUpstreamResponse(detail)
        }
        Some(ErrorKind::UpstreamClientError) => ValuationError::UpstreamClientError {
            status,
            message: detail,
        },
        Some(ErrorKind::Config) => ValuationError::Config(detail),
        // Rejected caller input and anything the relay reports as final
        _ => ValuationError::UpstreamClientError {
            status: response.status,
            message: body.error,
        },
    };
    Some(err)
}
