//! sav-valuation - image valuation client
//!
//! Turns a captured image into a structured [`ValuationResult`] via a hosted
//! multimodal inference API, tolerating transient upstream failures.
//!
//! Components (leaf first):
//! - [`backoff`]: retry delays and retry eligibility
//! - [`inference`]: outbound request building and response validation
//! - [`retry`]: per-call retry state machine
//! - [`transport`]: network seam (direct upstream or relay)
//! - [`client`]: orchestration

pub mod backoff;
pub mod client;
pub mod error;
pub mod inference;
pub mod retry;
pub mod transport;

pub use backoff::RetryPolicy;
pub use client::ValuationClient;
pub use error::{ErrorKind, Result, ValuationError};
pub use inference::RequestBuilder;
pub use sav_common::{DetectedObject, ValuationResult};
pub use transport::{InferenceTransport, RelayTransport, TransportFault, TransportResponse, UpstreamTransport};
