//! Shared API types
//!
//! Wire types used by the valuation client, the relay service and the scan CLI.

pub mod types;

pub use types::{DetectedObject, RelayErrorBody, RelayRequest, ValuationResult};
