//! # SAV Common Library
//!
//! Shared code for the school asset valuation crates:
//! - Valuation result and relay wire types
//! - Configuration loading (TOML + environment)
//! - Logging bootstrap
//! - Common error type

pub mod api;
pub mod config;
pub mod error;
pub mod logging;

pub use api::types::{DetectedObject, ValuationResult};
pub use error::{Error, Result};
