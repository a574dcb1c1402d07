//! Error types for sav-valuation
//!
//! Every failure a valuation call can end in. The client is the only place
//! that decides between retrying and propagating; it does so through
//! [`ValuationError::is_retryable`].

use thiserror::Error;

/// Valuation result type
pub type Result<T> = std::result::Result<T, ValuationError>;

/// Coarse classification of a [`ValuationError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    EmptyInput,
    UpstreamClientError,
    UpstreamServerError,
    TransportFault,
    MalformedUpstreamResponse,
    ExhaustedRetries,
    Cancelled,
    Config,
}

impl ErrorKind {
    /// Stable name used on the relay wire
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::EmptyInput => "EmptyInput",
            ErrorKind::UpstreamClientError => "UpstreamClientError",
            ErrorKind::UpstreamServerError => "UpstreamServerError",
            ErrorKind::TransportFault => "TransportFault",
            ErrorKind::MalformedUpstreamResponse => "MalformedUpstreamResponse",
            ErrorKind::ExhaustedRetries => "ExhaustedRetries",
            ErrorKind::Cancelled => "Cancelled",
            ErrorKind::Config => "Config",
        }
    }

    pub fn from_name(name: &str) -> Option<ErrorKind> {
        match name {
            "EmptyInput" => Some(ErrorKind::EmptyInput),
            "UpstreamClientError" => Some(ErrorKind::UpstreamClientError),
            "UpstreamServerError" => Some(ErrorKind::UpstreamServerError),
            "TransportFault" => Some(ErrorKind::TransportFault),
            "MalformedUpstreamResponse" => Some(ErrorKind::MalformedUpstreamResponse),
            "ExhaustedRetries" => Some(ErrorKind::ExhaustedRetries),
            "Cancelled" => Some(ErrorKind::Cancelled),
            "Config" => Some(ErrorKind::Config),
            _ => None,
        }
    }
}

/// Valuation client errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValuationError {
    /// Caller supplied no image payload; raised before any network activity
    #[error("Image payload is empty")]
    EmptyInput,

    /// Upstream rejected the request (4xx); never retried
    #[error("Upstream rejected request ({status}): {message}")]
    UpstreamClientError { status: u16, message: String },

    /// Upstream failed to serve the request (5xx); transient
    #[error("Upstream server error ({status}): {message}")]
    UpstreamServerError { status: u16, message: String },

    /// Network-level failure (connection refused, timeout, truncated body)
    #[error("Transport fault: {0}")]
    TransportFault(String),

    /// Upstream answered successfully but the body failed validation
    #[error("Malformed upstream response: {0}")]
    MalformedUpstreamResponse(String),

    /// All attempts ended in transient failures
    #[error("Valuation failed after {attempts} attempts: {last_error}")]
    ExhaustedRetries { attempts: u32, last_error: String },

    /// Caller abandoned the call
    #[error("Valuation cancelled after {attempts} attempts")]
    Cancelled { attempts: u32 },

    /// Client could not be constructed
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ValuationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ValuationError::EmptyInput => ErrorKind::EmptyInput,
            ValuationError::UpstreamClientError { .. } => ErrorKind::UpstreamClientError,
            ValuationError::UpstreamServerError { .. } => ErrorKind::UpstreamServerError,
            ValuationError::TransportFault(_) => ErrorKind::TransportFault,
            ValuationError::MalformedUpstreamResponse(_) => ErrorKind::MalformedUpstreamResponse,
            ValuationError::ExhaustedRetries { .. } => ErrorKind::ExhaustedRetries,
            ValuationError::Cancelled { .. } => ErrorKind::Cancelled,
            ValuationError::Config(_) => ErrorKind::Config,
        }
    }

    /// Transient failures the client may retry automatically
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ValuationError::UpstreamServerError { .. } | ValuationError::TransportFault(_)
        )
    }

    /// Whether the failure came from a transient cause
    ///
    /// Unlike [`is_retryable`](Self::is_retryable) this also covers
    /// [`ValuationError::ExhaustedRetries`], whose attempts all failed
    /// transiently. A caller one hop away (behind the relay) may retry these.
    pub fn is_transient(&self) -> bool {
        self.is_retryable() || matches!(self, ValuationError::ExhaustedRetries { .. })
    }

    /// Message without the variant prefix
    pub fn detail(&self) -> String {
        match self {
            ValuationError::UpstreamClientError { message, .. }
            | ValuationError::UpstreamServerError { message, .. } => message.clone(),
            ValuationError::TransportFault(message)
            | ValuationError::MalformedUpstreamResponse(message)
            | ValuationError::Config(message) => message.clone(),
            ValuationError::ExhaustedRetries { last_error, .. } => last_error.clone(),
            ValuationError::EmptyInput | ValuationError::Cancelled { .. } => self.to_string(),
        }
    }

    /// HTTP status the upstream answered with, if it answered at all
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            ValuationError::UpstreamClientError { status, .. }
            | ValuationError::UpstreamServerError { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether re-capturing and resubmitting could plausibly succeed
    ///
    /// Empty input, rejected requests and configuration problems need a fix
    /// before another try makes sense.
    pub fn allows_manual_retry(&self) -> bool {
        !matches!(
            self,
            ValuationError::EmptyInput
                | ValuationError::UpstreamClientError { .. }
                | ValuationError::Config(_)
        )
    }
}
