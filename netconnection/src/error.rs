// netconnection/src/error.rs
use serde::Serialize;
use thiserror::Error;

/// Failure reported by a [`Transport`](crate::http::Transport) implementation.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("request failed: {0}")]
    Request(String),
    /// The status line arrived but the body could not be read.
    #[error("failed to read response body (HTTP {status}): {message}")]
    Body { status: u16, message: String },
    #[error("transport panicked: {0}")]
    Panicked(String),
    /// The request task ended without an outcome, e.g. runtime shutdown.
    #[error("request abandoned: {0}")]
    Abandoned(String),
}

impl TransportError {
    /// True when a response was received before the failure.
    pub fn response_received(&self) -> bool {
        matches!(self, TransportError::Body { .. })
    }

    /// Failures reported as [`NetworkError::UNDEFINED_EXCEPTION`] rather than
    /// [`NetworkError::API_CALL_FAIL`].
    pub fn is_processing_failure(&self) -> bool {
        matches!(self, TransportError::Body { .. } | TransportError::Panicked(_))
    }
}

#[cfg(feature = "reqwest")]
impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect() {
            Self::Connect(err.to_string())
        } else {
            Self::Request(err.to_string())
        }
    }
}

/// Error value handed to [`NetworkDelegate::on_failure`](crate::NetworkDelegate::on_failure).
///
/// `code` is either an HTTP status or one of the negative sentinel codes below.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("error {code}: {message}")]
pub struct NetworkError {
    pub code: i32,
    pub message: String,
}

impl NetworkError {
    pub const UNDEFINED_EXCEPTION: i32 = -1;
    pub const NETWORK_NOT_REACHABLE: i32 = -2;
    pub const API_CALL_FAIL: i32 = -3;

    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// True for the negative codes reserved for non-HTTP failures.
    pub fn is_sentinel(&self) -> bool {
        self.code < 0
    }
}
