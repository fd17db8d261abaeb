/*
[INPUT]:  Failure sources (validation, HTTP transport, remote API, WebSocket)
[OUTPUT]: Classified error type with retry hints and structured context
[POS]:    Error handling layer - unified error taxonomy for the entire crate
[UPDATE]: When adding error sources or changing retry classification
*/

use std::time::Duration;

use thiserror::Error;

use crate::constants::RETRYABLE_STATUS_CODES;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Coarse classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Caller-fixable input problem, never retried
    Validation,
    /// Remote API reported an error
    Api,
    /// Transport level failure (DNS, refused, timeout)
    Network,
    /// WebSocket connection lifecycle failure
    WebSocket,
}

/// Main error type for the NOWPayments adapter
#[derive(Error, Debug)]
pub enum NowPaymentsError {
    /// Request parameters were rejected before any network I/O
    #[error("Validation failed for `{field}`: {message}")]
    Validation { field: String, message: String },

    /// API returned an error response
    #[error("API error (status {status}): {message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
        retry_after: Option<u64>,
    },

    /// HTTP transport failed before a response was received
    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// WebSocket error
    #[error("WebSocket error: {message}")]
    WebSocket {
        message: String,
        #[source]
        source: Option<BoxError>,
    },
}

impl NowPaymentsError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        NowPaymentsError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create an API error from status code and message
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        NowPaymentsError::Api {
            status,
            code: None,
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        NowPaymentsError::Network {
            message: message.into(),
            source: None,
        }
    }

    pub fn websocket(message: impl Into<String>) -> Self {
        NowPaymentsError::WebSocket {
            message: message.into(),
            source: None,
        }
    }

    pub fn websocket_with_source(
        message: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        NowPaymentsError::WebSocket {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            NowPaymentsError::Validation { .. } => ErrorKind::Validation,
            NowPaymentsError::Api { .. } => ErrorKind::Api,
            NowPaymentsError::Network { .. } => ErrorKind::Network,
            NowPaymentsError::WebSocket { .. } => ErrorKind::WebSocket,
        }
    }

    /// HTTP status of an API error
    pub fn status(&self) -> Option<u16> {
        match self {
            NowPaymentsError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Check if the error is retryable by the REST retry policy
    ///
    /// Network failures always are; API failures only for 429 and the
    /// transient 5xx statuses. WebSocket failures are handled by the
    /// reconnection strategy instead.
    pub fn is_retryable(&self) -> bool {
        match self {
            NowPaymentsError::Network { .. } => true,
            NowPaymentsError::Api { status, .. } => RETRYABLE_STATUS_CODES.contains(status),
            NowPaymentsError::Validation { .. } | NowPaymentsError::WebSocket { .. } => false,
        }
    }

    /// Server supplied retry hint
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            NowPaymentsError::Api {
                retry_after: Some(secs),
                ..
            } => Some(Duration::from_secs(*secs)),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for NowPaymentsError {
    fn from(err: reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            "request timed out".to_string()
        } else if err.is_connect() {
            "connection failed".to_string()
        } else {
            err.to_string()
        };
        NowPaymentsError::Network {
            message,
            source: Some(Box::new(err)),
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for NowPaymentsError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        NowPaymentsError::websocket_with_source(err.to_string(), err)
    }
}

/// Result type alias for NOWPayments operations
pub type Result<T> = std::result::Result<T, NowPaymentsError>;
