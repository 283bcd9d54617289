//! Error types for the Vantage core library
//!
//! This module defines the error handling system for the client layer,
//! using thiserror for ergonomic error definitions and anyhow for flexible
//! error contexts.

use std::time::Duration;
use thiserror::Error;

/// Main error type for Vantage client operations
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP/Network related errors
    #[error("HTTP error: {message}")]
    Http {
        message: String,
        status_code: Option<u16>,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// Request rejected because the service's circuit breaker is open
    #[error("Service {service} temporarily unavailable (circuit breaker open)")]
    ServiceUnavailable { service: String },

    /// Request exceeded the configured timeout
    #[error("Request to {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    /// Domain-signaled failure inside a successful HTTP envelope
    #[error("Business error: {message}")]
    Business {
        message: String,
        code: Option<String>,
    },

    /// Authentication expired or rejected (401)
    #[error("Session expired: {message}")]
    SessionExpired { message: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// JSON parsing and serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: serde_json::Error,
    },

    /// Generic internal error with context
    #[error("Internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Convenience type alias for Results using our Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Status code carried by the error, if any
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Http { status_code, .. } => *status_code,
            Error::SessionExpired { .. } => Some(401),
            _ => None,
        }
    }

    /// Render the error as the normalized failure envelope handed to callers
    pub fn to_envelope(&self) -> serde_json::Value {
        serde_json::json!({
            "success": false,
            "message": self.to_string(),
            "data": null,
            "error": {
                "status": self.status_code(),
                "detail": format!("{:?}", self),
            },
        })
    }
}

// Conversion implementations
impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Internal {
            message: err.to_string(),
            source: err,
        }
    }
}
