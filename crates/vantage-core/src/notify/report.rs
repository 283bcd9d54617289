//! Failure taxonomy and classification heuristics
//!
//! Normalizes arbitrary failures into a uniform report that drives retry
//! decisions, user notifications and remote error reporting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Error;

/// Classification of failures for routing and retry logic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Connection-level failures (unreachable host, reset, timeout)
    Network,
    /// Non-2xx server responses (5xx)
    Api,
    /// Request shape rejected by the server (4xx other than auth)
    Validation,
    /// Authentication or authorization rejected (401/403)
    Permission,
    /// Domain-signaled failure inside a 2xx envelope
    Business,
    /// Unclassified failures
    Unknown,
}

impl ErrorKind {
    /// Check if this failure kind is eligible for a local retry
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Network | ErrorKind::Api)
    }

    /// Classify an HTTP status code
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => ErrorKind::Permission,
            400..=499 => ErrorKind::Validation,
            500..=599 => ErrorKind::Api,
            _ => ErrorKind::Unknown,
        }
    }

    /// Classify by keyword matching on an error message
    pub fn from_message(message: &str) -> Self {
        let message = message.to_lowercase();
        if message.contains("network")
            || message.contains("connection")
            || message.contains("timeout")
            || message.contains("timed out")
            || message.contains("dns")
        {
            ErrorKind::Network
        } else if message.contains("unauthorized")
            || message.contains("forbidden")
            || message.contains("session expired")
            || message.contains("permission")
        {
            ErrorKind::Permission
        } else if message.contains("validation") || message.contains("invalid") {
            ErrorKind::Validation
        } else if message.contains("business") {
            ErrorKind::Business
        } else {
            ErrorKind::Unknown
        }
    }
}

/// Severity attached to a classified failure
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum ErrorLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl ErrorLevel {
    /// Default severity for a failure kind
    pub fn for_kind(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::Business => ErrorLevel::Low,
            ErrorKind::Network | ErrorKind::Validation | ErrorKind::Unknown => ErrorLevel::Medium,
            ErrorKind::Api | ErrorKind::Permission => ErrorLevel::High,
        }
    }

    /// Escalate based on keyword matching on the message
    pub fn from_message(message: &str, kind: ErrorKind) -> Self {
        let lowered = message.to_lowercase();
        if lowered.contains("critical") || lowered.contains("fatal") {
            ErrorLevel::Critical
        } else {
            Self::for_kind(kind)
        }
    }
}

/// Normalized failure record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub level: ErrorLevel,
    pub message: String,
    pub detail: Option<String>,
    pub code: Option<String>,
    pub context: Option<Value>,
    pub timestamp: DateTime<Utc>,
}

impl ErrorReport {
    /// Build a report from a bare message, classifying by heuristics
    pub fn from_message(message: impl Into<String>, context: Option<Value>) -> Self {
        let message = message.into();
        let kind = ErrorKind::from_message(&message);
        let level = ErrorLevel::from_message(&message, kind);
        Self {
            kind,
            level,
            message,
            detail: None,
            code: None,
            context,
            timestamp: Utc::now(),
        }
    }

    /// Build a report from a client error, preferring the status code over
    /// message heuristics when one is present
    pub fn from_error(error: &Error, context: Option<Value>) -> Self {
        let message = error.to_string();
        let kind = match error {
            Error::ServiceUnavailable { .. } => ErrorKind::Network,
            Error::Timeout { .. } => ErrorKind::Network,
            Error::Business { .. } => ErrorKind::Business,
            Error::SessionExpired { .. } => ErrorKind::Permission,
            Error::Http {
                status_code: Some(status),
                ..
            } => ErrorKind::from_status(*status),
            Error::Http {
                status_code: None, ..
            } => ErrorKind::Network,
            _ => ErrorKind::from_message(&message),
        };
        let code = match error {
            Error::Business { code, .. } => code.clone(),
            _ => error.status_code().map(|s| s.to_string()),
        };
        Self {
            kind,
            level: ErrorLevel::from_message(&message, kind),
            message,
            detail: Some(format!("{:?}", error)),
            code,
            context,
            timestamp: Utc::now(),
        }
    }

    /// Attach a free-form detail string
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert_eq!(ErrorKind::from_status(401), ErrorKind::Permission);
        assert_eq!(ErrorKind::from_status(403), ErrorKind::Permission);
        assert_eq!(ErrorKind::from_status(400), ErrorKind::Validation);
        assert_eq!(ErrorKind::from_status(422), ErrorKind::Validation);
        assert_eq!(ErrorKind::from_status(500), ErrorKind::Api);
        assert_eq!(ErrorKind::from_status(503), ErrorKind::Api);
        assert_eq!(ErrorKind::from_status(302), ErrorKind::Unknown);
    }

    #[test]
    fn test_message_classification() {
        assert_eq!(
            ErrorKind::from_message("Network connection refused"),
            ErrorKind::Network
        );
        assert_eq!(
            ErrorKind::from_message("request timed out"),
            ErrorKind::Network
        );
        assert_eq!(
            ErrorKind::from_message("403 Forbidden"),
            ErrorKind::Permission
        );
        assert_eq!(
            ErrorKind::from_message("invalid rule payload"),
            ErrorKind::Validation
        );
        assert_eq!(ErrorKind::from_message("boom"), ErrorKind::Unknown);
    }

    #[test]
    fn test_retryability() {
        assert!(ErrorKind::Network.is_retryable());
        assert!(ErrorKind::Api.is_retryable());
        assert!(!ErrorKind::Validation.is_retryable());
        assert!(!ErrorKind::Permission.is_retryable());
        assert!(!ErrorKind::Business.is_retryable());
        assert!(!ErrorKind::Unknown.is_retryable());
    }

    #[test]
    fn test_level_ordering() {
        assert!(ErrorLevel::Low < ErrorLevel::Medium);
        assert!(ErrorLevel::Medium < ErrorLevel::High);
        assert!(ErrorLevel::High < ErrorLevel::Critical);
    }

    #[test]
    fn test_level_escalation_keyword() {
        assert_eq!(
            ErrorLevel::from_message("critical store corruption", ErrorKind::Unknown),
            ErrorLevel::Critical
        );
        assert_eq!(
            ErrorLevel::from_message("plain failure", ErrorKind::Business),
            ErrorLevel::Low
        );
    }

    #[test]
    fn test_report_from_error_prefers_status() {
        let err = Error::Http {
            message: "validation hiccup".to_string(),
            status_code: Some(503),
            source: None,
        };
        let report = ErrorReport::from_error(&err, None);
        assert_eq!(report.kind, ErrorKind::Api);
        assert_eq!(report.code.as_deref(), Some("503"));
        assert!(report.detail.is_some());
    }

    #[test]
    fn test_report_from_session_expiry() {
        let err = Error::SessionExpired {
            message: "token rejected".to_string(),
        };
        let report = ErrorReport::from_error(&err, None);
        assert_eq!(report.kind, ErrorKind::Permission);
        assert_eq!(report.level, ErrorLevel::High);
    }
}
