//! HTTP failure interpretation
//!
//! Maps raw transport responses onto the client error type and decides
//! retry eligibility. Message extraction tolerates the different error
//! body shapes the backend produces.

use serde_json::Value;

use super::transport::TransportResponse;
use crate::notify::ErrorKind;
use crate::Error;

/// Build a client error from a non-2xx transport response.
///
/// A 401 becomes [`Error::SessionExpired`] so the orchestrator can route
/// it through the session-clearing path; everything else surfaces as
/// [`Error::Http`] carrying the status.
pub fn from_response(response: &TransportResponse) -> Error {
    let message = extract_error_message(&response.body)
        .unwrap_or_else(|| format!("HTTP {}", response.status));

    if response.status == 401 {
        Error::SessionExpired { message }
    } else {
        Error::Http {
            message,
            status_code: Some(response.status),
            source: None,
        }
    }
}

/// Whether a failed attempt may be re-issued.
///
/// Connection-level failures, timeouts and 5xx responses are transient;
/// 4xx responses, business failures and expired sessions are not.
pub fn is_retryable(error: &Error) -> bool {
    match error {
        Error::Timeout { .. } => true,
        Error::Http {
            status_code: None, ..
        } => true,
        Error::Http {
            status_code: Some(status),
            ..
        } => ErrorKind::from_status(*status).is_retryable(),
        _ => false,
    }
}

/// Pull a human-readable message out of an error body
fn extract_error_message(body: &Value) -> Option<String> {
    if let Some(message) = body.get("message").and_then(Value::as_str) {
        return Some(message.to_string());
    }
    if let Some(message) = body
        .get("error")
        .and_then(|e| e.get("message"))
        .and_then(Value::as_str)
    {
        return Some(message.to_string());
    }
    if let Some(detail) = body.get("detail").and_then(Value::as_str) {
        return Some(detail.to_string());
    }
    body.as_str().map(|s| s.to_string())
}
