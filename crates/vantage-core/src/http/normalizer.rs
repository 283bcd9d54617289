//! Response normalization
//!
//! Backend endpoints answer either with a bare JSON payload or with the
//! dashboard envelope `{success, message, data, code}`. Both shapes are
//! folded into a single [`ApiResponse`] so callers never branch on the
//! wire format. A 2xx envelope carrying `success: false` is a
//! domain-signaled failure and surfaces as a business error instead.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, Result};

/// Uniform response envelope returned by the client layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub message: String,
    pub data: Value,
    pub timestamp: DateTime<Utc>,
}

impl ApiResponse {
    /// Successful response wrapping the given payload
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            message: "ok".to_string(),
            data,
            timestamp: Utc::now(),
        }
    }

    /// Deserialize the payload into a typed value
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.data.clone()).map_err(Error::from)
    }
}

/// Normalize a successful transport body into the uniform envelope.
///
/// Returns a business error when the body is a dashboard envelope whose
/// `success` flag is false (and `code` is not the conventional 200).
pub fn normalize_response(body: Value) -> Result<ApiResponse> {
    let Some(envelope) = body.as_object() else {
        return Ok(ApiResponse::ok(body));
    };

    let Some(success) = envelope.get("success").and_then(Value::as_bool) else {
        return Ok(ApiResponse::ok(body));
    };

    let message = envelope
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("ok")
        .to_string();

    if !success {
        let code_ok = envelope
            .get("code")
            .and_then(Value::as_u64)
            .map(|c| c == 200)
            .unwrap_or(false);
        if !code_ok {
            return Err(Error::Business {
                message: if message == "ok" {
                    "request failed".to_string()
                } else {
                    message
                },
                code: envelope.get("code").map(|c| c.to_string()),
            });
        }
    }

    let data = envelope.get("data").cloned().unwrap_or(body.clone());

    Ok(ApiResponse {
        success: true,
        message,
        data,
        timestamp: Utc::now(),
    })
}
