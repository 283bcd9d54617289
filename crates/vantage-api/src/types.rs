//! Request/response models for the dashboard API surface
//!
//! Only the shapes callers routinely construct or destructure get a typed
//! model; everything else flows through as JSON.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Credentials for `/auth/login`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Payload returned by `/auth/login`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// An alerting rule as managed by the rules screens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub metric: String,
    pub condition: String,
    pub threshold: f64,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<Value>,
}

fn default_enabled() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rule_defaults() {
        let rule: Rule = serde_json::from_value(json!({
            "name": "cpu-high",
            "metric": "node_cpu_usage",
            "condition": ">",
            "threshold": 0.9,
        }))
        .unwrap();
        assert!(rule.enabled);
        assert!(rule.id.is_none());
    }

    #[test]
    fn test_rule_serialization_skips_absent_id() {
        let rule = Rule {
            id: None,
            name: "cpu-high".to_string(),
            metric: "node_cpu_usage".to_string(),
            condition: ">".to_string(),
            threshold: 0.9,
            severity: Some("warning".to_string()),
            enabled: true,
            labels: None,
        };
        let value = serde_json::to_value(&rule).unwrap();
        assert!(value.get("id").is_none());
        assert_eq!(value["threshold"], 0.9);
    }
}
