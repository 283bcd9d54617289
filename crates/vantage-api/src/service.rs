//! Domain API surface over the core request pipeline
//!
//! Every method here is a thin parameter-binding wrapper: path plus
//! payload in, normalized response out. Resilience (retry, breaking,
//! caching, error routing) lives entirely in `vantage-core`.

use std::sync::Arc;

use serde_json::Value;

use vantage_core::{ApiResponse, ClientConfig, HttpOrchestrator, Result};

use crate::types::{LoginRequest, LoginResponse, Rule};

/// Typed access to the dashboard backend endpoints
#[derive(Clone)]
pub struct ApiService {
    client: Arc<HttpOrchestrator>,
}

impl ApiService {
    pub fn new(client: Arc<HttpOrchestrator>) -> Self {
        Self { client }
    }

    /// Build a service (and its orchestrator) straight from configuration
    pub fn from_config(config: ClientConfig) -> Result<Self> {
        Ok(Self::new(Arc::new(HttpOrchestrator::new(config)?)))
    }

    /// Underlying orchestrator, for diagnostics and cache control
    pub fn client(&self) -> &Arc<HttpOrchestrator> {
        &self.client
    }

    // -------- authentication --------

    /// Authenticate and store the returned bearer credential
    pub async fn login(&self, credentials: &LoginRequest) -> Result<LoginResponse> {
        let response = self
            .client
            .post("/auth/login", serde_json::to_value(credentials)?)
            .await?;
        let login: LoginResponse = response.decode()?;
        self.client.tokens().set(login.access_token.as_str());
        Ok(login)
    }

    /// End the session server-side and drop the stored credential
    pub async fn logout(&self) -> Result<()> {
        let result = self.client.post("/auth/logout", Value::Null).await;
        self.client.tokens().clear();
        result.map(|_| ())
    }

    pub async fn current_user(&self) -> Result<ApiResponse> {
        self.client.get("/users/me", &[]).await
    }

    // -------- monitor source configuration --------

    pub async fn monitor_config(&self) -> Result<ApiResponse> {
        self.client.get("/monitor/config", &[]).await
    }

    pub async fn update_monitor_config(&self, config: Value) -> Result<ApiResponse> {
        self.client.post("/monitor/config", config).await
    }

    pub async fn test_monitor_connection(&self, config: Value) -> Result<ApiResponse> {
        self.client.post("/monitor/test", config).await
    }

    // -------- metrics --------

    pub async fn metrics(&self, params: &[(&str, &str)]) -> Result<ApiResponse> {
        self.client.get("/metrics", params).await
    }

    pub async fn metric_history(
        &self,
        metric: &str,
        params: &[(&str, &str)],
    ) -> Result<ApiResponse> {
        self.client
            .get(&format!("/metrics/{}/history", metric), params)
            .await
    }

    // -------- anomaly detection & AI analysis --------

    pub async fn anomalies(&self, params: &[(&str, &str)]) -> Result<ApiResponse> {
        self.client.get("/anomalies", params).await
    }

    pub async fn analyze(&self, payload: Value) -> Result<ApiResponse> {
        self.client.post("/ai/analyze", payload).await
    }

    // -------- rule management --------

    pub async fn rules(&self, params: &[(&str, &str)]) -> Result<ApiResponse> {
        self.client.get("/rules", params).await
    }

    pub async fn create_rule(&self, rule: &Rule) -> Result<ApiResponse> {
        self.client.post("/rules", serde_json::to_value(rule)?).await
    }

    pub async fn update_rule(&self, id: &str, rule: &Rule) -> Result<ApiResponse> {
        self.client
            .put(&format!("/rules/{}", id), serde_json::to_value(rule)?)
            .await
    }

    pub async fn delete_rule(&self, id: &str) -> Result<ApiResponse> {
        self.client.delete(&format!("/rules/{}", id)).await
    }

    // -------- notifications --------

    pub async fn notifications(&self, params: &[(&str, &str)]) -> Result<ApiResponse> {
        self.client.get("/notifications", params).await
    }

    pub async fn notification_channels(&self) -> Result<ApiResponse> {
        self.client.get("/notifications/channels", &[]).await
    }

    // -------- system --------

    pub async fn system_info(&self) -> Result<ApiResponse> {
        self.client.get("/system/info", &[]).await
    }

    pub async fn system_services(&self) -> Result<ApiResponse> {
        self.client.get("/system/services", &[]).await
    }
}
