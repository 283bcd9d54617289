//! Tests of the domain wrappers: paths, payload binding and token handling

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};

use vantage_api::{ApiService, LoginRequest, Rule};
use vantage_core::http::{Transport, TransportRequest, TransportResponse};
use vantage_core::{ClientConfig, HttpOrchestrator, Method};

/// Records every request and answers from a canned response table
struct RecordingTransport {
    seen: Mutex<Vec<(Method, String, Option<Value>)>>,
    calls: AtomicU32,
}

impl RecordingTransport {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            seen: Mutex::new(Vec::new()),
            calls: AtomicU32::new(0),
        })
    }

    fn last(&self) -> (Method, String, Option<Value>) {
        self.seen.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait::async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, request: TransportRequest) -> vantage_core::Result<TransportResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push((
            request.method.clone(),
            request.url.clone(),
            request.body.clone(),
        ));
        let body = match request.url.as_str() {
            "/api/v1/auth/login" => json!({
                "success": true,
                "data": {"access_token": "tok-123", "token_type": "bearer"},
            }),
            _ => json!({"success": true, "data": {}}),
        };
        Ok(TransportResponse { status: 200, body })
    }
}

fn service(transport: Arc<RecordingTransport>) -> ApiService {
    let config = ClientConfig::new("/api/v1")
        .with_timeout(Duration::from_secs(2))
        .with_retry_delay(Duration::from_millis(10));
    let client = HttpOrchestrator::builder(config)
        .transport(transport)
        .build()
        .unwrap();
    ApiService::new(Arc::new(client))
}

#[tokio::test]
async fn login_stores_the_returned_token() {
    let transport = RecordingTransport::new();
    let api = service(Arc::clone(&transport));

    let login = api
        .login(&LoginRequest {
            username: "ops".to_string(),
            password: "hunter2".to_string(),
        })
        .await
        .unwrap();

    assert_eq!(login.access_token, "tok-123");
    assert!(api.client().tokens().is_authenticated());

    let (method, url, body) = transport.last();
    assert_eq!(method, Method::POST);
    assert_eq!(url, "/api/v1/auth/login");
    assert_eq!(body.unwrap()["username"], "ops");
}

#[tokio::test]
async fn logout_drops_the_token() {
    let transport = RecordingTransport::new();
    let api = service(Arc::clone(&transport));
    api.client().tokens().set("tok-123");

    api.logout().await.unwrap();
    assert!(!api.client().tokens().is_authenticated());
    assert_eq!(transport.last().1, "/api/v1/auth/logout");
}

#[tokio::test]
async fn metric_history_binds_the_metric_into_the_path() {
    let transport = RecordingTransport::new();
    let api = service(Arc::clone(&transport));

    api.metric_history("node_cpu_usage", &[("range", "1h")])
        .await
        .unwrap();

    let (method, url, _) = transport.last();
    assert_eq!(method, Method::GET);
    assert_eq!(url, "/api/v1/metrics/node_cpu_usage/history");
}

#[tokio::test]
async fn rule_crud_uses_the_expected_paths() {
    let transport = RecordingTransport::new();
    let api = service(Arc::clone(&transport));
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

    api.create_rule(&rule).await.unwrap();
    let (method, url, body) = transport.last();
    assert_eq!(method, Method::POST);
    assert_eq!(url, "/api/v1/rules");
    assert_eq!(body.unwrap()["name"], "cpu-high");

    api.update_rule("42", &rule).await.unwrap();
    let (method, url, _) = transport.last();
    assert_eq!(method, Method::PUT);
    assert_eq!(url, "/api/v1/rules/42");

    api.delete_rule("42").await.unwrap();
    let (method, url, _) = transport.last();
    assert_eq!(method, Method::DELETE);
    assert_eq!(url, "/api/v1/rules/42");
}

#[tokio::test]
async fn mutating_a_rule_refreshes_the_cached_listing() {
    let transport = RecordingTransport::new();
    let api = service(Arc::clone(&transport));

    api.rules(&[]).await.unwrap();
    api.rules(&[]).await.unwrap();
    assert_eq!(transport.calls.load(Ordering::SeqCst), 1);

    api.delete_rule("42").await.unwrap();
    api.rules(&[]).await.unwrap();
    assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn system_and_notification_queries_hit_their_endpoints() {
    let transport = RecordingTransport::new();
    let api = service(Arc::clone(&transport));

    api.system_info().await.unwrap();
    assert_eq!(transport.last().1, "/api/v1/system/info");

    api.notification_channels().await.unwrap();
    assert_eq!(transport.last().1, "/api/v1/notifications/channels");

    api.anomalies(&[("window", "15m")]).await.unwrap();
    assert_eq!(transport.last().1, "/api/v1/anomalies");
}
