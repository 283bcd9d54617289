//! In-flight request tracking
//!
//! Every outbound call is registered here under a generated identifier.
//! The tracker enforces the per-attempt timeout through a watchdog task,
//! hands terminal outcomes to the circuit breaker registry, keeps a
//! bounded history of completed calls and derives per-service health and
//! error statistics from it.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Serialize;
use serde_json::Value;
use tokio::task::JoinHandle;

use super::breaker::CircuitBreakerRegistry;
use super::service_key;
use crate::notify::ErrorKind;
use crate::{Error, Result};

/// Completed records kept before the oldest block is evicted
const HISTORY_CAPACITY: usize = 1000;
/// Number of oldest records dropped when the capacity is exceeded
const HISTORY_EVICTION: usize = 100;
/// Duration above which a completed request is logged as slow
const SLOW_REQUEST: Duration = Duration::from_millis(3000);
/// Window for service health statistics
const HEALTH_WINDOW: Duration = Duration::from_secs(5 * 60);
/// Window for error statistics
const ERROR_WINDOW: Duration = Duration::from_secs(10 * 60);
/// Records older than this are pruned by the health check task
const HISTORY_MAX_AGE: Duration = Duration::from_secs(60 * 60);
/// Cadence of the background health check
const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Opaque identifier of a tracked request
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(String);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl RequestId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Lifecycle state of a tracked request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Success,
    Error,
    Timeout,
}

/// One tracked outbound call
#[derive(Debug, Clone)]
pub struct RequestRecord {
    pub id: RequestId,
    pub url: String,
    pub method: String,
    pub status: RequestStatus,
    pub started_at: Instant,
    pub finished_at: Option<Instant>,
    pub retry_count: u32,
    pub last_error: Option<String>,
}

impl RequestRecord {
    /// Wall time spent on the request so far, or total once terminal
    pub fn duration(&self) -> Duration {
        self.finished_at
            .map(|end| end.duration_since(self.started_at))
            .unwrap_or_else(|| self.started_at.elapsed())
    }

    fn to_json(&self) -> Value {
        serde_json::json!({
            "id": self.id.as_str(),
            "url": self.url,
            "method": self.method,
            "status": self.status,
            "duration_ms": self.duration().as_millis() as u64,
            "retry_count": self.retry_count,
            "last_error": self.last_error,
        })
    }
}

struct ActiveEntry {
    record: RequestRecord,
    watchdog: Option<JoinHandle<()>>,
}

/// Health grading for one service over the recent window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Per-service statistics derived from the request history
#[derive(Debug, Clone, Serialize)]
pub struct ServiceHealth {
    pub status: HealthStatus,
    pub success_rate: f64,
    pub avg_response_ms: f64,
    pub recent_errors: u32,
}

/// Aggregated error statistics over the recent window
#[derive(Debug, Clone, Serialize)]
pub struct ErrorStats {
    pub total: usize,
    pub by_kind: HashMap<String, u32>,
    pub recent: Vec<Value>,
}

struct TrackerShared {
    api_prefix: String,
    active: Mutex<HashMap<String, ActiveEntry>>,
    history: Mutex<VecDeque<RequestRecord>>,
    breakers: Arc<CircuitBreakerRegistry>,
}

impl TrackerShared {
    /// Terminal transition for a request. Idempotent: once a record has
    /// moved to history, later calls for the same id are no-ops.
    fn finish(&self, id: &RequestId, status: RequestStatus, error: Option<String>) {
        let record = {
            let mut active = self.active.lock().unwrap();
            let Some(mut entry) = active.remove(id.as_str()) else {
                return;
            };
            if let Some(watchdog) = entry.watchdog.take() {
                watchdog.abort();
            }
            entry.record.status = status;
            entry.record.finished_at = Some(Instant::now());
            entry.record.last_error = error;
            entry.record
        };

        let key = service_key::resolve(&record.url, &self.api_prefix);
        if status == RequestStatus::Success {
            self.breakers.record_success(&key);
        } else {
            self.breakers.record_failure(&key);
        }

        let duration = record.duration();
        if duration > SLOW_REQUEST {
            log::warn!(
                "slow request: {} {} took {}ms",
                record.method,
                record.url,
                duration.as_millis()
            );
        }

        let mut history = self.history.lock().unwrap();
        history.push_back(record);
        if history.len() > HISTORY_CAPACITY {
            history.drain(..HISTORY_EVICTION);
        }
    }
}

/// Registry of in-flight requests with timeout enforcement and retry budget
pub struct RequestTracker {
    shared: Arc<TrackerShared>,
    timeout: Duration,
    max_retries: u32,
    sequence: AtomicU64,
    health_task: Mutex<Option<JoinHandle<()>>>,
}

impl RequestTracker {
    pub fn new(
        api_prefix: impl Into<String>,
        timeout: Duration,
        max_retries: u32,
        breakers: Arc<CircuitBreakerRegistry>,
    ) -> Self {
        Self {
            shared: Arc::new(TrackerShared {
                api_prefix: api_prefix.into(),
                active: Mutex::new(HashMap::new()),
                history: Mutex::new(VecDeque::new()),
                breakers,
            }),
            timeout,
            max_retries,
            sequence: AtomicU64::new(0),
            health_task: Mutex::new(None),
        }
    }

    /// Register a new pending request and arm its timeout watchdog.
    ///
    /// Rejects without side effects when the circuit breaker for the
    /// resolved service is open.
    pub fn start_request(&self, url: &str, method: &str) -> Result<RequestId> {
        let key = service_key::resolve(url, &self.shared.api_prefix);
        if self.shared.breakers.is_open(&key) {
            return Err(Error::ServiceUnavailable { service: key });
        }

        let id = self.generate_id(url, method);
        let record = RequestRecord {
            id: id.clone(),
            url: url.to_string(),
            method: method.to_uppercase(),
            status: RequestStatus::Pending,
            started_at: Instant::now(),
            finished_at: None,
            retry_count: 0,
            last_error: None,
        };

        self.shared.active.lock().unwrap().insert(
            id.as_str().to_string(),
            ActiveEntry {
                record,
                watchdog: None,
            },
        );
        self.arm_watchdog(&id);

        Ok(id)
    }

    /// Record the terminal outcome of a request. Idempotent per id.
    pub fn finish_request(&self, id: &RequestId, status: RequestStatus, error: Option<String>) {
        self.shared.finish(id, status, error);
    }

    /// Consume one retry slot for a pending-again request.
    ///
    /// Returns false once the retry budget is spent or the record is no
    /// longer active; otherwise resets the record to pending, restarts its
    /// clock and watchdog, and returns true. The caller is expected to
    /// re-issue the call after its backoff delay.
    pub fn retry_request(&self, id: &RequestId) -> bool {
        {
            let mut active = self.shared.active.lock().unwrap();
            let Some(entry) = active.get_mut(id.as_str()) else {
                return false;
            };
            if entry.record.retry_count >= self.max_retries {
                return false;
            }
            entry.record.retry_count += 1;
            entry.record.status = RequestStatus::Pending;
            entry.record.started_at = Instant::now();
            log::info!(
                "retrying request ({}/{}): {} {}",
                entry.record.retry_count,
                self.max_retries,
                entry.record.method,
                entry.record.url
            );
        }
        self.arm_watchdog(id);
        true
    }

    /// Retry count recorded for an active request
    pub fn retry_count(&self, id: &RequestId) -> Option<u32> {
        self.shared
            .active
            .lock()
            .unwrap()
            .get(id.as_str())
            .map(|entry| entry.record.retry_count)
    }

    /// Snapshot of an active request
    pub fn record(&self, id: &RequestId) -> Option<RequestRecord> {
        self.shared
            .active
            .lock()
            .unwrap()
            .get(id.as_str())
            .map(|entry| entry.record.clone())
    }

    /// Number of requests currently in flight
    pub fn active_count(&self) -> usize {
        self.shared.active.lock().unwrap().len()
    }

    /// Per-service health over the last five minutes of history
    pub fn service_health(&self) -> HashMap<String, ServiceHealth> {
        struct Tally {
            total: u32,
            success: u32,
            errors: u32,
            total_ms: u128,
        }

        let mut tallies: HashMap<String, Tally> = HashMap::new();
        {
            let history = self.shared.history.lock().unwrap();
            for record in history.iter() {
                if record.started_at.elapsed() > HEALTH_WINDOW {
                    continue;
                }
                let key = service_key::resolve(&record.url, &self.shared.api_prefix);
                let tally = tallies.entry(key).or_insert(Tally {
                    total: 0,
                    success: 0,
                    errors: 0,
                    total_ms: 0,
                });
                tally.total += 1;
                if record.status == RequestStatus::Success {
                    tally.success += 1;
                    tally.total_ms += record.duration().as_millis();
                } else {
                    tally.errors += 1;
                }
            }
        }

        tallies
            .into_iter()
            .map(|(key, tally)| {
                let success_rate = if tally.total > 0 {
                    f64::from(tally.success) / f64::from(tally.total) * 100.0
                } else {
                    100.0
                };
                let avg_response_ms = if tally.success > 0 {
                    tally.total_ms as f64 / f64::from(tally.success)
                } else {
                    0.0
                };
                let status = if success_rate < 90.0 || avg_response_ms > 3000.0 || tally.errors > 10
                {
                    HealthStatus::Unhealthy
                } else if success_rate < 95.0 || avg_response_ms > 1500.0 || tally.errors > 5 {
                    HealthStatus::Degraded
                } else {
                    HealthStatus::Healthy
                };
                (
                    key,
                    ServiceHealth {
                        status,
                        success_rate,
                        avg_response_ms,
                        recent_errors: tally.errors,
                    },
                )
            })
            .collect()
    }

    /// Error statistics over the last ten minutes of history
    pub fn error_stats(&self) -> ErrorStats {
        let history = self.shared.history.lock().unwrap();
        let recent_errors: Vec<&RequestRecord> = history
            .iter()
            .filter(|r| r.status != RequestStatus::Success)
            .filter(|r| r.started_at.elapsed() <= ERROR_WINDOW)
            .collect();

        let mut by_kind: HashMap<String, u32> = HashMap::new();
        for record in &recent_errors {
            let kind = match record.status {
                RequestStatus::Timeout => ErrorKind::Network,
                _ => record
                    .last_error
                    .as_deref()
                    .map(ErrorKind::from_message)
                    .unwrap_or(ErrorKind::Unknown),
            };
            *by_kind.entry(format!("{:?}", kind)).or_insert(0) += 1;
        }

        ErrorStats {
            total: recent_errors.len(),
            by_kind,
            recent: recent_errors
                .iter()
                .rev()
                .take(10)
                .rev()
                .map(|r| r.to_json())
                .collect(),
        }
    }

    /// Full diagnostic dump: active requests, recent history, breaker and
    /// health state
    pub fn export_diagnostics(&self) -> Value {
        let active: Vec<Value> = {
            let guard = self.shared.active.lock().unwrap();
            guard.values().map(|e| e.record.to_json()).collect()
        };
        let history: Vec<Value> = {
            let guard = self.shared.history.lock().unwrap();
            guard.iter().rev().take(100).rev().map(|r| r.to_json()).collect()
        };
        serde_json::json!({
            "active_requests": active,
            "request_history": history,
            "circuit_breakers": self.shared.breakers.snapshot(),
            "service_health": self.service_health(),
            "error_stats": self.error_stats(),
            "timestamp": chrono::Utc::now(),
        })
    }

    /// Drop all tracked state (active watchdogs included)
    pub fn clear(&self) {
        let mut active = self.shared.active.lock().unwrap();
        for entry in active.values_mut() {
            if let Some(watchdog) = entry.watchdog.take() {
                watchdog.abort();
            }
        }
        active.clear();
        drop(active);
        self.shared.history.lock().unwrap().clear();
        self.shared.breakers.clear();
    }

    /// Start the periodic health check task. Idempotent; requires a tokio
    /// runtime.
    pub fn spawn_health_check(&self) {
        let mut task = self.health_task.lock().unwrap();
        if task.is_some() {
            return;
        }
        let shared = Arc::clone(&self.shared);
        *task = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(HEALTH_CHECK_INTERVAL);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            interval.tick().await;
            loop {
                interval.tick().await;
                let mut history = shared.history.lock().unwrap();
                history.retain(|r| r.started_at.elapsed() < HISTORY_MAX_AGE);
                let errors = history
                    .iter()
                    .filter(|r| r.status != RequestStatus::Success)
                    .filter(|r| r.started_at.elapsed() <= HEALTH_WINDOW)
                    .count();
                drop(history);
                if errors > 10 {
                    log::warn!("health check: {} request errors in the last 5 minutes", errors);
                }
            }
        }));
    }

    /// Stop background tasks and abort outstanding watchdogs
    pub fn shutdown(&self) {
        if let Some(task) = self.health_task.lock().unwrap().take() {
            task.abort();
        }
        let mut active = self.shared.active.lock().unwrap();
        for entry in active.values_mut() {
            if let Some(watchdog) = entry.watchdog.take() {
                watchdog.abort();
            }
        }
    }

    fn generate_id(&self, url: &str, method: &str) -> RequestId {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let entropy: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(9)
            .map(char::from)
            .collect();
        RequestId(format!(
            "{}_{}_{}_{}",
            method.to_lowercase(),
            url,
            seq,
            entropy
        ))
    }

    /// (Re)arm the timeout watchdog for a request. If the record is still
    /// pending when the timer fires, it completes through the same path as
    /// a failure, with timeout status.
    fn arm_watchdog(&self, id: &RequestId) {
        let shared = Arc::clone(&self.shared);
        let timeout = self.timeout;
        let watchdog_id = id.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let still_pending = {
                let active = shared.active.lock().unwrap();
                active
                    .get(watchdog_id.as_str())
                    .map(|entry| entry.record.status == RequestStatus::Pending)
                    .unwrap_or(false)
            };
            if still_pending {
                shared.finish(
                    &watchdog_id,
                    RequestStatus::Timeout,
                    Some(format!("request timeout after {:?}", timeout)),
                );
            }
        });

        let mut active = self.shared.active.lock().unwrap();
        if let Some(entry) = active.get_mut(id.as_str()) {
            if let Some(previous) = entry.watchdog.replace(handle) {
                previous.abort();
            }
        } else {
            // Finished before the watchdog was stored
            handle.abort();
        }
    }
}

impl Drop for RequestTracker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BreakerConfig;
    use crate::notify::LogSink;

    fn breakers(threshold: u32) -> Arc<CircuitBreakerRegistry> {
        Arc::new(CircuitBreakerRegistry::new(
            BreakerConfig {
                enabled: true,
                threshold,
                cooldown: Duration::from_secs(30),
            },
            Arc::new(LogSink),
        ))
    }

    fn tracker(timeout: Duration, max_retries: u32, threshold: u32) -> RequestTracker {
        RequestTracker::new("/api/v1", timeout, max_retries, breakers(threshold))
    }

    #[tokio::test]
    async fn test_start_and_finish_lifecycle() {
        let tracker = tracker(Duration::from_secs(15), 3, 5);
        let id = tracker.start_request("/api/v1/metrics", "get").unwrap();

        assert_eq!(tracker.active_count(), 1);
        let record = tracker.record(&id).unwrap();
        assert_eq!(record.status, RequestStatus::Pending);
        assert_eq!(record.method, "GET");

        tracker.finish_request(&id, RequestStatus::Success, None);
        assert_eq!(tracker.active_count(), 0);
        assert!(tracker.record(&id).is_none());
    }

    #[tokio::test]
    async fn test_finish_is_idempotent_for_breaker_counters() {
        let tracker = tracker(Duration::from_secs(15), 3, 5);
        let breakers = Arc::clone(&tracker.shared.breakers);

        let id = tracker.start_request("/api/v1/metrics", "GET").unwrap();
        tracker.finish_request(&id, RequestStatus::Error, Some("boom".to_string()));
        tracker.finish_request(&id, RequestStatus::Error, Some("boom".to_string()));
        tracker.finish_request(&id, RequestStatus::Error, Some("boom".to_string()));

        assert_eq!(breakers.snapshot()["metrics"].failures, 1);
    }

    #[tokio::test]
    async fn test_breaker_open_rejects_start() {
        let tracker = tracker(Duration::from_secs(15), 3, 2);

        for _ in 0..2 {
            let id = tracker.start_request("/api/v1/metrics", "GET").unwrap();
            tracker.finish_request(&id, RequestStatus::Error, Some("boom".to_string()));
        }

        let err = tracker.start_request("/api/v1/metrics", "GET").unwrap_err();
        assert!(matches!(err, Error::ServiceUnavailable { .. }));
        assert_eq!(tracker.active_count(), 0);

        // Other services are unaffected
        assert!(tracker.start_request("/api/v1/rules", "GET").is_ok());
    }

    #[tokio::test]
    async fn test_retry_budget() {
        let tracker = tracker(Duration::from_secs(15), 2, 5);
        let id = tracker.start_request("/api/v1/metrics", "GET").unwrap();

        assert!(tracker.retry_request(&id));
        assert!(tracker.retry_request(&id));
        assert!(!tracker.retry_request(&id));
        assert_eq!(tracker.retry_count(&id), Some(2));

        tracker.finish_request(&id, RequestStatus::Error, Some("exhausted".to_string()));
        assert!(!tracker.retry_request(&id));
    }

    #[tokio::test]
    async fn test_watchdog_times_out_pending_request() {
        let tracker = tracker(Duration::from_millis(40), 3, 5);
        let id = tracker.start_request("/api/v1/metrics", "GET").unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(tracker.active_count(), 0);

        let stats = tracker.error_stats();
        assert_eq!(stats.total, 1);

        // The late completion from the transport is a no-op
        tracker.finish_request(&id, RequestStatus::Success, None);
        assert_eq!(tracker.shared.breakers.snapshot()["metrics"].failures, 1);
    }

    #[tokio::test]
    async fn test_watchdog_does_not_fire_after_completion() {
        let tracker = tracker(Duration::from_millis(60), 3, 5);
        let id = tracker.start_request("/api/v1/metrics", "GET").unwrap();
        tracker.finish_request(&id, RequestStatus::Success, None);

        tokio::time::sleep(Duration::from_millis(120)).await;
        let stats = tracker.error_stats();
        assert_eq!(stats.total, 0);
        assert_eq!(tracker.shared.breakers.snapshot()["metrics"].failures, 0);
    }

    #[tokio::test]
    async fn test_service_health_grading() {
        let tracker = tracker(Duration::from_secs(15), 3, 50);

        for _ in 0..10 {
            let id = tracker.start_request("/api/v1/metrics", "GET").unwrap();
            tracker.finish_request(&id, RequestStatus::Success, None);
        }
        let health = tracker.service_health();
        assert_eq!(health["metrics"].status, HealthStatus::Healthy);

        for _ in 0..6 {
            let id = tracker.start_request("/api/v1/rules", "GET").unwrap();
            tracker.finish_request(&id, RequestStatus::Error, Some("boom".to_string()));
        }
        let health = tracker.service_health();
        assert_eq!(health["rules"].status, HealthStatus::Unhealthy);
        assert_eq!(health["rules"].recent_errors, 6);
    }

    #[tokio::test]
    async fn test_error_stats_classification() {
        let tracker = tracker(Duration::from_secs(15), 3, 50);

        let id = tracker.start_request("/api/v1/metrics", "GET").unwrap();
        tracker.finish_request(
            &id,
            RequestStatus::Error,
            Some("network connection refused".to_string()),
        );
        let id = tracker.start_request("/api/v1/rules", "POST").unwrap();
        tracker.finish_request(&id, RequestStatus::Error, Some("invalid payload".to_string()));

        let stats = tracker.error_stats();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.by_kind["Network"], 1);
        assert_eq!(stats.by_kind["Validation"], 1);
        assert_eq!(stats.recent.len(), 2);
    }

    #[tokio::test]
    async fn test_diagnostics_export_shape() {
        let tracker = tracker(Duration::from_secs(15), 3, 5);
        let id = tracker.start_request("/api/v1/metrics", "GET").unwrap();
        tracker.finish_request(&id, RequestStatus::Success, None);
        let _pending = tracker.start_request("/api/v1/rules", "GET").unwrap();

        let diagnostics = tracker.export_diagnostics();
        assert_eq!(diagnostics["active_requests"].as_array().unwrap().len(), 1);
        assert_eq!(diagnostics["request_history"].as_array().unwrap().len(), 1);
        assert!(diagnostics["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_clear_resets_everything() {
        let tracker = tracker(Duration::from_secs(15), 3, 5);
        let id = tracker.start_request("/api/v1/metrics", "GET").unwrap();
        tracker.finish_request(&id, RequestStatus::Error, Some("boom".to_string()));
        let _pending = tracker.start_request("/api/v1/rules", "GET").unwrap();

        tracker.clear();
        assert_eq!(tracker.active_count(), 0);
        assert_eq!(tracker.error_stats().total, 0);
        assert!(tracker.shared.breakers.snapshot().is_empty());
    }
}
