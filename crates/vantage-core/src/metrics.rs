//! Client-side performance monitoring
//!
//! Every call through the orchestrator is measured and recorded here,
//! keyed by URL. The store is bounded; statistics are computed over a
//! five-minute sliding window and per-endpoint analysis normalizes URLs so
//! `/rules/42` and `/rules/43` aggregate together.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::Value;

/// Maximum number of retained samples
const MAX_SAMPLES: usize = 1000;
/// Duration above which a sample counts as slow
const SLOW_THRESHOLD: Duration = Duration::from_millis(2000);
/// Sliding window for statistics
const STATS_WINDOW: Duration = Duration::from_secs(5 * 60);

/// What produced a sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleKind {
    Api,
    Custom,
}

/// Outcome attached to a sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleStatus {
    Success,
    Error,
    Timeout,
}

/// One timing measurement
#[derive(Debug, Clone)]
pub struct Sample {
    pub name: String,
    pub duration: Duration,
    pub at: Instant,
    pub kind: SampleKind,
    pub status: SampleStatus,
}

impl Sample {
    fn to_json(&self) -> Value {
        serde_json::json!({
            "name": self.name,
            "duration_ms": self.duration.as_millis() as u64,
            "kind": self.kind,
            "status": self.status,
        })
    }
}

/// Aggregate statistics over the recent window
#[derive(Debug, Clone, Serialize)]
pub struct PerfStats {
    pub total: usize,
    pub recent: usize,
    pub by_status: HashMap<String, u32>,
    pub avg_duration_ms: f64,
    pub slow_requests: u32,
    pub error_rate: f64,
}

/// Per-endpoint aggregation keyed by normalized URL
#[derive(Debug, Clone, Serialize)]
pub struct EndpointStats {
    pub count: u32,
    pub avg_duration_ms: f64,
    pub max_duration_ms: f64,
    pub min_duration_ms: f64,
    pub error_count: u32,
    pub success_rate: f64,
}

/// Overall performance grading
#[derive(Debug, Clone, Serialize)]
pub struct PerfHealth {
    pub status: &'static str,
    pub issues: Vec<String>,
    pub stats: PerfStats,
}

/// Bounded store of timing samples with windowed statistics
#[derive(Default)]
pub struct PerformanceMonitor {
    samples: Mutex<VecDeque<Sample>>,
}

impl PerformanceMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one measurement
    pub fn record(
        &self,
        name: impl Into<String>,
        duration: Duration,
        kind: SampleKind,
        status: SampleStatus,
    ) {
        let sample = Sample {
            name: name.into(),
            duration,
            at: Instant::now(),
            kind,
            status,
        };
        if sample.kind == SampleKind::Api && sample.duration > SLOW_THRESHOLD {
            log::warn!(
                "slow api call: {} took {}ms",
                sample.name,
                sample.duration.as_millis()
            );
        }
        let mut samples = self.samples.lock().unwrap();
        samples.push_back(sample);
        while samples.len() > MAX_SAMPLES {
            samples.pop_front();
        }
    }

    /// Time an async operation and record its outcome
    pub async fn measure_async<F, Fut, T, E>(&self, name: &str, op: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        let started = Instant::now();
        let result = op().await;
        let status = if result.is_ok() {
            SampleStatus::Success
        } else {
            SampleStatus::Error
        };
        self.record(name, started.elapsed(), SampleKind::Custom, status);
        result
    }

    /// Statistics over the last five minutes
    pub fn stats(&self) -> PerfStats {
        let samples = self.samples.lock().unwrap();
        let recent: Vec<&Sample> = samples
            .iter()
            .filter(|s| s.at.elapsed() <= STATS_WINDOW)
            .collect();

        let mut by_status: HashMap<String, u32> = HashMap::new();
        let mut total_ms = 0.0;
        let mut errors = 0u32;
        let mut slow = 0u32;

        for sample in &recent {
            *by_status
                .entry(format!("{:?}", sample.status).to_lowercase())
                .or_insert(0) += 1;
            total_ms += sample.duration.as_secs_f64() * 1000.0;
            if sample.status != SampleStatus::Success {
                errors += 1;
            }
            if sample.duration > SLOW_THRESHOLD {
                slow += 1;
            }
        }

        let recent_count = recent.len();
        PerfStats {
            total: samples.len(),
            recent: recent_count,
            by_status,
            avg_duration_ms: if recent_count > 0 {
                total_ms / recent_count as f64
            } else {
                0.0
            },
            slow_requests: slow,
            error_rate: if recent_count > 0 {
                f64::from(errors) / recent_count as f64 * 100.0
            } else {
                0.0
            },
        }
    }

    /// Slowest samples above the threshold, slowest first
    pub fn slow_requests(&self, threshold: Duration, limit: usize) -> Vec<Sample> {
        let samples = self.samples.lock().unwrap();
        let mut slow: Vec<Sample> = samples
            .iter()
            .filter(|s| s.duration > threshold)
            .cloned()
            .collect();
        slow.sort_by(|a, b| b.duration.cmp(&a.duration));
        slow.truncate(limit);
        slow
    }

    /// Most recent failed samples, newest first
    pub fn error_requests(&self, limit: usize) -> Vec<Sample> {
        let samples = self.samples.lock().unwrap();
        samples
            .iter()
            .rev()
            .filter(|s| s.status != SampleStatus::Success)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Per-endpoint aggregation of API samples, keyed by normalized URL
    pub fn api_analysis(&self) -> HashMap<String, EndpointStats> {
        let samples = self.samples.lock().unwrap();
        let mut analysis: HashMap<String, EndpointStats> = HashMap::new();

        for sample in samples.iter().filter(|s| s.kind == SampleKind::Api) {
            let key = normalize_url(&sample.name);
            let ms = sample.duration.as_secs_f64() * 1000.0;
            let entry = analysis.entry(key).or_insert(EndpointStats {
                count: 0,
                avg_duration_ms: 0.0,
                max_duration_ms: 0.0,
                min_duration_ms: f64::MAX,
                error_count: 0,
                success_rate: 0.0,
            });
            entry.count += 1;
            entry.max_duration_ms = entry.max_duration_ms.max(ms);
            entry.min_duration_ms = entry.min_duration_ms.min(ms);
            if sample.status != SampleStatus::Success {
                entry.error_count += 1;
            }
            entry.avg_duration_ms =
                (entry.avg_duration_ms * f64::from(entry.count - 1) + ms) / f64::from(entry.count);
            entry.success_rate =
                f64::from(entry.count - entry.error_count) / f64::from(entry.count) * 100.0;
        }

        analysis
    }

    /// Grade the recent window against error-rate, latency and slow-call
    /// thresholds
    pub fn health_status(&self) -> PerfHealth {
        let stats = self.stats();
        let mut status = "healthy";
        let mut issues = Vec::new();

        if stats.error_rate > 10.0 {
            status = "critical";
            issues.push(format!("error rate too high: {:.1}%", stats.error_rate));
        } else if stats.error_rate > 5.0 {
            status = "warning";
            issues.push(format!("error rate elevated: {:.1}%", stats.error_rate));
        }

        if stats.avg_duration_ms > 3000.0 {
            status = "critical";
            issues.push(format!(
                "average response time too high: {:.0}ms",
                stats.avg_duration_ms
            ));
        } else if stats.avg_duration_ms > 1500.0 {
            if status != "critical" {
                status = "warning";
            }
            issues.push(format!(
                "average response time elevated: {:.0}ms",
                stats.avg_duration_ms
            ));
        }

        let slow_rate = if stats.recent > 0 {
            f64::from(stats.slow_requests) / stats.recent as f64 * 100.0
        } else {
            0.0
        };
        if slow_rate > 20.0 {
            status = "critical";
            issues.push(format!("slow request ratio too high: {:.1}%", slow_rate));
        } else if slow_rate > 10.0 {
            if status != "critical" {
                status = "warning";
            }
            issues.push(format!("slow request ratio elevated: {:.1}%", slow_rate));
        }

        PerfHealth {
            status,
            issues,
            stats,
        }
    }

    /// Export samples and derived statistics for diagnostics
    pub fn export(&self) -> Value {
        let samples: Vec<Value> = {
            let guard = self.samples.lock().unwrap();
            guard.iter().map(Sample::to_json).collect()
        };
        serde_json::json!({
            "samples": samples,
            "stats": self.stats(),
            "api_analysis": self.api_analysis(),
            "timestamp": chrono::Utc::now(),
        })
    }

    /// Drop all samples
    pub fn clear(&self) {
        self.samples.lock().unwrap().clear();
    }
}

/// Collapse ids, query strings and the API version prefix so per-endpoint
/// stats aggregate
fn normalize_url(url: &str) -> String {
    let re_id = regex::Regex::new(r"/\d+").expect("valid regex");
    let re_query = regex::Regex::new(r"\?.*$").expect("valid regex");
    let re_prefix = regex::Regex::new(r"/api/v\d+").expect("valid regex");

    let url = re_query.replace(url, "");
    let url = re_id.replace_all(&url, "/:id");
    re_prefix.replace(&url, "").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_normalization() {
        assert_eq!(normalize_url("/api/v1/rules/42"), "/rules/:id");
        assert_eq!(
            normalize_url("/api/v1/metrics?range=5m&step=15s"),
            "/metrics"
        );
        assert_eq!(
            normalize_url("/api/v2/rules/42/history/7"),
            "/rules/:id/history/:id"
        );
    }

    #[test]
    fn test_store_is_bounded() {
        let monitor = PerformanceMonitor::new();
        for i in 0..MAX_SAMPLES + 50 {
            monitor.record(
                format!("/api/v1/m{}", i),
                Duration::from_millis(10),
                SampleKind::Api,
                SampleStatus::Success,
            );
        }
        assert_eq!(monitor.stats().total, MAX_SAMPLES);
    }

    #[test]
    fn test_stats_aggregation() {
        let monitor = PerformanceMonitor::new();
        monitor.record(
            "/api/v1/metrics",
            Duration::from_millis(100),
            SampleKind::Api,
            SampleStatus::Success,
        );
        monitor.record(
            "/api/v1/metrics",
            Duration::from_millis(300),
            SampleKind::Api,
            SampleStatus::Error,
        );

        let stats = monitor.stats();
        assert_eq!(stats.recent, 2);
        assert_eq!(stats.by_status["success"], 1);
        assert_eq!(stats.by_status["error"], 1);
        assert!((stats.avg_duration_ms - 200.0).abs() < 1.0);
        assert!((stats.error_rate - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_slow_and_error_listings() {
        let monitor = PerformanceMonitor::new();
        monitor.record(
            "/fast",
            Duration::from_millis(50),
            SampleKind::Api,
            SampleStatus::Success,
        );
        monitor.record(
            "/slow",
            Duration::from_millis(2500),
            SampleKind::Api,
            SampleStatus::Success,
        );
        monitor.record(
            "/slower",
            Duration::from_millis(4000),
            SampleKind::Api,
            SampleStatus::Timeout,
        );

        let slow = monitor.slow_requests(SLOW_THRESHOLD, 10);
        assert_eq!(slow.len(), 2);
        assert_eq!(slow[0].name, "/slower");

        let errors = monitor.error_requests(10);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].name, "/slower");
    }

    #[test]
    fn test_api_analysis_groups_ids() {
        let monitor = PerformanceMonitor::new();
        monitor.record(
            "/api/v1/rules/1",
            Duration::from_millis(100),
            SampleKind::Api,
            SampleStatus::Success,
        );
        monitor.record(
            "/api/v1/rules/2",
            Duration::from_millis(200),
            SampleKind::Api,
            SampleStatus::Error,
        );

        let analysis = monitor.api_analysis();
        let stats = &analysis["/rules/:id"];
        assert_eq!(stats.count, 2);
        assert_eq!(stats.error_count, 1);
        assert!((stats.avg_duration_ms - 150.0).abs() < 1.0);
        assert!((stats.success_rate - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_health_grading() {
        let monitor = PerformanceMonitor::new();
        for _ in 0..9 {
            monitor.record(
                "/api/v1/metrics",
                Duration::from_millis(50),
                SampleKind::Api,
                SampleStatus::Success,
            );
        }
        assert_eq!(monitor.health_status().status, "healthy");

        // Push error rate past the critical threshold
        for _ in 0..3 {
            monitor.record(
                "/api/v1/metrics",
                Duration::from_millis(50),
                SampleKind::Api,
                SampleStatus::Error,
            );
        }
        let health = monitor.health_status();
        assert_eq!(health.status, "critical");
        assert!(!health.issues.is_empty());
    }

    #[tokio::test]
    async fn test_measure_async_records_outcome() {
        let monitor = PerformanceMonitor::new();
        let ok: Result<u32, ()> = monitor.measure_async("load_panel", || async { Ok(42) }).await;
        assert_eq!(ok.unwrap(), 42);

        let err: Result<(), &str> = monitor
            .measure_async("load_panel", || async { Err("nope") })
            .await;
        assert!(err.is_err());

        let stats = monitor.stats();
        assert_eq!(stats.recent, 2);
        assert_eq!(stats.by_status["error"], 1);
    }
}
