//! Vantage Core - resilient API client layer for the monitoring dashboard
//!
//! This crate provides the request plumbing every dashboard view and store
//! goes through: a single orchestrated call path with per-service circuit
//! breaking, bounded retry with linear backoff, time-bounded caching of
//! GET responses, request tracking with timeout enforcement, failure
//! classification with user-visible notifications, and client-side
//! performance monitoring.
//!
//! # Main Components
//!
//! - **Error Handling**: uniform error types using `thiserror` and `anyhow`
//! - **HTTP Orchestration**: [`HttpOrchestrator`] combining tracker,
//!   breaker registry, cache and transport
//! - **Failure Routing**: [`notify::ErrorHandler`] classifying failures
//!   and driving notifications
//! - **Performance Monitoring**: [`metrics::PerformanceMonitor`] measuring
//!   every call
//!
//! # Example
//!
//! ```no_run
//! use vantage_core::{ClientConfig, HttpOrchestrator, Result};
//!
//! async fn example() -> Result<()> {
//!     let client = HttpOrchestrator::new(ClientConfig::from_env()?)?;
//!     let metrics = client.get("/metrics", &[("range", "5m")]).await?;
//!     println!("{}", metrics.data);
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod metrics;
pub mod notify;

// Re-export main types for convenience
pub use auth::{SessionHook, TokenStore};
pub use config::{BreakerConfig, ClientConfig};
pub use error::{Error, Result};
pub use http::{
    ApiResponse, HttpOrchestrator, Method, OrchestratorBuilder, RequestId, RequestOptions,
    RequestStatus, ResponseCache, StatusCode, Transport, TransportRequest, TransportResponse,
};
pub use metrics::PerformanceMonitor;
pub use notify::{
    ErrorHandler, ErrorKind, ErrorLevel, ErrorReport, Notification, NotificationChannel,
    NotificationSink,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
