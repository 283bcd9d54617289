//! HTTP client implementation for the dashboard backend API
//!
//! This module provides a resilient HTTP client with:
//! - Request tracking with timeout enforcement and bounded history
//! - Per-service circuit breaking with timed recovery
//! - Time-bounded caching of successful GET responses
//! - Retry with linear backoff for transient failures
//! - Interceptor pipeline for request/response hooks
//! - Response and error normalization

pub mod breaker;
pub mod cache;
pub mod client;
pub mod error;
pub mod interceptor;
pub mod normalizer;
pub mod service_key;
pub mod tracker;
pub mod transport;

pub use breaker::{BreakerSnapshot, CircuitBreakerRegistry};
pub use cache::ResponseCache;
pub use client::{HttpOrchestrator, OrchestratorBuilder, RequestOptions};
pub use interceptor::InterceptorChain;
pub use normalizer::{normalize_response, ApiResponse};
pub use service_key::resolve as resolve_service_key;
pub use tracker::{
    ErrorStats, HealthStatus, RequestId, RequestRecord, RequestStatus, RequestTracker,
    ServiceHealth,
};
pub use transport::{ReqwestTransport, Transport, TransportRequest, TransportResponse};

// Re-export commonly used types
pub use reqwest::{Method, StatusCode};
