//! HTTP orchestrator
//!
//! The façade combining cache, circuit breaking, request tracking, the
//! interceptor pipeline and the transport into one call path. Callers go
//! through [`HttpOrchestrator::request`] or the method shortcuts; every
//! call is measured, every failure is classified and routed to the error
//! handler.

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::Method;
use serde_json::Value;

use super::breaker::CircuitBreakerRegistry;
use super::cache::ResponseCache;
use super::error as http_error;
use super::interceptor::InterceptorChain;
use super::normalizer::{normalize_response, ApiResponse};
use super::service_key;
use super::tracker::{RequestStatus, RequestTracker};
use super::transport::{ReqwestTransport, Transport, TransportRequest};
use crate::auth::{SessionHook, TokenStore};
use crate::config::ClientConfig;
use crate::metrics::{PerformanceMonitor, SampleKind, SampleStatus};
use crate::notify::{ErrorHandler, LogSink, NotificationSink};
use crate::{Error, Result};

/// Extra slack given to the tracker watchdog over the transport timeout,
/// so the in-band failure path owns retries and the watchdog only catches
/// a hung transport.
const WATCHDOG_GRACE: Duration = Duration::from_secs(1);

/// Correlation header carrying the tracker-generated request id
const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// Per-call options for [`HttpOrchestrator::request`]
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    pub params: Vec<(String, String)>,
    pub data: Option<Value>,
    pub use_cache: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            method: Method::GET,
            params: Vec::new(),
            data: None,
            use_cache: true,
        }
    }
}

impl RequestOptions {
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn params(mut self, params: Vec<(String, String)>) -> Self {
        self.params = params;
        self
    }

    pub fn data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn use_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }
}

/// Builder for [`HttpOrchestrator`]
pub struct OrchestratorBuilder {
    config: ClientConfig,
    transport: Option<Arc<dyn Transport>>,
    sink: Option<Arc<dyn NotificationSink>>,
    session_hook: Option<SessionHook>,
    tokens: TokenStore,
    interceptors: InterceptorChain,
}

impl OrchestratorBuilder {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            transport: None,
            sink: None,
            session_hook: None,
            tokens: TokenStore::new(),
            interceptors: InterceptorChain::new(),
        }
    }

    /// Use a custom transport instead of the reqwest default
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Route user-visible notifications to a custom sink
    pub fn notification_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Hook invoked after a 401 clears the stored credential
    pub fn session_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.session_hook = Some(Arc::new(hook));
        self
    }

    /// Share an existing token store
    pub fn token_store(mut self, tokens: TokenStore) -> Self {
        self.tokens = tokens;
        self
    }

    /// Register a pre-request hook
    pub fn on_request<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut TransportRequest) -> Result<()> + Send + Sync + 'static,
    {
        self.interceptors.on_request(hook);
        self
    }

    /// Register a post-response hook
    pub fn on_response<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut super::transport::TransportResponse) -> Result<()> + Send + Sync + 'static,
    {
        self.interceptors.on_response(hook);
        self
    }

    pub fn build(self) -> Result<HttpOrchestrator> {
        self.config.validate()?;

        let sink: Arc<dyn NotificationSink> = self.sink.unwrap_or_else(|| Arc::new(LogSink));
        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(self.config.timeout)?),
        };

        let breakers = Arc::new(CircuitBreakerRegistry::new(
            self.config.breaker.clone(),
            Arc::clone(&sink),
        ));
        let tracker = RequestTracker::new(
            self.config.base_url.clone(),
            self.config.timeout + WATCHDOG_GRACE,
            self.config.max_retries,
            Arc::clone(&breakers),
        );
        let errors = Arc::new(ErrorHandler::new(
            sink,
            self.config.silent_kinds.clone(),
            self.config.report_endpoint.clone(),
        ));

        let orchestrator = HttpOrchestrator {
            cache: ResponseCache::new(self.config.cache_ttl),
            config: self.config,
            transport,
            tracker,
            breakers,
            interceptors: self.interceptors,
            errors,
            monitor: Arc::new(PerformanceMonitor::new()),
            tokens: self.tokens,
            session_hook: self.session_hook,
        };

        // Background tasks need a runtime; builders invoked outside one can
        // start them later via spawn_background_tasks
        if tokio::runtime::Handle::try_current().is_ok() {
            orchestrator.spawn_background_tasks();
        }

        Ok(orchestrator)
    }
}

/// Façade over the resilient request pipeline
pub struct HttpOrchestrator {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    tracker: RequestTracker,
    breakers: Arc<CircuitBreakerRegistry>,
    cache: ResponseCache,
    interceptors: InterceptorChain,
    errors: Arc<ErrorHandler>,
    monitor: Arc<PerformanceMonitor>,
    tokens: TokenStore,
    session_hook: Option<SessionHook>,
}

impl HttpOrchestrator {
    /// Create an orchestrator with the reqwest transport
    pub fn new(config: ClientConfig) -> Result<Self> {
        OrchestratorBuilder::new(config).build()
    }

    pub fn builder(config: ClientConfig) -> OrchestratorBuilder {
        OrchestratorBuilder::new(config)
    }

    /// Issue a request through the full pipeline
    pub async fn request(&self, path: &str, options: RequestOptions) -> Result<ApiResponse> {
        let url = self.build_url(path);
        let started = Instant::now();
        let result = self.execute(&url, &options).await;

        let status = match &result {
            Ok(_) => SampleStatus::Success,
            Err(Error::Timeout { .. }) => SampleStatus::Timeout,
            Err(_) => SampleStatus::Error,
        };
        self.monitor
            .record(url.as_str(), started.elapsed(), SampleKind::Api, status);

        if let Err(err) = &result {
            self.errors.handle(
                err,
                Some(serde_json::json!({
                    "url": url,
                    "method": options.method.as_str(),
                })),
            );
        }

        result
    }

    /// GET with default options (cache enabled)
    pub async fn get(&self, path: &str, params: &[(&str, &str)]) -> Result<ApiResponse> {
        self.request(path, RequestOptions::default().params(owned_params(params)))
            .await
    }

    /// GET bypassing the response cache
    pub async fn get_fresh(&self, path: &str, params: &[(&str, &str)]) -> Result<ApiResponse> {
        self.request(
            path,
            RequestOptions::default()
                .params(owned_params(params))
                .use_cache(false),
        )
        .await
    }

    /// Cached GET; alias for the default GET behavior, kept for callers
    /// that want the caching intent explicit
    pub async fn get_cached(&self, path: &str, params: &[(&str, &str)]) -> Result<ApiResponse> {
        self.get(path, params).await
    }

    pub async fn post(&self, path: &str, data: Value) -> Result<ApiResponse> {
        self.request(
            path,
            RequestOptions::default().method(Method::POST).data(data),
        )
        .await
    }

    pub async fn put(&self, path: &str, data: Value) -> Result<ApiResponse> {
        self.request(
            path,
            RequestOptions::default().method(Method::PUT).data(data),
        )
        .await
    }

    pub async fn delete(&self, path: &str) -> Result<ApiResponse> {
        self.request(path, RequestOptions::default().method(Method::DELETE))
            .await
    }

    /// Drop cached responses matching the fragment, or all of them
    pub fn clear_cache(&self, url_fragment: Option<&str>) -> usize {
        self.cache.invalidate(url_fragment)
    }

    /// Error handler receiving every classified failure
    pub fn errors(&self) -> &Arc<ErrorHandler> {
        &self.errors
    }

    /// Performance monitor fed by every call
    pub fn monitor(&self) -> &Arc<PerformanceMonitor> {
        &self.monitor
    }

    /// Request tracker (health, error stats, diagnostics)
    pub fn tracker(&self) -> &RequestTracker {
        &self.tracker
    }

    /// Circuit breaker registry
    pub fn breakers(&self) -> &Arc<CircuitBreakerRegistry> {
        &self.breakers
    }

    /// Shared token store
    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    /// Combined diagnostic dump of tracker, monitor and error state
    pub fn export_diagnostics(&self) -> Value {
        serde_json::json!({
            "requests": self.tracker.export_diagnostics(),
            "performance": self.monitor.export(),
            "errors": self.errors.export(),
        })
    }

    /// Start the cache sweeper and tracker health check. Idempotent.
    pub fn spawn_background_tasks(&self) {
        self.cache.spawn_sweeper();
        self.tracker.spawn_health_check();
    }

    /// Stop background tasks and abort outstanding watchdogs
    pub fn shutdown(&self) {
        self.tracker.shutdown();
        self.cache.shutdown();
    }

    async fn execute(&self, url: &str, options: &RequestOptions) -> Result<ApiResponse> {
        let cache_key = ResponseCache::key_for(url, &options.params);
        let is_get = options.method == Method::GET;

        if is_get && options.use_cache {
            if let Some(hit) = self.cache.get(&cache_key) {
                log::debug!("cache hit: {}", cache_key);
                return Ok(hit);
            }
        }

        let id = self.tracker.start_request(url, options.method.as_str())?;
        let service = service_key::resolve(url, &self.config.base_url);

        loop {
            let mut request = TransportRequest::new(options.method.clone(), url);
            request.params = options.params.clone();
            if is_get && !options.use_cache {
                // Cache-busting marker for explicitly uncached GETs
                request.params.push((
                    "_t".to_string(),
                    chrono::Utc::now().timestamp_millis().to_string(),
                ));
            }
            request.body = options.data.clone();
            request
                .headers
                .insert(REQUEST_ID_HEADER.to_string(), id.to_string());
            if let Some(bearer) = self.tokens.bearer_header() {
                request.headers.insert("Authorization".to_string(), bearer);
            }

            if let Err(err) = self.interceptors.apply_request(&mut request) {
                self.tracker
                    .finish_request(&id, RequestStatus::Error, Some(err.to_string()));
                return Err(err);
            }

            let outcome = tokio::time::timeout(self.config.timeout, self.transport.send(request)).await;

            let err = match outcome {
                Ok(Ok(mut response)) if response.is_success() => {
                    match self.interceptors.apply_response(&mut response) {
                        Ok(()) => match normalize_response(response.body) {
                            Ok(api) => {
                                self.tracker.finish_request(&id, RequestStatus::Success, None);
                                if is_get {
                                    if options.use_cache {
                                        self.cache.set(cache_key, api.clone());
                                    }
                                } else {
                                    self.cache.invalidate(Some(&self.resource_prefix(url)));
                                }
                                return Ok(api);
                            }
                            Err(err) => err,
                        },
                        Err(err) => err,
                    }
                }
                Ok(Ok(response)) => http_error::from_response(&response),
                Ok(Err(err)) => err,
                Err(_) => Error::Timeout {
                    url: url.to_string(),
                    timeout: self.config.timeout,
                },
            };

            // 401 short-circuits: clear the session exactly once, never retry
            if matches!(err, Error::SessionExpired { .. }) {
                if self.tokens.clear() {
                    if let Some(hook) = &self.session_hook {
                        hook();
                    }
                }
                self.tracker
                    .finish_request(&id, RequestStatus::Error, Some(err.to_string()));
                return Err(err);
            }

            let status = if matches!(err, Error::Timeout { .. }) {
                RequestStatus::Timeout
            } else {
                RequestStatus::Error
            };

            if http_error::is_retryable(&err)
                && !self.breakers.is_open(&service)
                && self.tracker.retry_request(&id)
            {
                let attempt = self.tracker.retry_count(&id).unwrap_or(1);
                let delay = self.config.retry_delay * attempt;
                log::warn!(
                    "request failed (attempt {}), retrying after {:?}: {}",
                    attempt,
                    delay,
                    err
                );
                tokio::time::sleep(delay).await;

                // Stop immediately if the breaker opened while we were waiting
                if self.breakers.is_open(&service) {
                    self.tracker
                        .finish_request(&id, status, Some(err.to_string()));
                    return Err(Error::ServiceUnavailable { service });
                }
                continue;
            }

            self.tracker
                .finish_request(&id, status, Some(err.to_string()));
            return Err(err);
        }
    }

    fn build_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        let base = self.config.base_url.trim_end_matches('/');
        if path.starts_with('/') {
            format!("{}{}", base, path)
        } else {
            format!("{}/{}", base, path)
        }
    }

    /// Fragment invalidated after a successful mutation: the first path
    /// segment of the affected resource
    fn resource_prefix(&self, url: &str) -> String {
        let key = service_key::resolve(url, &self.config.base_url);
        let first = key.split('/').next().unwrap_or("");
        format!("/{}", first)
    }
}

impl Drop for HttpOrchestrator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn owned_params(params: &[(&str, &str)]) -> Vec<(String, String)> {
    params
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn orchestrator() -> HttpOrchestrator {
        // No runtime here, so background tasks stay unspawned
        HttpOrchestrator::new(ClientConfig::new("/api/v1")).unwrap()
    }

    #[test]
    fn test_build_url_joins_base() {
        let client = orchestrator();
        assert_eq!(client.build_url("/metrics"), "/api/v1/metrics");
        assert_eq!(client.build_url("metrics"), "/api/v1/metrics");
        assert_eq!(
            client.build_url("https://other.example.com/x"),
            "https://other.example.com/x"
        );
    }

    #[test]
    fn test_resource_prefix() {
        let client = orchestrator();
        assert_eq!(client.resource_prefix("/api/v1/rules/42"), "/rules");
        assert_eq!(client.resource_prefix("/api/v1/metrics"), "/metrics");
    }

    #[test]
    fn test_default_options() {
        let options = RequestOptions::default();
        assert_eq!(options.method, Method::GET);
        assert!(options.use_cache);
        assert!(options.data.is_none());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = ClientConfig::new("");
        assert!(HttpOrchestrator::new(config).is_err());
    }
}
