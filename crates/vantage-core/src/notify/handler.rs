//! Central error handler
//!
//! Every failure the client layer surfaces passes through here: it is
//! classified, queued for diagnostics, fanned out to listeners, routed to
//! the user-visible notification sink and optionally reported to a remote
//! collector.

use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tracing::{debug, error, info, warn};

use super::notification::{LogSink, Notification, NotificationSink};
use super::report::{ErrorKind, ErrorLevel, ErrorReport};
use crate::Error;

/// Default number of reports kept in memory
const DEFAULT_QUEUE_CAPACITY: usize = 100;

type Listener = Arc<dyn Fn(&ErrorReport) + Send + Sync>;

/// Handle returned by [`ErrorHandler::add_listener`], used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerHandle(u64);

/// Classifies failures and routes them to observers, notifications and an
/// optional remote reporting sink
pub struct ErrorHandler {
    queue: Mutex<VecDeque<ErrorReport>>,
    capacity: usize,
    listeners: Mutex<Vec<(u64, Listener)>>,
    next_listener_id: AtomicU64,
    silent_kinds: Vec<ErrorKind>,
    sink: Arc<dyn NotificationSink>,
    report_endpoint: Option<String>,
    http: reqwest::Client,
}

impl Default for ErrorHandler {
    fn default() -> Self {
        Self::new(Arc::new(LogSink), Vec::new(), None)
    }
}

impl ErrorHandler {
    /// Create a handler with the given notification sink, silent kinds and
    /// optional remote report endpoint
    pub fn new(
        sink: Arc<dyn NotificationSink>,
        silent_kinds: Vec<ErrorKind>,
        report_endpoint: Option<String>,
    ) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            capacity: DEFAULT_QUEUE_CAPACITY,
            listeners: Mutex::new(Vec::new()),
            next_listener_id: AtomicU64::new(1),
            silent_kinds,
            sink,
            report_endpoint,
            http: reqwest::Client::new(),
        }
    }

    /// Override the queue capacity
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Handle a client error
    pub fn handle(&self, err: &Error, context: Option<Value>) -> ErrorReport {
        self.dispatch(ErrorReport::from_error(err, context))
    }

    /// Handle a bare failure message
    pub fn handle_message(&self, message: impl Into<String>, context: Option<Value>) -> ErrorReport {
        self.dispatch(ErrorReport::from_message(message, context))
    }

    fn dispatch(&self, report: ErrorReport) -> ErrorReport {
        match report.level {
            ErrorLevel::Low => info!(kind = ?report.kind, "{}", report.message),
            ErrorLevel::Medium => warn!(kind = ?report.kind, "{}", report.message),
            ErrorLevel::High | ErrorLevel::Critical => {
                error!(kind = ?report.kind, "{}", report.message)
            }
        }

        {
            let mut queue = self.queue.lock().unwrap();
            queue.push_back(report.clone());
            while queue.len() > self.capacity {
                queue.pop_front();
            }
        }

        // Listeners run synchronously in registration order; a panicking
        // listener must not prevent the remaining ones from running.
        let listeners: Vec<Listener> = {
            let guard = self.listeners.lock().unwrap();
            guard.iter().map(|(_, l)| Arc::clone(l)).collect()
        };
        for listener in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(&report))).is_err() {
                warn!("error listener panicked, continuing with remaining listeners");
            }
        }

        if !self.silent_kinds.contains(&report.kind) {
            let notification = Notification::for_level(
                report.level,
                title_for(report.kind),
                report.message.as_str(),
            );
            self.sink.notify(&notification);
        }

        self.report_remote(&report);
        report
    }

    /// Register an observer invoked for every handled error
    pub fn add_listener<F>(&self, listener: F) -> ListenerHandle
    where
        F: Fn(&ErrorReport) + Send + Sync + 'static,
    {
        let id = self.next_listener_id.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .lock()
            .unwrap()
            .push((id, Arc::new(listener)));
        ListenerHandle(id)
    }

    /// Remove a previously registered observer
    pub fn remove_listener(&self, handle: ListenerHandle) {
        self.listeners.lock().unwrap().retain(|(id, _)| *id != handle.0);
    }

    /// Most recent reports, newest last
    pub fn recent(&self, limit: usize) -> Vec<ErrorReport> {
        let queue = self.queue.lock().unwrap();
        queue
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect()
    }

    /// Number of queued reports
    pub fn len(&self) -> usize {
        self.queue.lock().unwrap().len()
    }

    /// Whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.queue.lock().unwrap().is_empty()
    }

    /// Export queued reports for diagnostics
    pub fn export(&self) -> Value {
        let queue = self.queue.lock().unwrap();
        serde_json::json!({
            "errors": queue.iter().collect::<Vec<_>>(),
            "timestamp": chrono::Utc::now(),
        })
    }

    /// Drop all queued reports
    pub fn clear(&self) {
        self.queue.lock().unwrap().clear();
    }

    /// Fire-and-forget POST of the report to the configured collector.
    /// Reporting failures are logged and swallowed, never surfaced.
    fn report_remote(&self, report: &ErrorReport) {
        let Some(endpoint) = self.report_endpoint.clone() else {
            return;
        };
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            debug!("no async runtime, skipping remote error report");
            return;
        };
        let client = self.http.clone();
        let payload = report.clone();
        handle.spawn(async move {
            if let Err(e) = client.post(&endpoint).json(&payload).send().await {
                debug!("failed to deliver error report: {}", e);
            }
        });
    }
}

fn title_for(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Network => "Network error",
        ErrorKind::Api => "Service error",
        ErrorKind::Validation => "Request rejected",
        ErrorKind::Permission => "Not authorized",
        ErrorKind::Business => "Operation failed",
        ErrorKind::Unknown => "Unexpected error",
    }
}
