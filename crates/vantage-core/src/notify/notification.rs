//! User-facing notification channels
//!
//! The client layer itself has no rendering surface; notifications are
//! handed to a [`NotificationSink`] implemented by the embedding
//! application. The channel chosen for a failure scales with its severity.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::report::ErrorLevel;

/// Delivery channel for a user-visible notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationChannel {
    /// Transient toast, auto-dismissed
    Toast,
    /// Persistent banner the user dismisses explicitly
    Banner,
    /// Blocking modal offering a retry affordance
    Modal,
}

impl NotificationChannel {
    /// Channel used for a given severity
    pub fn for_level(level: ErrorLevel) -> Self {
        match level {
            ErrorLevel::Low | ErrorLevel::Medium => NotificationChannel::Toast,
            ErrorLevel::High => NotificationChannel::Banner,
            ErrorLevel::Critical => NotificationChannel::Modal,
        }
    }
}

/// A user-visible notification emitted by the client layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub message: String,
    pub channel: NotificationChannel,
    /// Auto-dismiss delay for transient channels
    pub duration: Option<Duration>,
    /// Whether the channel should offer a retry action
    pub retryable: bool,
}

impl Notification {
    /// Build a notification for a failure of the given severity
    pub fn for_level(level: ErrorLevel, title: impl Into<String>, message: impl Into<String>) -> Self {
        let channel = NotificationChannel::for_level(level);
        Self {
            title: title.into(),
            message: message.into(),
            duration: match channel {
                NotificationChannel::Toast => Some(Duration::from_secs(3)),
                NotificationChannel::Banner => None,
                NotificationChannel::Modal => None,
            },
            retryable: channel == NotificationChannel::Modal,
            channel,
        }
    }

    /// Warning notification used when a circuit breaker opens
    pub fn service_unavailable(service: &str) -> Self {
        Self {
            title: "Service unavailable".to_string(),
            message: format!("Service {} is temporarily unavailable, retry later", service),
            channel: NotificationChannel::Banner,
            duration: Some(Duration::from_secs(5)),
            retryable: false,
        }
    }
}

/// Sink receiving user-visible notifications
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: &Notification);
}

/// Default sink that renders notifications into the log stream
#[derive(Debug, Default)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn notify(&self, notification: &Notification) {
        match notification.channel {
            NotificationChannel::Toast => {
                info!(title = %notification.title, "{}", notification.message)
            }
            NotificationChannel::Banner => {
                warn!(title = %notification.title, "{}", notification.message)
            }
            NotificationChannel::Modal => {
                error!(title = %notification.title, "{}", notification.message)
            }
        }
    }
}
