//! Failure classification and user notification
//!
//! This module turns raw failures into a normalized taxonomy, keeps a
//! bounded in-memory record of them, and routes what the user should see
//! through a pluggable notification sink.

pub mod handler;
pub mod notification;
pub mod report;

pub use handler::{ErrorHandler, ListenerHandle};
pub use notification::{LogSink, Notification, NotificationChannel, NotificationSink};
pub use report::{ErrorKind, ErrorLevel, ErrorReport};
