//! Notification Port (Driven Port)
//!
//! One-way channel to whatever presents run progress to the user.

/// Port for presentation messages.
#[cfg_attr(test, mockall::automock)]
pub trait NotificationPort: Send + Sync {
    /// Present a message.
    fn notify(&self, message: &str);
}

/// Sink that drops every message.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpNotificationSink;

impl NotificationPort for NoOpNotificationSink {
    fn notify(&self, _message: &str) {}
}
