//! Presentation Sinks
//!
//! [`NotificationPort`] adapters. The binary prints to stdout; tests record
//! messages in memory.

use std::io::Write;

use parking_lot::Mutex;

use crate::application::ports::NotificationPort;

/// Prints each message on its own line to stdout, mirrored to the log.
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl NotificationPort for ConsoleSink {
    fn notify(&self, message: &str) {
        tracing::info!(notification = message, "Notification");
        let mut stdout = std::io::stdout().lock();
        if let Err(e) = writeln!(stdout, "{message}") {
            tracing::warn!(error = %e, "Failed to write notification");
        }
    }
}

/// Keeps every message in order.
#[derive(Debug, Default)]
pub struct MemorySink {
    messages: Mutex<Vec<String>>,
}

impl MemorySink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages received so far.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }
}

impl NotificationPort for MemorySink {
    fn notify(&self, message: &str) {
        self.messages.lock().push(message.to_string());
    }
}
