//! Application Ports (Driven)
//!
//! Interfaces the sequencer uses to reach the outside world.
//! - **Transport**: one duplex connection with a single reply subscriber
//! - **Notification**: one-way presentation messages

mod notification_port;
mod transport_port;

pub use notification_port::{NoOpNotificationSink, NotificationPort};
#[cfg(test)]
pub use notification_port::MockNotificationPort;
pub use transport_port::{Subscriber, TransportError, TransportPort};
