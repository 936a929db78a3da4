//! Connection Heartbeat
//!
//! Keep-alive bookkeeping for the I/O task. On every interval tick the task
//! asks the monitor what to do: send a ping, or give up because the previous
//! ping went unanswered for longer than the pong timeout.
//!
//! Uses the Tokio clock so paused-time tests can drive it.

use std::time::Duration;

use tokio::time::Instant;

/// Heartbeat timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatConfig {
    /// Interval between pings.
    pub ping_interval: Duration,
    /// How long an unanswered ping may stay outstanding.
    pub pong_timeout: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(30),
            pong_timeout: Duration::from_secs(60),
        }
    }
}

impl HeartbeatConfig {
    /// Create a heartbeat configuration.
    #[must_use]
    pub const fn new(ping_interval: Duration, pong_timeout: Duration) -> Self {
        Self {
            ping_interval,
            pong_timeout,
        }
    }
}

/// What the I/O task should do on a heartbeat tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatAction {
    /// Send a ping frame.
    SendPing,
    /// The last ping went unanswered; treat the connection as closed.
    TimedOut(Duration),
}

/// Heartbeat state owned by the I/O task.
#[derive(Debug)]
pub struct HeartbeatMonitor {
    config: HeartbeatConfig,
    last_seen: Instant,
    ping_outstanding: bool,
}

impl HeartbeatMonitor {
    /// Create a monitor; the connection counts as alive now.
    #[must_use]
    pub fn new(config: HeartbeatConfig) -> Self {
        Self {
            config,
            last_seen: Instant::now(),
            ping_outstanding: false,
        }
    }

    /// Configuration in use.
    #[must_use]
    pub const fn config(&self) -> HeartbeatConfig {
        self.config
    }

    /// Decide the action for an interval tick.
    pub fn on_tick(&mut self) -> HeartbeatAction {
        let silent_for = self.last_seen.elapsed();
        if self.ping_outstanding && silent_for > self.config.pong_timeout {
            return HeartbeatAction::TimedOut(silent_for);
        }
        self.ping_outstanding = true;
        HeartbeatAction::SendPing
    }

    /// Record a pong (or any frame proving the peer is alive).
    pub fn record_pong(&mut self) {
        self.last_seen = Instant::now();
        self.ping_outstanding = false;
    }

    /// Whether a ping is awaiting its pong.
    #[must_use]
    pub const fn is_awaiting_pong(&self) -> bool {
        self.ping_outstanding
    }
}
