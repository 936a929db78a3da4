//! WebSocket Transport
//!
//! [`TransportPort`] adapter over one tokio-tungstenite connection.
//!
//! A single I/O task owns the socket. It writes queued outbound frames,
//! answers server pings, keeps the connection alive with its own pings, and
//! routes inbound text frames through the [`CorrelationRouter`]. When the task
//! ends for any reason the transport is closed and the pending subscriber is
//! dropped, so the waiting step observes a closed connection.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::backoff::{Backoff, BackoffConfig};
use super::codec::JsonCodec;
use super::heartbeat::{HeartbeatAction, HeartbeatConfig, HeartbeatMonitor};
use super::router::{CorrelationRouter, RouterStats};
use crate::application::ports::{Subscriber, TransportError, TransportPort};
use crate::domain::protocol::Request;
use crate::infrastructure::metrics;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const MIN_PING_INTERVAL: Duration = Duration::from_secs(1);

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the WebSocket transport.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Full WebSocket URL including `app_id`.
    pub url: String,
    /// Keep-alive timing.
    pub heartbeat: HeartbeatConfig,
    /// Backoff between initial connection attempts.
    pub backoff: BackoffConfig,
    /// Capacity of the outbound frame queue.
    pub outbound_capacity: usize,
}

impl TransportConfig {
    /// Configuration with default timing for a URL.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            heartbeat: HeartbeatConfig::default(),
            backoff: BackoffConfig::default(),
            outbound_capacity: 16,
        }
    }
}

// =============================================================================
// Transport
// =============================================================================

/// WebSocket transport with a single reply subscriber.
pub struct WsTransport {
    router: Arc<CorrelationRouter>,
    codec: JsonCodec,
    outbound: mpsc::Sender<Message>,
    shutdown: CancellationToken,
    open: Arc<AtomicBool>,
    close_reason: Arc<Mutex<Option<String>>>,
    io_task: Mutex<Option<JoinHandle<()>>>,
}

impl WsTransport {
    /// Open the connection, retrying with backoff, and start the I/O task.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Connect` once the attempt budget is spent.
    pub async fn connect(config: TransportConfig) -> Result<Self, TransportError> {
        let mut backoff = Backoff::new(config.backoff);

        let stream = loop {
            info!(url = %redact_url(&config.url), "Connecting to trading endpoint");
            match tokio_tungstenite::connect_async(config.url.as_str()).await {
                Ok((stream, _response)) => {
                    metrics::record_connect_attempt(true);
                    break stream;
                }
                Err(e) => {
                    metrics::record_connect_attempt(false);
                    let Some(delay) = backoff.on_failure() else {
                        warn!(error = %e, attempts = backoff.failures(), "Giving up connecting");
                        return Err(TransportError::Connect {
                            message: e.to_string(),
                        });
                    };
                    warn!(
                        error = %e,
                        attempt = backoff.failures(),
                        delay_ms = delay.as_millis(),
                        "Connection attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        };

        info!("Connected");
        Ok(Self::spawn(stream, &config))
    }

    fn spawn(stream: WsStream, config: &TransportConfig) -> Self {
        let router = Arc::new(CorrelationRouter::new());
        let (outbound, outbound_rx) = mpsc::channel(config.outbound_capacity.max(1));
        let shutdown = CancellationToken::new();
        let open = Arc::new(AtomicBool::new(true));
        let close_reason = Arc::new(Mutex::new(None));

        let io = IoTask {
            router: Arc::clone(&router),
            outbound: outbound_rx,
            shutdown: shutdown.clone(),
            open: Arc::clone(&open),
            close_reason: Arc::clone(&close_reason),
            heartbeat: HeartbeatMonitor::new(config.heartbeat),
        };
        let io_task = tokio::spawn(io.run(stream));

        Self {
            router,
            codec: JsonCodec::new(),
            outbound,
            shutdown,
            open,
            close_reason,
            io_task: Mutex::new(Some(io_task)),
        }
    }

    /// Why the connection closed, once it has.
    #[must_use]
    pub fn close_reason(&self) -> Option<String> {
        self.close_reason.lock().clone()
    }

    /// Router counters.
    #[must_use]
    pub fn router_stats(&self) -> RouterStats {
        self.router.stats()
    }
}

#[async_trait]
impl TransportPort for WsTransport {
    async fn send(&self, request: Request) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::Closed);
        }
        let text = self
            .codec
            .encode(&request)
            .map_err(|e| TransportError::Encode {
                message: e.to_string(),
            })?;
        self.outbound
            .send(Message::Text(text.into()))
            .await
            .map_err(|_| TransportError::Closed)
    }

    fn subscribe(&self, subscriber: Subscriber) -> Option<Subscriber> {
        self.router.subscribe(subscriber)
    }

    fn unsubscribe(&self) -> Option<Subscriber> {
        self.router.unsubscribe()
    }

    async fn close(&self) {
        self.shutdown.cancel();
        let io_task = self.io_task.lock().take();
        if let Some(io_task) = io_task
            && let Err(e) = io_task.await
        {
            warn!(error = %e, "I/O task ended abnormally");
        }
        self.open.store(false, Ordering::SeqCst);
        self.router.unsubscribe();
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

// =============================================================================
// I/O Task
// =============================================================================

struct IoTask {
    router: Arc<CorrelationRouter>,
    outbound: mpsc::Receiver<Message>,
    shutdown: CancellationToken,
    open: Arc<AtomicBool>,
    close_reason: Arc<Mutex<Option<String>>>,
    heartbeat: HeartbeatMonitor,
}

impl IoTask {
    async fn run(mut self, stream: WsStream) {
        let reason = self.pump(stream).await;

        self.open.store(false, Ordering::SeqCst);
        if self.router.unsubscribe().is_some() {
            debug!("Dropped pending subscriber on close");
        }
        info!(reason = %reason, "Connection closed");
        *self.close_reason.lock() = Some(reason);
    }

    async fn pump(&mut self, stream: WsStream) -> String {
        let (mut write, mut read) = stream.split();
        // `interval_at` panics on a zero period.
        let interval = self
            .heartbeat
            .config()
            .ping_interval
            .max(MIN_PING_INTERVAL);
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                () = self.shutdown.cancelled() => {
                    let _ = write.send(Message::Close(None)).await;
                    return "closed by client".to_string();
                }
                frame = self.outbound.recv() => {
                    let Some(frame) = frame else {
                        return "transport dropped".to_string();
                    };
                    if let Err(e) = write.send(frame).await {
                        return format!("write failed: {e}");
                    }
                }
                _ = ticker.tick() => {
                    match self.heartbeat.on_tick() {
                        HeartbeatAction::SendPing => {
                            if let Err(e) = write.send(Message::Ping(Vec::new().into())).await {
                                return format!("ping failed: {e}");
                            }
                        }
                        HeartbeatAction::TimedOut(silent_for) => {
                            warn!(silent_secs = silent_for.as_secs(), "Heartbeat timeout");
                            return "heartbeat timeout".to_string();
                        }
                    }
                }
                inbound = read.next() => {
                    match inbound {
                        Some(Ok(Message::Text(text))) => {
                            self.heartbeat.record_pong();
                            self.router.route_text(&text);
                        }
                        Some(Ok(Message::Pong(_))) => {
                            self.heartbeat.record_pong();
                        }
                        Some(Ok(Message::Ping(data))) => {
                            if let Err(e) = write.send(Message::Pong(data)).await {
                                return format!("pong failed: {e}");
                            }
                        }
                        Some(Ok(Message::Close(frame))) => {
                            return frame.map_or_else(
                                || "server closed the connection".to_string(),
                                |f| format!("server closed the connection: {}", f.reason),
                            );
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => return format!("read failed: {e}"),
                        None => return "stream ended".to_string(),
                    }
                }
            }
        }
    }
}

/// Hide everything after `?` so tokens passed as query parameters never leak.
fn redact_url(url: &str) -> &str {
    url.split_once('?').map_or(url, |(base, _)| base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redact_url_strips_query() {
        assert_eq!(
            redact_url("wss://ws.derivws.com/websockets/v3?app_id=62002"),
            "wss://ws.derivws.com/websockets/v3"
        );
        assert_eq!(redact_url("ws://127.0.0.1:9000"), "ws://127.0.0.1:9000");
    }

    #[test]
    fn config_defaults() {
        let config = TransportConfig::new("ws://localhost:1");
        assert_eq!(config.outbound_capacity, 16);
        assert_eq!(config.backoff.max_attempts, 3);
    }

    #[tokio::test]
    async fn connect_fails_after_budget() {
        let mut config = TransportConfig::new("ws://127.0.0.1:1");
        config.backoff = BackoffConfig {
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            multiplier: 2.0,
            jitter_factor: 0.0,
            max_attempts: 2,
        };

        let result = WsTransport::connect(config).await;

        assert!(matches!(result, Err(TransportError::Connect { .. })));
    }
}
