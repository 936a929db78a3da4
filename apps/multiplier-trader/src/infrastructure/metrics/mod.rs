//! Prometheus Metrics Module
//!
//! Exposes run and wire metrics in Prometheus format.
//!
//! # Metrics Categories
//!
//! - **Requests**: Requests sent by kind
//! - **Replies**: Replies routed by kind and outcome, ignored inbound messages
//! - **Orders**: Buy attempts by outcome, runs by final status
//! - **Latency**: Request to reply latency by kind
//!
//! # Integration
//!
//! When a port is configured the exporter serves `/metrics` on it. Without a
//! recorder installed every recording function is a no-op.

use std::net::SocketAddr;
use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use thiserror::Error;

use crate::domain::protocol::RequestKind;
use crate::domain::run::RunStatus;

// =============================================================================
// Global Recorder
// =============================================================================

static METRICS_INSTALLED: OnceLock<SocketAddr> = OnceLock::new();

/// Metrics exporter errors.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// Exporter could not be installed.
    #[error("failed to install Prometheus exporter: {0}")]
    Install(String),
}

/// Install the Prometheus exporter listening on `port`.
///
/// Returns the listen address, or `None` when `port` is 0 (metrics disabled).
/// Must be called from within a Tokio runtime. Later calls return the address
/// of the first installation.
///
/// # Errors
///
/// Returns `MetricsError::Install` if the recorder or listener cannot be set up.
pub fn init_metrics(port: u16) -> Result<Option<SocketAddr>, MetricsError> {
    if port == 0 {
        return Ok(None);
    }
    if let Some(addr) = METRICS_INSTALLED.get() {
        return Ok(Some(*addr));
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| MetricsError::Install(e.to_string()))?;

    register_metrics();
    Ok(Some(*METRICS_INSTALLED.get_or_init(|| addr)))
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "multiplier_trader_requests_sent_total",
        "Total requests sent by kind"
    );
    describe_counter!(
        "multiplier_trader_replies_total",
        "Total replies delivered to a step by kind and outcome"
    );
    describe_counter!(
        "multiplier_trader_inbound_ignored_total",
        "Total inbound messages ignored by the router by reason"
    );
    describe_counter!(
        "multiplier_trader_buy_attempts_total",
        "Total buy attempts by outcome"
    );
    describe_counter!(
        "multiplier_trader_runs_total",
        "Total runs by final status"
    );
    describe_counter!(
        "multiplier_trader_connect_attempts_total",
        "Total connection attempts by outcome"
    );

    describe_histogram!(
        "multiplier_trader_reply_latency_seconds",
        "Time from sending a request to receiving its reply"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Outcome label for replies and buy attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Success payload.
    Success,
    /// Remote error.
    Rejected,
    /// No reply within the timeout.
    TimedOut,
}

impl Outcome {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Rejected => "rejected",
            Self::TimedOut => "timed_out",
        }
    }
}

/// Reason label for ignored inbound messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Not valid JSON or missing fields.
    Malformed,
    /// No subscriber waiting.
    NoSubscriber,
    /// Kind or request id does not match the pending request.
    Unmatched,
}

impl IgnoreReason {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Malformed => "malformed",
            Self::NoSubscriber => "no_subscriber",
            Self::Unmatched => "unmatched",
        }
    }
}

/// Record a request sent.
pub fn record_request_sent(kind: RequestKind) {
    counter!(
        "multiplier_trader_requests_sent_total",
        "kind" => kind.as_str()
    )
    .increment(1);
}

/// Record a reply outcome for a step.
pub fn record_reply(kind: RequestKind, outcome: Outcome) {
    counter!(
        "multiplier_trader_replies_total",
        "kind" => kind.as_str(),
        "outcome" => outcome.as_str()
    )
    .increment(1);
}

/// Record an inbound message the router did not deliver.
pub fn record_ignored(reason: IgnoreReason) {
    counter!(
        "multiplier_trader_inbound_ignored_total",
        "reason" => reason.as_str()
    )
    .increment(1);
}

/// Record a buy attempt.
pub fn record_buy_attempt(outcome: Outcome) {
    counter!(
        "multiplier_trader_buy_attempts_total",
        "outcome" => outcome.as_str()
    )
    .increment(1);
}

/// Record a finished run.
pub fn record_run_finished(status: RunStatus) {
    counter!(
        "multiplier_trader_runs_total",
        "status" => status.as_str()
    )
    .increment(1);
}

/// Record a connection attempt.
pub fn record_connect_attempt(success: bool) {
    counter!(
        "multiplier_trader_connect_attempts_total",
        "outcome" => if success { "success" } else { "failure" }
    )
    .increment(1);
}

/// Record request to reply latency.
pub fn record_reply_latency(kind: RequestKind, latency: Duration) {
    histogram!(
        "multiplier_trader_reply_latency_seconds",
        "kind" => kind.as_str()
    )
    .record(latency.as_secs_f64());
}

// =============================================================================
// Tests
// =============================================================================
