#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements,
        clippy::default_trait_access
    )
)]

//! Multiplier Trader - Sequenced Order Placement
//!
//! Places a bounded number of multiplier contracts on a Deriv WebSocket
//! connection. Each run authenticates, fetches the contracts available for
//! the instrument, then repeats proposal and buy until the requested number
//! of buy attempts is consumed, pausing between attempts.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Order plans, sessions, run state and protocol types
//!   - `order`: Order plan and market parameters
//!   - `session`: Credential and authorization state
//!   - `run`: Run status machine and buy counters
//!   - `protocol`: Requests, replies and correlation
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Transport and notification interfaces
//!   - `services`: Step handlers and the order sequencer
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `deriv`: WebSocket transport, JSON codec and reply routing
//!   - `config`: Environment configuration
//!   - `notify`: Console and in-memory notification sinks
//!   - `metrics`: Prometheus counters and histograms
//!   - `telemetry`: Tracing subscriber setup
//!
//! # Request Flow
//!
//! ```text
//!            ┌──────────────┐  Request   ┌─────────────┐   text    ┌────────┐
//! sequencer ─┤ StepHandlers ├───────────►│ WsTransport ├──────────►│ Deriv  │
//!            └──────▲───────┘            └──────┬──────┘           └───┬────┘
//!                   │ oneshot     ┌─────────────▼──────┐   reply       │
//!                   └─────────────┤ CorrelationRouter  │◄──────────────┘
//!                                 └────────────────────┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core trading types with no I/O.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::order::{
    ContractDirection, DurationUnit, MarketParameters, OrderPlan, OrderPlanError,
};
pub use domain::run::{RunState, RunStateError, RunStatus};
pub use domain::session::{AccountInfo, Credential, CredentialError, Session};

// Application services
pub use application::ports::{NotificationPort, TransportError, TransportPort};
pub use application::services::{
    OrderSequencer, RunReport, SequencerConfig, StepError, StepHandlers, StopHandle,
};

// Infrastructure config
pub use infrastructure::config::{ConfigError, RunMode, TraderConfig};

// Transport (for integration tests)
pub use infrastructure::deriv::{CorrelationRouter, JsonCodec, TransportConfig, WsTransport};

// Notification sinks
pub use infrastructure::notify::{ConsoleSink, MemorySink};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
