//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer.

/// Configuration loaded from the environment.
pub mod config;

/// Deriv WebSocket transport adapter.
pub mod deriv;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// Presentation sinks.
pub mod notify;

/// OpenTelemetry tracing integration.
pub mod telemetry;
