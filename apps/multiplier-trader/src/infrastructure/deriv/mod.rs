//! Deriv WebSocket Adapter
//!
//! Implements the transport port over the Deriv WebSocket API:
//!
//! - **Codec**: JSON encoding of requests and decoding of replies
//! - **Router**: single-slot delivery of replies to the waiting step
//! - **Transport**: connection, keep-alive and the I/O task

pub mod backoff;
pub mod codec;
pub mod heartbeat;
pub mod messages;
pub mod router;
pub mod transport;

pub use backoff::{Backoff, BackoffConfig};
pub use codec::{CodecError, JsonCodec};
pub use heartbeat::{HeartbeatAction, HeartbeatConfig, HeartbeatMonitor};
pub use router::{CorrelationRouter, RouteOutcome, RouterStats};
pub use transport::{TransportConfig, WsTransport};
