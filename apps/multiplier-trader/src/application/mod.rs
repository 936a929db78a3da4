//! Application Layer
//!
//! Orchestrates the domain through the step handlers and the order
//! sequencer. It defines:
//!
//! - **Ports**: the connection transport and the presentation sink
//! - **Services**: step handlers, run context and the sequencer

pub mod ports;
pub mod services;

pub use ports::*;
pub use services::*;
