//! Domain Layer - Order plans, run state and the request/reply vocabulary.
//!
//! Types in this layer are plain Rust with serialization support and no
//! knowledge of sockets, timers or channels.

/// Order plan and market parameters.
pub mod order;

/// Requests, replies and their payloads.
pub mod protocol;

/// Run state machine (status and buy counters).
pub mod run;

/// Credential and authorization session.
pub mod session;
