//! Application Services
//!
//! Step handlers and the sequencer that drives them through a run.

mod context;
mod sequencer;
mod steps;

pub use context::RunContext;
pub use sequencer::{
    DEFAULT_PACING_DELAY, OrderSequencer, RunReport, SequencerConfig, StopHandle,
};
pub use steps::{DEFAULT_REPLY_TIMEOUT, StepError, StepHandlers};
