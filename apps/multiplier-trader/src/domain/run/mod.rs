//! Run State Machine
//!
//! Tracks where a run is and how many buy attempts it has consumed.
//!
//! ```text
//! Idle ─► Authenticating ─► FetchingMetadata ─► Proposing ─► Buying ─┬─► Completed
//!                                   │               ▲                 │
//!                                   │               └─ WaitingToRetry ◄┘
//!                                   └──────────────────────────────────► Completed (target 0)
//!
//! any non-terminal state ─► Aborted
//! ```
//!
//! `completed_buy_count` never decreases within a run and never exceeds
//! `target_buy_count`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Status of the current (or last) run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RunStatus {
    /// No run has started.
    #[default]
    Idle,
    /// Authorize request outstanding.
    Authenticating,
    /// Instrument metadata request outstanding.
    FetchingMetadata,
    /// Proposal request outstanding.
    Proposing,
    /// Buy request outstanding.
    Buying,
    /// Pacing delay before the next proposal.
    WaitingToRetry,
    /// All buy attempts consumed.
    Completed,
    /// Run ended early.
    Aborted,
}

impl RunStatus {
    /// Whether the run has ended.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Aborted)
    }

    /// Whether a new run may start from this status.
    #[must_use]
    pub const fn can_start(self) -> bool {
        matches!(self, Self::Idle | Self::Completed | Self::Aborted)
    }

    /// Whether `next` is a legal successor of this status.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        if matches!(next, Self::Aborted) {
            return !self.is_terminal() && !matches!(self, Self::Idle);
        }
        matches!(
            (self, next),
            (Self::Authenticating, Self::FetchingMetadata)
                | (Self::FetchingMetadata, Self::Proposing | Self::Completed)
                | (Self::Proposing, Self::Buying)
                | (Self::Buying, Self::WaitingToRetry | Self::Completed)
                | (Self::WaitingToRetry, Self::Proposing)
        )
    }

    /// Lowercase label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Authenticating => "authenticating",
            Self::FetchingMetadata => "fetching_metadata",
            Self::Proposing => "proposing",
            Self::Buying => "buying",
            Self::WaitingToRetry => "waiting_to_retry",
            Self::Completed => "completed",
            Self::Aborted => "aborted",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Illegal run state operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunStateError {
    /// Transition not allowed by the state machine.
    #[error("illegal transition from {from} to {to}")]
    IllegalTransition {
        /// Current status.
        from: RunStatus,
        /// Requested status.
        to: RunStatus,
    },

    /// A run is already in progress.
    #[error("cannot start a run while {0}")]
    RunInProgress(RunStatus),

    /// Buy attempt recorded outside of the Buying status.
    #[error("buy attempt recorded while {0}")]
    NotBuying(RunStatus),

    /// Every buy attempt of the run is already consumed.
    #[error("all {0} buy attempts already consumed")]
    TargetReached(u32),
}

/// Mutable state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RunState {
    target_buy_count: u32,
    completed_buy_count: u32,
    status: RunStatus,
}

impl RunState {
    /// Create an idle state.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            target_buy_count: 0,
            completed_buy_count: 0,
            status: RunStatus::Idle,
        }
    }

    /// Current status.
    #[must_use]
    pub const fn status(&self) -> RunStatus {
        self.status
    }

    /// Number of buy attempts the run aims for.
    #[must_use]
    pub const fn target_buy_count(&self) -> u32 {
        self.target_buy_count
    }

    /// Number of buy attempts consumed so far, successful or not.
    #[must_use]
    pub const fn completed_buy_count(&self) -> u32 {
        self.completed_buy_count
    }

    /// Buy attempts still to go.
    #[must_use]
    pub const fn remaining(&self) -> u32 {
        self.target_buy_count - self.completed_buy_count
    }

    /// Start a new run, resetting the counter.
    ///
    /// # Errors
    ///
    /// Returns `RunStateError::RunInProgress` unless the previous run ended.
    pub const fn begin(&mut self, target_buy_count: u32) -> Result<(), RunStateError> {
        if !self.status.can_start() {
            return Err(RunStateError::RunInProgress(self.status));
        }
        self.target_buy_count = target_buy_count;
        self.completed_buy_count = 0;
        self.status = RunStatus::Authenticating;
        Ok(())
    }

    /// Move to the next status.
    ///
    /// # Errors
    ///
    /// Returns `RunStateError::IllegalTransition` if the move is not allowed.
    pub fn transition(&mut self, next: RunStatus) -> Result<(), RunStateError> {
        if !self.status.can_transition_to(next) {
            return Err(RunStateError::IllegalTransition {
                from: self.status,
                to: next,
            });
        }
        if next == RunStatus::Completed && self.remaining() > 0 {
            return Err(RunStateError::IllegalTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Count one consumed buy attempt and return how many remain.
    ///
    /// # Errors
    ///
    /// Fails when not in `Buying` or when the target is already reached.
    pub const fn record_buy_attempt(&mut self) -> Result<u32, RunStateError> {
        if !matches!(self.status, RunStatus::Buying) {
            return Err(RunStateError::NotBuying(self.status));
        }
        if self.completed_buy_count >= self.target_buy_count {
            return Err(RunStateError::TargetReached(self.target_buy_count));
        }
        self.completed_buy_count += 1;
        Ok(self.remaining())
    }

    /// Abort the run from any non-terminal status. No-op once terminal.
    pub fn abort(&mut self) {
        if !self.status.is_terminal() && self.status != RunStatus::Idle {
            self.status = RunStatus::Aborted;
        }
    }
}
