//! Run Context
//!
//! Everything one run needs, owned by the sequencer for the duration of the
//! run and passed to each step by `&mut`.

use uuid::Uuid;

use crate::domain::order::{MarketParameters, OrderPlan};
use crate::domain::protocol::{CorrelationId, InstrumentMetadata};
use crate::domain::session::Session;

/// Per-run state shared between the sequencer and the step handlers.
#[derive(Debug)]
pub struct RunContext {
    run_id: Uuid,
    session: Session,
    plan: OrderPlan,
    market: MarketParameters,
    next_correlation_id: CorrelationId,
    metadata: Option<InstrumentMetadata>,
}

impl RunContext {
    /// Create a context for a new run.
    #[must_use]
    pub fn new(session: Session, plan: OrderPlan, market: MarketParameters) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            session,
            plan,
            market,
            next_correlation_id: 1,
            metadata: None,
        }
    }

    /// Identifier of this run, for logs.
    #[must_use]
    pub const fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Allocate the next request id. Strictly increasing within a run.
    pub const fn next_correlation_id(&mut self) -> CorrelationId {
        let id = self.next_correlation_id;
        self.next_correlation_id += 1;
        id
    }

    /// Session of this run.
    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    /// Mutable session, for the authenticate step.
    pub const fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Order plan of this run.
    #[must_use]
    pub const fn plan(&self) -> &OrderPlan {
        &self.plan
    }

    /// Market parameters of this run.
    #[must_use]
    pub const fn market(&self) -> &MarketParameters {
        &self.market
    }

    /// Instrument metadata, once fetched.
    #[must_use]
    pub const fn metadata(&self) -> Option<&InstrumentMetadata> {
        self.metadata.as_ref()
    }

    /// Store fetched instrument metadata.
    pub fn set_metadata(&mut self, metadata: InstrumentMetadata) {
        self.metadata = Some(metadata);
    }

    /// Give the session back when the run ends.
    #[must_use]
    pub fn into_session(self) -> Session {
        self.session
    }
}
