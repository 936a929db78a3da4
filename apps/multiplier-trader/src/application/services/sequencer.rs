//! Order Sequencer
//!
//! Drives one run: authenticate, fetch instrument metadata, then repeat
//! propose and buy until the target number of buy attempts is consumed,
//! pausing for the pacing delay between attempts.
//!
//! Failed buys count toward the target. Any other failure aborts the run.
//! A stop request aborts the run the next time control returns here; the
//! pacing wait is cancelled immediately but an in-flight request is not.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

use super::context::RunContext;
use super::steps::{DEFAULT_REPLY_TIMEOUT, StepError, StepHandlers};
use crate::application::ports::{NotificationPort, TransportPort};
use crate::domain::order::{MarketParameters, OrderPlan};
use crate::domain::protocol::Purchase;
use crate::domain::run::{RunState, RunStateError, RunStatus};
use crate::domain::session::{AccountInfo, Credential, Session};
use crate::infrastructure::metrics::{self, Outcome};

/// Default delay between a buy reply and the next proposal.
pub const DEFAULT_PACING_DELAY: Duration = Duration::from_millis(1000);

// =============================================================================
// Configuration
// =============================================================================

/// Sequencer configuration.
#[derive(Debug, Clone)]
pub struct SequencerConfig {
    /// Delay between a buy reply and the next proposal.
    pub pacing_delay: Duration,
    /// Time to wait for each reply.
    pub reply_timeout: Duration,
    /// Market parameters sent with metadata and proposal requests.
    pub market: MarketParameters,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            pacing_delay: DEFAULT_PACING_DELAY,
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
            market: MarketParameters::default(),
        }
    }
}

// =============================================================================
// Stop Handle
// =============================================================================

/// Cloneable handle that stops the current run.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    token: Arc<Mutex<CancellationToken>>,
}

impl StopHandle {
    /// Request the current run to stop.
    pub fn stop(&self) {
        self.token.lock().cancel();
    }

    /// Whether a stop has been requested for the current run.
    #[must_use]
    pub fn is_stop_requested(&self) -> bool {
        self.token.lock().is_cancelled()
    }

    /// Fresh token for a new run.
    fn reset(&self) -> CancellationToken {
        let mut token = self.token.lock();
        *token = CancellationToken::new();
        token.clone()
    }
}

// =============================================================================
// Run Report
// =============================================================================

/// Outcome of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Run identifier.
    pub run_id: Uuid,
    /// Final status, `Completed` or `Aborted`.
    pub status: RunStatus,
    /// Buy attempts the run aimed for.
    pub target_buy_count: u32,
    /// Buy attempts consumed, successful or not.
    pub completed_buy_count: u32,
    /// Successful purchases, in order.
    pub purchases: Vec<Purchase>,
    /// Reasons of rejected buys, in order.
    pub buy_failures: Vec<String>,
    /// Why the run aborted.
    pub abort_reason: Option<String>,
}

impl RunReport {
    fn new(run_id: Uuid, target_buy_count: u32) -> Self {
        Self {
            run_id,
            status: RunStatus::Idle,
            target_buy_count,
            completed_buy_count: 0,
            purchases: Vec::new(),
            buy_failures: Vec::new(),
            abort_reason: None,
        }
    }

    /// Whether the run consumed every buy attempt.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status == RunStatus::Completed
    }
}

// =============================================================================
// Sequencer
// =============================================================================

/// State machine driving the step handlers.
pub struct OrderSequencer<T, N>
where
    T: TransportPort + ?Sized,
    N: NotificationPort + ?Sized,
{
    steps: StepHandlers<T>,
    sink: Arc<N>,
    config: SequencerConfig,
    state: RunState,
    session: Option<Session>,
    stop: StopHandle,
}

impl<T, N> OrderSequencer<T, N>
where
    T: TransportPort + ?Sized,
    N: NotificationPort + ?Sized,
{
    /// Create a sequencer over a transport and a notification sink.
    #[must_use]
    pub fn new(transport: Arc<T>, sink: Arc<N>, config: SequencerConfig) -> Self {
        Self {
            steps: StepHandlers::new(transport, config.reply_timeout),
            sink,
            config,
            state: RunState::new(),
            session: None,
            stop: StopHandle::default(),
        }
    }

    /// Handle that stops the current run.
    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Run state of the current or last run.
    #[must_use]
    pub const fn state(&self) -> &RunState {
        &self.state
    }

    /// Session of the last run or credential check.
    #[must_use]
    pub const fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Check a credential by running only the authenticate step.
    ///
    /// # Errors
    ///
    /// Returns the `StepError` of the authenticate step.
    pub async fn check_credential(
        &mut self,
        credential: Credential,
    ) -> Result<AccountInfo, StepError> {
        let mut session = Session::new(credential);
        let result = self
            .steps
            .authorize(&mut session, 1)
            .instrument(info_span!("check_credential"))
            .await;

        match &result {
            Ok(_) => self.sink.notify("Authentication successful."),
            Err(e) => self.notify_failure("Authentication unsuccessful", e),
        }
        self.session = Some(session);
        result
    }

    /// Run the sequence for `target_buy_count` buy attempts.
    ///
    /// # Errors
    ///
    /// Returns a `RunStateError` only if the state machine is violated;
    /// step failures end the run as `Aborted` in the report.
    pub async fn start(
        &mut self,
        credential: Credential,
        plan: OrderPlan,
        target_buy_count: u32,
    ) -> Result<RunReport, RunStateError> {
        self.state.begin(target_buy_count)?;
        let cancel = self.stop.reset();

        let mut ctx = RunContext::new(Session::new(credential), plan, self.config.market.clone());
        let mut report = RunReport::new(ctx.run_id(), target_buy_count);
        let span = info_span!(
            "run",
            run_id = %ctx.run_id(),
            symbol = ctx.plan().symbol(),
            target = target_buy_count
        );

        info!(parent: &span, "Run started");
        let driven = self
            .drive(&mut ctx, &cancel, &mut report)
            .instrument(span.clone())
            .await;

        let settled = self.settle(driven, &mut report);
        self.session = Some(ctx.into_session());
        settled?;

        metrics::record_run_finished(report.status);
        info!(
            parent: &span,
            status = %report.status,
            completed = report.completed_buy_count,
            purchases = report.purchases.len(),
            failures = report.buy_failures.len(),
            "Run finished"
        );
        Ok(report)
    }

    async fn drive(
        &mut self,
        ctx: &mut RunContext,
        cancel: &CancellationToken,
        report: &mut RunReport,
    ) -> Result<(), RunStateError> {
        if let Err(e) = self.steps.authenticate(ctx).await {
            self.notify_failure("Authentication unsuccessful", &e);
            self.abort(report, e.to_string());
            return Ok(());
        }
        self.sink.notify("Authentication successful.");
        if self.stopped(cancel, report) {
            return Ok(());
        }

        self.state.transition(RunStatus::FetchingMetadata)?;
        if let Err(e) = self.steps.fetch_instrument_metadata(ctx).await {
            self.notify_failure("Error fetching contracts", &e);
            self.abort(report, e.to_string());
            return Ok(());
        }
        if self.state.remaining() == 0 {
            self.state.transition(RunStatus::Completed)?;
            return Ok(());
        }

        loop {
            if self.stopped(cancel, report) {
                return Ok(());
            }

            self.state.transition(RunStatus::Proposing)?;
            let proposal = match self.steps.propose(ctx).await {
                Ok(proposal) => proposal,
                Err(e) => {
                    self.notify_failure("Error fetching proposal", &e);
                    self.abort(report, e.to_string());
                    return Ok(());
                }
            };
            if self.stopped(cancel, report) {
                return Ok(());
            }

            self.state.transition(RunStatus::Buying)?;
            match self.steps.buy(ctx, proposal).await {
                Ok(purchase) => {
                    metrics::record_buy_attempt(Outcome::Success);
                    self.sink.notify("Buy successful.");
                    report.purchases.push(purchase);
                }
                Err(e @ (StepError::RemoteRejected { .. } | StepError::TimedOut { .. })) => {
                    metrics::record_buy_attempt(e.outcome());
                    let reason = e.reason().to_string();
                    self.sink.notify(&format!("Buy unsuccessful: {reason}"));
                    report.buy_failures.push(reason);
                }
                Err(e @ StepError::TransportClosed { .. }) => {
                    self.notify_failure("Buy unsuccessful", &e);
                    self.abort(report, e.to_string());
                    return Ok(());
                }
            }

            let remaining = self.state.record_buy_attempt()?;
            info!(
                completed = self.state.completed_buy_count(),
                remaining, "Buy attempt recorded"
            );
            if remaining == 0 {
                self.state.transition(RunStatus::Completed)?;
                return Ok(());
            }

            self.state.transition(RunStatus::WaitingToRetry)?;
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    self.stopped(cancel, report);
                    return Ok(());
                }
                () = tokio::time::sleep(self.config.pacing_delay) => {}
            }
        }
    }

    /// Copy the final state into the report. A state machine violation
    /// aborts the run so the next `start` is accepted.
    fn settle(
        &mut self,
        driven: Result<(), RunStateError>,
        report: &mut RunReport,
    ) -> Result<(), RunStateError> {
        if let Err(e) = &driven {
            self.abort(report, e.to_string());
        }
        report.status = self.state.status();
        report.completed_buy_count = self.state.completed_buy_count();
        driven
    }

    fn stopped(&mut self, cancel: &CancellationToken, report: &mut RunReport) -> bool {
        if !cancel.is_cancelled() {
            return false;
        }
        info!(status = %self.state.status(), "Stop requested");
        self.sink.notify("Run stopped.");
        self.abort(report, "stop requested".to_string());
        true
    }

    fn abort(&mut self, report: &mut RunReport, reason: String) {
        warn!(status = %self.state.status(), reason = %reason, "Run aborted");
        self.state.abort();
        report.abort_reason = Some(reason);
    }

    fn notify_failure(&self, prefix: &str, error: &StepError) {
        match error {
            StepError::RemoteRejected { reason } | StepError::TimedOut { reason } => {
                self.sink.notify(&format!("{prefix}: {reason}"));
            }
            StepError::TransportClosed { reason } => {
                self.sink.notify(&format!("Connection closed: {reason}"));
            }
        }
    }
}
