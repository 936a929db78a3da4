//! Step Handlers
//!
//! Authenticate, FetchInstrumentMetadata, Propose and Buy share one shape:
//! subscribe, send exactly one request, then wait for the matching reply, the
//! connection closing, or the reply timeout.
//!
//! The first three steps close the connection when they fail. A failed buy
//! leaves it open so the run can continue.

use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::context::RunContext;
use crate::application::ports::{Subscriber, TransportPort};
use crate::domain::protocol::{
    CorrelationId, InstrumentMetadata, PendingRequest, Proposal, Purchase, ReplyPayload, Request,
    RequestBody, RequestKind,
};
use crate::domain::session::{AccountInfo, Session};
use crate::infrastructure::metrics::{self, Outcome};

/// Default time to wait for a reply.
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(30);

/// Failure of a single step.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StepError {
    /// The connection closed before a reply arrived.
    #[error("connection closed: {reason}")]
    TransportClosed {
        /// Why the connection is gone.
        reason: String,
    },

    /// The remote endpoint rejected the request.
    #[error("{reason}")]
    RemoteRejected {
        /// Remote error message.
        reason: String,
    },

    /// No reply arrived within the reply timeout.
    #[error("{reason}")]
    TimedOut {
        /// Which reply was missing.
        reason: String,
    },
}

impl StepError {
    /// Human-readable reason.
    #[must_use]
    pub fn reason(&self) -> &str {
        match self {
            Self::TransportClosed { reason }
            | Self::RemoteRejected { reason }
            | Self::TimedOut { reason } => reason,
        }
    }

    /// Metrics outcome recorded for this failure.
    #[must_use]
    pub const fn outcome(&self) -> Outcome {
        match self {
            Self::TimedOut { .. } => Outcome::TimedOut,
            Self::TransportClosed { .. } | Self::RemoteRejected { .. } => Outcome::Rejected,
        }
    }

    fn unexpected(kind: RequestKind) -> Self {
        Self::RemoteRejected {
            reason: format!("unexpected reply to {kind}"),
        }
    }
}

/// Runs the four protocol steps over a shared transport.
pub struct StepHandlers<T: TransportPort + ?Sized> {
    transport: Arc<T>,
    reply_timeout: Duration,
}

impl<T: TransportPort + ?Sized> StepHandlers<T> {
    /// Create step handlers over a transport.
    #[must_use]
    pub const fn new(transport: Arc<T>, reply_timeout: Duration) -> Self {
        Self {
            transport,
            reply_timeout,
        }
    }

    /// Authorize the session of a run.
    ///
    /// Logs a warning when the account currency differs from the plan's.
    ///
    /// # Errors
    ///
    /// Returns a `StepError` if the authorize request fails. The connection
    /// is closed in that case.
    pub async fn authenticate(&self, ctx: &mut RunContext) -> Result<AccountInfo, StepError> {
        let correlation_id = ctx.next_correlation_id();
        let account = self.authorize(ctx.session_mut(), correlation_id).await?;

        if let Some(currency) = account.currency.as_deref()
            && !currency.eq_ignore_ascii_case(ctx.plan().currency())
        {
            warn!(
                account_currency = currency,
                plan_currency = ctx.plan().currency(),
                "Account currency differs from order currency"
            );
        }
        Ok(account)
    }

    /// Authorize a session with its credential.
    ///
    /// # Errors
    ///
    /// Returns a `StepError` if the authorize request fails. The connection
    /// is closed in that case.
    pub async fn authorize(
        &self,
        session: &mut Session,
        correlation_id: CorrelationId,
    ) -> Result<AccountInfo, StepError> {
        let request = Request::new(
            correlation_id,
            RequestBody::Authorize {
                credential: session.credential().clone(),
            },
        );

        match self.exchange(request).await {
            Ok(ReplyPayload::Authorize(account)) => {
                info!(login_id = ?account.login_id, "Authorized");
                session.authorize(account.clone());
                Ok(account)
            }
            Ok(_) => self.fail_and_close(StepError::unexpected(RequestKind::Authorize)).await,
            Err(e) => self.fail_and_close(e).await,
        }
    }

    /// Fetch the contracts offered for the plan's instrument.
    ///
    /// Logs a warning when the plan's contract type is not listed.
    ///
    /// # Errors
    ///
    /// Returns a `StepError` if the request fails. The connection is closed
    /// in that case.
    pub async fn fetch_instrument_metadata(
        &self,
        ctx: &mut RunContext,
    ) -> Result<InstrumentMetadata, StepError> {
        let request = Request::new(
            ctx.next_correlation_id(),
            RequestBody::ContractsFor {
                symbol: ctx.plan().symbol().to_string(),
                currency: ctx.plan().currency().to_string(),
                market: ctx.market().clone(),
            },
        );

        let metadata = match self.exchange(request).await {
            Ok(ReplyPayload::ContractsFor(metadata)) => metadata,
            Ok(_) => {
                return self
                    .fail_and_close(StepError::unexpected(RequestKind::ContractsFor))
                    .await;
            }
            Err(e) => return self.fail_and_close(e).await,
        };

        let contract_type = ctx.plan().direction().contract_type();
        if !metadata.offers(contract_type) {
            warn!(
                symbol = %metadata.symbol,
                contract_type,
                offered = metadata.contract_types.len(),
                "Instrument does not list the order contract type"
            );
        }
        ctx.set_metadata(metadata.clone());
        Ok(metadata)
    }

    /// Ask for a proposal for the plan.
    ///
    /// # Errors
    ///
    /// Returns a `StepError` if the request fails. The connection is closed
    /// in that case.
    pub async fn propose(&self, ctx: &mut RunContext) -> Result<Proposal, StepError> {
        let request = Request::new(
            ctx.next_correlation_id(),
            RequestBody::Proposal {
                plan: ctx.plan().clone(),
                market: ctx.market().clone(),
            },
        );

        match self.exchange(request).await {
            Ok(ReplyPayload::Proposal(proposal)) => {
                debug!(
                    proposal_id = %proposal.id,
                    ask_price = ?proposal.ask_price,
                    payout = ?proposal.payout,
                    "Proposal received"
                );
                Ok(proposal)
            }
            Ok(_) => self.fail_and_close(StepError::unexpected(RequestKind::Proposal)).await,
            Err(e) => self.fail_and_close(e).await,
        }
    }

    /// Buy a proposal at the plan's stake. The proposal is consumed.
    ///
    /// # Errors
    ///
    /// Returns a `StepError` if the buy fails. The connection stays open.
    pub async fn buy(
        &self,
        ctx: &mut RunContext,
        proposal: Proposal,
    ) -> Result<Purchase, StepError> {
        let request = Request::new(
            ctx.next_correlation_id(),
            RequestBody::Buy {
                proposal_id: proposal.id,
                price: ctx.plan().stake(),
            },
        );

        match self.exchange(request).await? {
            ReplyPayload::Buy(purchase) => {
                info!(
                    contract_id = purchase.contract_id,
                    buy_price = ?purchase.buy_price,
                    balance_after = ?purchase.balance_after,
                    "Contract bought"
                );
                Ok(purchase)
            }
            _ => Err(StepError::unexpected(RequestKind::Buy)),
        }
    }

    async fn fail_and_close<R>(&self, error: StepError) -> Result<R, StepError> {
        self.transport.close().await;
        Err(error)
    }

    /// Subscribe, send, and wait for the single matching reply.
    async fn exchange(&self, request: Request) -> Result<ReplyPayload, StepError> {
        let kind = request.kind();
        let correlation_id = request.correlation_id;
        let (subscriber, reply_rx) = Subscriber::new(PendingRequest::for_request(&request));

        if let Some(previous) = self.transport.subscribe(subscriber) {
            warn!(
                kind = %kind,
                replaced = %previous.pending.kind,
                "Replaced an active subscriber"
            );
        }

        debug!(kind = %kind, req_id = correlation_id, "Sending request");
        let sent_at = Instant::now();
        if let Err(e) = self.transport.send(request).await {
            self.transport.unsubscribe();
            return Err(StepError::TransportClosed {
                reason: e.to_string(),
            });
        }
        metrics::record_request_sent(kind);

        let reply = match timeout(self.reply_timeout, reply_rx).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => {
                return Err(StepError::TransportClosed {
                    reason: format!("no {kind} reply before the connection closed"),
                });
            }
            Err(_) => {
                self.transport.unsubscribe();
                metrics::record_reply(kind, Outcome::TimedOut);
                warn!(kind = %kind, req_id = correlation_id, "Reply timed out");
                return Err(StepError::TimedOut {
                    reason: format!("no {kind} reply within {}s", self.reply_timeout.as_secs()),
                });
            }
        };

        metrics::record_reply_latency(kind, sent_at.elapsed());
        match reply.body {
            Ok(payload) => {
                metrics::record_reply(kind, Outcome::Success);
                Ok(payload)
            }
            Err(error) => {
                metrics::record_reply(kind, Outcome::Rejected);
                warn!(
                    kind = %kind,
                    code = ?error.code,
                    message = %error.message,
                    "Request rejected"
                );
                Err(StepError::RemoteRejected {
                    reason: error.message,
                })
            }
        }
    }
}
