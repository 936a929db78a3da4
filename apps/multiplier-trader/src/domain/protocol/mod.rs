//! Request/Reply Vocabulary
//!
//! Transport-independent description of the four protocol steps and the
//! replies that answer them. The JSON wire format lives in
//! `infrastructure::deriv`.

use std::time::Instant;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::order::{MarketParameters, OrderPlan};
use super::session::{AccountInfo, Credential};

/// Identifier echoed by the server as `req_id`.
pub type CorrelationId = u64;

// =============================================================================
// Requests
// =============================================================================

/// Kind of outbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestKind {
    /// `authorize`
    Authorize,
    /// `contracts_for`
    ContractsFor,
    /// `proposal`
    Proposal,
    /// `buy`
    Buy,
}

impl RequestKind {
    /// Discriminant used on the wire (`msg_type` of the answer).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Authorize => "authorize",
            Self::ContractsFor => "contracts_for",
            Self::Proposal => "proposal",
            Self::Buy => "buy",
        }
    }
}

impl std::fmt::Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request payload.
#[derive(Debug)]
pub enum RequestBody {
    /// Authorize the connection with an API token.
    Authorize {
        /// Token to authorize with.
        credential: Credential,
    },
    /// Fetch the contracts offered for an instrument.
    ContractsFor {
        /// Instrument symbol.
        symbol: String,
        /// Account currency.
        currency: String,
        /// Market parameters.
        market: MarketParameters,
    },
    /// Ask for a price proposal for the plan.
    Proposal {
        /// Plan to price.
        plan: OrderPlan,
        /// Market parameters.
        market: MarketParameters,
    },
    /// Buy a previously proposed contract.
    Buy {
        /// Proposal being bought.
        proposal_id: ProposalId,
        /// Maximum price accepted.
        price: Decimal,
    },
}

/// Outbound request with its correlation id.
#[derive(Debug)]
pub struct Request {
    /// Id the server echoes back as `req_id`.
    pub correlation_id: CorrelationId,
    /// Payload.
    pub body: RequestBody,
}

impl Request {
    /// Create a request.
    #[must_use]
    pub const fn new(correlation_id: CorrelationId, body: RequestBody) -> Self {
        Self {
            correlation_id,
            body,
        }
    }

    /// Kind of this request.
    #[must_use]
    pub const fn kind(&self) -> RequestKind {
        match self.body {
            RequestBody::Authorize { .. } => RequestKind::Authorize,
            RequestBody::ContractsFor { .. } => RequestKind::ContractsFor,
            RequestBody::Proposal { .. } => RequestKind::Proposal,
            RequestBody::Buy { .. } => RequestKind::Buy,
        }
    }
}

/// The single request awaiting a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingRequest {
    /// Kind of the request.
    pub kind: RequestKind,
    /// Correlation id, if the request carried one.
    pub correlation_id: Option<CorrelationId>,
    /// When the request was registered.
    pub issued_at: Instant,
}

impl PendingRequest {
    /// Register a pending request now.
    #[must_use]
    pub fn new(kind: RequestKind, correlation_id: Option<CorrelationId>) -> Self {
        Self {
            kind,
            correlation_id,
            issued_at: Instant::now(),
        }
    }

    /// Pending entry for an outbound request.
    #[must_use]
    pub fn for_request(request: &Request) -> Self {
        Self::new(request.kind(), Some(request.correlation_id))
    }
}

// =============================================================================
// Replies
// =============================================================================

/// Kind tag of an inbound message (`msg_type`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyKind {
    /// Answer to `authorize`.
    Authorize,
    /// Answer to `contracts_for`.
    ContractsFor,
    /// Answer to `proposal`.
    Proposal,
    /// Answer to `buy`.
    Buy,
    /// Any other message type (pings, streams, ...).
    Other(String),
    /// Error without a `msg_type`.
    Unspecified,
}

impl ReplyKind {
    /// Map a `msg_type` string.
    #[must_use]
    pub fn from_msg_type(msg_type: &str) -> Self {
        match msg_type {
            "authorize" => Self::Authorize,
            "contracts_for" => Self::ContractsFor,
            "proposal" => Self::Proposal,
            "buy" => Self::Buy,
            other => Self::Other(other.to_string()),
        }
    }

    /// Whether this kind is the answer to `request`.
    #[must_use]
    pub const fn answers(&self, request: RequestKind) -> bool {
        matches!(
            (self, request),
            (Self::Authorize, RequestKind::Authorize)
                | (Self::ContractsFor, RequestKind::ContractsFor)
                | (Self::Proposal, RequestKind::Proposal)
                | (Self::Buy, RequestKind::Buy)
        )
    }

    /// Label for logs and metrics.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Authorize => "authorize",
            Self::ContractsFor => "contracts_for",
            Self::Proposal => "proposal",
            Self::Buy => "buy",
            Self::Other(other) => other,
            Self::Unspecified => "unspecified",
        }
    }
}

/// Error reported by the remote endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteError {
    /// Machine-readable code (e.g. `InvalidToken`).
    pub code: Option<String>,
    /// Human-readable message.
    pub message: String,
}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// Proposal identifier.
///
/// Deliberately not `Clone`: a proposal id is moved into exactly one buy.
#[derive(Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProposalId(String);

impl ProposalId {
    /// Wrap a raw id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Raw id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProposalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Contracts offered for an instrument.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstrumentMetadata {
    /// Instrument symbol.
    pub symbol: String,
    /// Contract types offered (`MULTUP`, `CALL`, ...).
    pub contract_types: Vec<String>,
}

impl InstrumentMetadata {
    /// Whether a contract type is offered.
    #[must_use]
    pub fn offers(&self, contract_type: &str) -> bool {
        self.contract_types.iter().any(|c| c == contract_type)
    }
}

/// Priced proposal ready to be bought.
#[derive(Debug, PartialEq, Eq)]
pub struct Proposal {
    /// Id to pass to the buy request.
    pub id: ProposalId,
    /// Price asked for the contract.
    pub ask_price: Option<Decimal>,
    /// Potential payout.
    pub payout: Option<Decimal>,
    /// Spot at proposal time.
    pub spot: Option<Decimal>,
}

/// Contract bought.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Purchase {
    /// Contract id.
    pub contract_id: u64,
    /// Transaction id.
    pub transaction_id: Option<u64>,
    /// Price paid.
    pub buy_price: Option<Decimal>,
    /// Balance after the purchase.
    pub balance_after: Option<Decimal>,
    /// Purchase time.
    pub purchase_time: Option<DateTime<Utc>>,
    /// Contract description.
    pub longcode: Option<String>,
}

/// Successful reply payload.
#[derive(Debug, PartialEq, Eq)]
pub enum ReplyPayload {
    /// Authorized account.
    Authorize(AccountInfo),
    /// Instrument metadata.
    ContractsFor(InstrumentMetadata),
    /// Proposal.
    Proposal(Proposal),
    /// Purchase.
    Buy(Purchase),
    /// Message of a kind this crate does not interpret.
    Ignored,
}

/// Decoded inbound message.
#[derive(Debug, PartialEq, Eq)]
pub struct Reply {
    /// Message kind.
    pub kind: ReplyKind,
    /// Echoed `req_id`.
    pub correlation_id: Option<CorrelationId>,
    /// Payload or remote error.
    pub body: Result<ReplyPayload, RemoteError>,
}

impl Reply {
    /// Whether the server reported an error.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.body.is_err()
    }
}
