//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use multiplier_trader::application::ports::{Subscriber, TransportError, TransportPort};
use multiplier_trader::domain::protocol::{
    InstrumentMetadata, Proposal, ProposalId, Purchase, RemoteError, Reply, ReplyKind,
    ReplyPayload, Request, RequestBody, RequestKind,
};
use multiplier_trader::infrastructure::deriv::{CorrelationRouter, RouterStats};
use multiplier_trader::{AccountInfo, Credential, OrderPlan};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use tokio::time::Instant;

/// How the scripted endpoint answers one request.
pub enum Answer {
    /// Reply immediately.
    Reply(Reply),
    /// Reply after a delay, whether or not anyone still waits.
    Late(Duration, Reply),
    /// Reply immediately, then send the same reply again after a delay.
    Duplicate(Duration),
    /// Never reply.
    Silent,
    /// Drop the connection.
    Close,
}

/// A request as the endpoint saw it.
#[derive(Debug, Clone)]
pub struct SentRequest {
    pub kind: RequestKind,
    pub correlation_id: u64,
    pub at: Instant,
    pub proposal_id: Option<String>,
    pub price: Option<Decimal>,
}

type Responder = dyn Fn(&Request, usize) -> Answer + Send + Sync;

/// In-process transport answering from a script.
///
/// The responder receives each request and how many requests of the same
/// kind came before it.
pub struct ScriptedTransport {
    router: Arc<CorrelationRouter>,
    open: AtomicBool,
    closes: AtomicU32,
    sent: Mutex<Vec<SentRequest>>,
    responder: Box<Responder>,
}

impl ScriptedTransport {
    pub fn new<F>(responder: F) -> Arc<Self>
    where
        F: Fn(&Request, usize) -> Answer + Send + Sync + 'static,
    {
        Arc::new(Self {
            router: Arc::new(CorrelationRouter::new()),
            open: AtomicBool::new(true),
            closes: AtomicU32::new(0),
            sent: Mutex::new(Vec::new()),
            responder: Box::new(responder),
        })
    }

    /// Endpoint that accepts everything.
    pub fn accepting() -> Arc<Self> {
        Self::new(|request, _| Answer::Reply(success(request)))
    }

    pub fn sent(&self) -> Vec<SentRequest> {
        self.sent.lock().clone()
    }

    pub fn sent_kinds(&self) -> Vec<RequestKind> {
        self.sent.lock().iter().map(|s| s.kind).collect()
    }

    pub fn count(&self, kind: RequestKind) -> usize {
        self.sent.lock().iter().filter(|s| s.kind == kind).count()
    }

    pub fn close_calls(&self) -> u32 {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> RouterStats {
        self.router.stats()
    }

    /// Push a message as if the endpoint had sent it unprompted.
    pub fn inject(&self, reply: Reply) {
        self.router.route(reply);
    }
}

#[async_trait]
impl TransportPort for ScriptedTransport {
    async fn send(&self, request: Request) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::Closed);
        }

        let kind = request.kind();
        let (proposal_id, price) = match &request.body {
            RequestBody::Buy { proposal_id, price } => {
                (Some(proposal_id.as_str().to_string()), Some(*price))
            }
            _ => (None, None),
        };
        let nth = {
            let mut sent = self.sent.lock();
            let nth = sent.iter().filter(|s| s.kind == kind).count();
            sent.push(SentRequest {
                kind,
                correlation_id: request.correlation_id,
                at: Instant::now(),
                proposal_id,
                price,
            });
            nth
        };

        match (self.responder)(&request, nth) {
            Answer::Reply(reply) => {
                self.router.route(reply);
            }
            Answer::Late(delay, reply) => {
                let router = Arc::clone(&self.router);
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    router.route(reply);
                });
            }
            Answer::Duplicate(delay) => {
                self.router.route(success(&request));
                let router = Arc::clone(&self.router);
                let duplicate = success(&request);
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    router.route(duplicate);
                });
            }
            Answer::Silent => {}
            Answer::Close => {
                self.open.store(false, Ordering::SeqCst);
                self.router.unsubscribe();
            }
        }
        Ok(())
    }

    fn subscribe(&self, subscriber: Subscriber) -> Option<Subscriber> {
        self.router.subscribe(subscriber)
    }

    fn unsubscribe(&self) -> Option<Subscriber> {
        self.router.unsubscribe()
    }

    async fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.open.store(false, Ordering::SeqCst);
        self.router.unsubscribe();
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

// =============================================================================
// Reply Builders
// =============================================================================

/// Successful reply for any request.
pub fn success(request: &Request) -> Reply {
    let id = request.correlation_id;
    match &request.body {
        RequestBody::Authorize { .. } => reply(
            ReplyKind::Authorize,
            id,
            ReplyPayload::Authorize(AccountInfo {
                login_id: Some("CR90000000".to_string()),
                currency: Some("USD".to_string()),
                balance: Some(Decimal::new(10_000, 2)),
            }),
        ),
        RequestBody::ContractsFor { symbol, .. } => reply(
            ReplyKind::ContractsFor,
            id,
            ReplyPayload::ContractsFor(InstrumentMetadata {
                symbol: symbol.clone(),
                contract_types: vec!["MULTUP".to_string(), "MULTDOWN".to_string()],
            }),
        ),
        RequestBody::Proposal { .. } => proposal_reply(id, &format!("P{id}")),
        RequestBody::Buy { price, .. } => reply(
            ReplyKind::Buy,
            id,
            ReplyPayload::Buy(Purchase {
                contract_id: 1000 + id,
                transaction_id: Some(2000 + id),
                buy_price: Some(*price),
                balance_after: None,
                purchase_time: None,
                longcode: None,
            }),
        ),
    }
}

pub fn proposal_reply(id: u64, proposal_id: &str) -> Reply {
    reply(
        ReplyKind::Proposal,
        id,
        ReplyPayload::Proposal(Proposal {
            id: ProposalId::new(proposal_id),
            ask_price: Some(Decimal::new(1000, 2)),
            payout: None,
            spot: None,
        }),
    )
}

/// Error reply echoing the request kind and id.
pub fn rejection(request: &Request, message: &str) -> Reply {
    let kind = match request.kind() {
        RequestKind::Authorize => ReplyKind::Authorize,
        RequestKind::ContractsFor => ReplyKind::ContractsFor,
        RequestKind::Proposal => ReplyKind::Proposal,
        RequestKind::Buy => ReplyKind::Buy,
    };
    Reply {
        kind,
        correlation_id: Some(request.correlation_id),
        body: Err(RemoteError {
            code: Some("InvalidRequest".to_string()),
            message: message.to_string(),
        }),
    }
}

fn reply(kind: ReplyKind, id: u64, payload: ReplyPayload) -> Reply {
    Reply {
        kind,
        correlation_id: Some(id),
        body: Ok(payload),
    }
}

// =============================================================================
// Inputs
// =============================================================================

pub fn credential() -> Credential {
    Credential::new("a1-test-token").unwrap()
}

pub fn plan() -> OrderPlan {
    OrderPlan::builder("BOOM500", Decimal::new(1050, 2))
        .build()
        .unwrap()
}
