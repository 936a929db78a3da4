//! Correlation Router
//!
//! Holds the single subscriber slot and decides whether an inbound message
//! answers the pending request.
//!
//! A reply is delivered when its kind answers the pending request kind and,
//! if both sides carry a request id, the ids are equal. An error reply
//! without `msg_type` is delivered when its request id matches. Everything
//! else is counted and dropped.

use parking_lot::Mutex;
use tracing::{debug, warn};

use super::codec::JsonCodec;
use crate::application::ports::Subscriber;
use crate::domain::protocol::{PendingRequest, Reply, ReplyKind};
use crate::infrastructure::metrics::{self, IgnoreReason};

/// What happened to an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Handed to the subscriber.
    Delivered,
    /// No subscriber was waiting.
    NoSubscriber,
    /// Did not answer the pending request.
    Unmatched,
    /// Could not be decoded.
    Malformed,
}

/// Router counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouterStats {
    /// Replies handed to a subscriber.
    pub delivered: u64,
    /// Messages dropped because nothing matched.
    pub ignored: u64,
    /// Messages that failed to decode.
    pub malformed: u64,
    /// Times a subscriber was replaced by another.
    pub replaced: u64,
}

/// Single-slot reply router.
#[derive(Debug, Default)]
pub struct CorrelationRouter {
    slot: Mutex<Option<Subscriber>>,
    stats: Mutex<RouterStats>,
    codec: JsonCodec,
}

impl CorrelationRouter {
    /// Create an empty router.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the subscriber, returning the one it replaced.
    pub fn subscribe(&self, subscriber: Subscriber) -> Option<Subscriber> {
        let previous = self.slot.lock().replace(subscriber);
        if previous.is_some() {
            self.stats.lock().replaced += 1;
        }
        previous
    }

    /// Clear the slot.
    pub fn unsubscribe(&self) -> Option<Subscriber> {
        self.slot.lock().take()
    }

    /// Pending request of the current subscriber.
    #[must_use]
    pub fn pending(&self) -> Option<PendingRequest> {
        self.slot.lock().as_ref().map(|s| s.pending)
    }

    /// Snapshot of the counters.
    #[must_use]
    pub fn stats(&self) -> RouterStats {
        *self.stats.lock()
    }

    /// Decode and route a raw text frame.
    pub fn route_text(&self, text: &str) -> RouteOutcome {
        match self.codec.decode(text) {
            Ok(reply) => self.route(reply),
            Err(e) => {
                warn!(error = %e, "Ignoring malformed inbound message");
                self.stats.lock().malformed += 1;
                metrics::record_ignored(IgnoreReason::Malformed);
                RouteOutcome::Malformed
            }
        }
    }

    /// Route a decoded reply.
    pub fn route(&self, reply: Reply) -> RouteOutcome {
        let subscriber = {
            let mut slot = self.slot.lock();
            match slot.as_ref().map(|s| s.pending) {
                None => None,
                Some(pending) if answers(&pending, &reply) => slot.take(),
                Some(pending) => {
                    drop(slot);
                    debug!(
                        kind = reply.kind.label(),
                        req_id = ?reply.correlation_id,
                        pending = %pending.kind,
                        "Ignoring reply for another request"
                    );
                    self.ignore(IgnoreReason::Unmatched);
                    return RouteOutcome::Unmatched;
                }
            }
        };

        let Some(subscriber) = subscriber else {
            debug!(
                kind = reply.kind.label(),
                req_id = ?reply.correlation_id,
                "Ignoring reply with no subscriber"
            );
            self.ignore(IgnoreReason::NoSubscriber);
            return RouteOutcome::NoSubscriber;
        };

        if subscriber.reply_tx.send(reply).is_err() {
            debug!("Subscriber went away before its reply arrived");
            self.ignore(IgnoreReason::NoSubscriber);
            return RouteOutcome::NoSubscriber;
        }
        self.stats.lock().delivered += 1;
        RouteOutcome::Delivered
    }

    fn ignore(&self, reason: IgnoreReason) {
        self.stats.lock().ignored += 1;
        metrics::record_ignored(reason);
    }
}

fn answers(pending: &PendingRequest, reply: &Reply) -> bool {
    let ids_agree = match (pending.correlation_id, reply.correlation_id) {
        (Some(expected), Some(actual)) => expected == actual,
        _ => true,
    };
    if reply.kind == ReplyKind::Unspecified {
        return reply.is_error()
            && ids_agree
            && pending.correlation_id.is_some()
            && reply.correlation_id.is_some();
    }
    ids_agree && reply.kind.answers(pending.kind)
}

#[cfg(test)]
mod tests {
    use tokio::sync::oneshot;

    use super::*;
    use crate::domain::protocol::{RemoteError, ReplyPayload, RequestKind};

    fn subscribe(
        router: &CorrelationRouter,
        kind: RequestKind,
        id: u64,
    ) -> oneshot::Receiver<Reply> {
        let (subscriber, rx) = Subscriber::new(PendingRequest::new(kind, Some(id)));
        assert!(router.subscribe(subscriber).is_none());
        rx
    }

    #[test]
    fn delivers_matching_reply_and_clears_slot() {
        let router = CorrelationRouter::new();
        let mut rx = subscribe(&router, RequestKind::Proposal, 11);

        let outcome = router.route_text(r#"{"msg_type":"proposal","req_id":11,"proposal":{"id":"P1"}}"#);

        assert_eq!(outcome, RouteOutcome::Delivered);
        assert!(router.pending().is_none());
        let reply = rx.try_recv().unwrap();
        assert_eq!(reply.kind, ReplyKind::Proposal);
        assert_eq!(router.stats().delivered, 1);
    }

    #[test]
    fn ignores_wrong_kind() {
        let router = CorrelationRouter::new();
        let mut rx = subscribe(&router, RequestKind::Buy, 12);

        let outcome = router.route_text(r#"{"msg_type":"proposal","req_id":12,"proposal":{"id":"P1"}}"#);

        assert_eq!(outcome, RouteOutcome::Unmatched);
        assert!(rx.try_recv().is_err());
        assert!(router.pending().is_some());
    }

    #[test]
    fn ignores_mismatched_request_id() {
        let router = CorrelationRouter::new();
        let _rx = subscribe(&router, RequestKind::Buy, 12);

        let outcome = router.route_text(r#"{"msg_type":"buy","req_id":7,"buy":{"contract_id":1}}"#);

        assert_eq!(outcome, RouteOutcome::Unmatched);
        assert_eq!(router.stats().ignored, 1);
    }

    #[test]
    fn reply_without_id_matches_on_kind() {
        let router = CorrelationRouter::new();
        let mut rx = subscribe(&router, RequestKind::Buy, 12);

        let outcome = router.route_text(r#"{"msg_type":"buy","buy":{"contract_id":1}}"#);

        assert_eq!(outcome, RouteOutcome::Delivered);
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn error_without_kind_matches_on_id_only() {
        let router = CorrelationRouter::new();
        let mut rx = subscribe(&router, RequestKind::Authorize, 1);

        assert_eq!(
            router.route_text(r#"{"error":{"message":"Bad"},"req_id":2}"#),
            RouteOutcome::Unmatched
        );
        assert_eq!(
            router.route_text(r#"{"error":{"message":"Bad"},"req_id":1}"#),
            RouteOutcome::Delivered
        );
        assert!(rx.try_recv().unwrap().is_error());
    }

    #[test]
    fn stale_reply_after_unsubscribe_is_ignored() {
        let router = CorrelationRouter::new();
        let _rx = subscribe(&router, RequestKind::Proposal, 3);
        router.unsubscribe();

        let outcome = router.route(Reply {
            kind: ReplyKind::Proposal,
            correlation_id: Some(3),
            body: Err(RemoteError {
                code: None,
                message: "late".to_string(),
            }),
        });

        assert_eq!(outcome, RouteOutcome::NoSubscriber);
        assert_eq!(router.stats().ignored, 1);
    }

    #[test]
    fn duplicate_reply_is_ignored() {
        let router = CorrelationRouter::new();
        let _rx = subscribe(&router, RequestKind::Buy, 4);
        let text = r#"{"msg_type":"buy","req_id":4,"buy":{"contract_id":9}}"#;

        assert_eq!(router.route_text(text), RouteOutcome::Delivered);
        assert_eq!(router.route_text(text), RouteOutcome::NoSubscriber);
    }

    #[test]
    fn malformed_is_counted_and_keeps_subscriber() {
        let router = CorrelationRouter::new();
        let _rx = subscribe(&router, RequestKind::Buy, 4);

        assert_eq!(router.route_text("{oops"), RouteOutcome::Malformed);
        assert_eq!(router.stats().malformed, 1);
        assert!(router.pending().is_some());
    }

    #[test]
    fn unknown_kind_is_ignored() {
        let router = CorrelationRouter::new();
        let _rx = subscribe(&router, RequestKind::Buy, 4);
        let outcome = router.route(Reply {
            kind: ReplyKind::Other("ping".to_string()),
            correlation_id: None,
            body: Ok(ReplyPayload::Ignored),
        });
        assert_eq!(outcome, RouteOutcome::Unmatched);
    }

    #[test]
    fn replacement_is_counted() {
        let router = CorrelationRouter::new();
        let _first = subscribe(&router, RequestKind::Proposal, 1);
        let (second, _rx) = Subscriber::new(PendingRequest::new(RequestKind::Buy, Some(2)));

        let previous = router.subscribe(second).unwrap();

        assert_eq!(previous.pending.kind, RequestKind::Proposal);
        assert_eq!(router.stats().replaced, 1);
    }

    #[test]
    fn dropped_receiver_is_not_delivered() {
        let router = CorrelationRouter::new();
        drop(subscribe(&router, RequestKind::Buy, 4));

        let outcome = router.route_text(r#"{"msg_type":"buy","req_id":4,"buy":{"contract_id":9}}"#);

        assert_eq!(outcome, RouteOutcome::NoSubscriber);
        assert_eq!(router.stats().delivered, 0);
    }
}
