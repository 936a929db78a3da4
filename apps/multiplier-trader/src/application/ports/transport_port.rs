//! Transport Port (Driven Port)
//!
//! One persistent duplex connection. Replies reach whoever holds the single
//! subscriber slot; there is never more than one.

use async_trait::async_trait;
use tokio::sync::oneshot;

use crate::domain::protocol::{PendingRequest, Reply, Request};

/// Transport port error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Connection is not open.
    #[error("connection closed")]
    Closed,

    /// Request could not be encoded.
    #[error("failed to encode request: {message}")]
    Encode {
        /// Error details.
        message: String,
    },

    /// Connection could not be established.
    #[error("connection failed: {message}")]
    Connect {
        /// Error details.
        message: String,
    },
}

/// The step currently awaiting a reply.
#[derive(Debug)]
pub struct Subscriber {
    /// Request the subscriber waits on.
    pub pending: PendingRequest,
    /// Channel the matching reply is delivered on.
    pub reply_tx: oneshot::Sender<Reply>,
}

impl Subscriber {
    /// Create a subscriber and the receiver its reply arrives on.
    #[must_use]
    pub fn new(pending: PendingRequest) -> (Self, oneshot::Receiver<Reply>) {
        let (reply_tx, reply_rx) = oneshot::channel();
        (Self { pending, reply_tx }, reply_rx)
    }
}

/// Port for the shared connection.
#[async_trait]
pub trait TransportPort: Send + Sync {
    /// Transmit a request. The request is consumed.
    async fn send(&self, request: Request) -> Result<(), TransportError>;

    /// Install the active subscriber, returning the one it replaced.
    fn subscribe(&self, subscriber: Subscriber) -> Option<Subscriber>;

    /// Clear the subscriber slot, returning its previous occupant.
    fn unsubscribe(&self) -> Option<Subscriber>;

    /// Terminate the connection. Idempotent.
    async fn close(&self);

    /// Whether the connection is still open.
    fn is_open(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::protocol::{ReplyKind, ReplyPayload, RequestKind};

    #[tokio::test]
    async fn subscriber_delivers_on_its_receiver() {
        let (subscriber, rx) = Subscriber::new(PendingRequest::new(RequestKind::Buy, Some(3)));
        assert_eq!(subscriber.pending.kind, RequestKind::Buy);

        subscriber
            .reply_tx
            .send(Reply {
                kind: ReplyKind::Buy,
                correlation_id: Some(3),
                body: Ok(ReplyPayload::Ignored),
            })
            .unwrap();

        let reply = rx.await.unwrap();
        assert_eq!(reply.correlation_id, Some(3));
    }

    #[test]
    fn error_messages() {
        assert_eq!(TransportError::Closed.to_string(), "connection closed");
        assert_eq!(
            TransportError::Encode {
                message: "bad".to_string()
            }
            .to_string(),
            "failed to encode request: bad"
        );
    }
}
