//! WebSocket transport against a local endpoint.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{credential, plan};
use futures_util::{SinkExt, StreamExt};
use multiplier_trader::application::ports::{Subscriber, TransportError, TransportPort};
use multiplier_trader::domain::protocol::{
    PendingRequest, ReplyKind, ReplyPayload, Request, RequestBody,
};
use multiplier_trader::{
    MemorySink, OrderSequencer, RunStatus, SequencerConfig, TransportConfig, WsTransport,
};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::Message;

const TEST_DEADLINE: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Behaviour {
    /// Answer every request, preceded by an unrelated tick.
    Answer,
    /// Drop the connection on the first request.
    Hangup,
}

/// Accept one connection and serve it. Returns the URL to connect to.
async fn spawn_endpoint(behaviour: Behaviour) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

        while let Some(Ok(message)) = ws.next().await {
            let Message::Text(text) = message else {
                continue;
            };
            if behaviour == Behaviour::Hangup {
                let _ = ws.send(Message::Close(None)).await;
                return;
            }
            let request: Value = serde_json::from_str(&text).unwrap();
            let tick = json!({"msg_type": "tick", "tick": {"quote": 512.3}});
            ws.send(Message::Text(tick.to_string().into())).await.unwrap();
            ws.send(Message::Text(answer(&request).to_string().into()))
                .await
                .unwrap();
        }
    });

    format!("ws://{addr}")
}

fn answer(request: &Value) -> Value {
    let req_id = request["req_id"].as_u64().unwrap_or_default();
    if request.get("authorize").is_some() {
        json!({
            "msg_type": "authorize",
            "req_id": req_id,
            "authorize": {"loginid": "CR90000000", "currency": "USD", "balance": 100.5}
        })
    } else if let Some(symbol) = request.get("contracts_for") {
        json!({
            "msg_type": "contracts_for",
            "req_id": req_id,
            "echo_req": {"contracts_for": symbol},
            "contracts_for": {"available": [{"contract_type": "MULTUP"}, {"contract_type": "MULTDOWN"}]}
        })
    } else if request.get("proposal").is_some() {
        json!({
            "msg_type": "proposal",
            "req_id": req_id,
            "proposal": {"id": format!("P{req_id}"), "ask_price": 10.5, "spot": 5012.4}
        })
    } else if request.get("buy").is_some() {
        json!({
            "msg_type": "buy",
            "req_id": req_id,
            "buy": {
                "contract_id": 1000 + req_id,
                "transaction_id": 2000 + req_id,
                "buy_price": request["price"],
                "balance_after": 90.0,
                "purchase_time": 1_700_000_000,
                "longcode": "Win payout when BOOM500 rises."
            }
        })
    } else {
        json!({
            "msg_type": "unknown",
            "req_id": req_id,
            "error": {"code": "UnrecognisedRequest", "message": "Unrecognised request."}
        })
    }
}

fn fast_config(url: String) -> TransportConfig {
    let mut config = TransportConfig::new(url);
    config.backoff.max_attempts = 1;
    config
}

#[tokio::test]
async fn authorize_round_trip() {
    let url = spawn_endpoint(Behaviour::Answer).await;
    let transport = WsTransport::connect(fast_config(url)).await.unwrap();

    let request = Request::new(
        7,
        RequestBody::Authorize {
            credential: credential(),
        },
    );
    let (subscriber, reply_rx) = Subscriber::new(PendingRequest::for_request(&request));
    assert!(transport.subscribe(subscriber).is_none());
    transport.send(request).await.unwrap();

    let reply = tokio::time::timeout(TEST_DEADLINE, reply_rx)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(reply.kind, ReplyKind::Authorize);
    assert_eq!(reply.correlation_id, Some(7));
    let Ok(ReplyPayload::Authorize(account)) = reply.body else {
        panic!("expected authorize payload");
    };
    assert_eq!(account.login_id.as_deref(), Some("CR90000000"));

    let stats = transport.router_stats();
    assert_eq!(stats.delivered, 1);
    assert_eq!(stats.ignored, 1);

    transport.close().await;
}

#[tokio::test]
async fn full_run_over_socket() {
    let url = spawn_endpoint(Behaviour::Answer).await;
    let transport = Arc::new(WsTransport::connect(fast_config(url)).await.unwrap());
    let sink = Arc::new(MemorySink::new());
    let mut sequencer = OrderSequencer::new(
        Arc::clone(&transport),
        Arc::clone(&sink),
        SequencerConfig {
            pacing_delay: Duration::from_millis(10),
            ..SequencerConfig::default()
        },
    );

    let report = tokio::time::timeout(TEST_DEADLINE, sequencer.start(credential(), plan(), 2))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.completed_buy_count, 2);
    assert_eq!(report.purchases.len(), 2);
    assert!(report.purchases.iter().all(|p| p.purchase_time.is_some()));
    assert_eq!(
        sink.messages(),
        vec![
            "Authentication successful.",
            "Buy successful.",
            "Buy successful."
        ]
    );

    let stats = transport.router_stats();
    assert_eq!(stats.delivered, 6);
    assert_eq!(stats.ignored, 6);
    assert_eq!(stats.replaced, 0);

    transport.close().await;
}

#[tokio::test]
async fn server_hangup_aborts_run() {
    let url = spawn_endpoint(Behaviour::Hangup).await;
    let transport = Arc::new(WsTransport::connect(fast_config(url)).await.unwrap());
    let sink = Arc::new(MemorySink::new());
    let mut sequencer = OrderSequencer::new(
        Arc::clone(&transport),
        Arc::clone(&sink),
        SequencerConfig::default(),
    );

    let report = tokio::time::timeout(TEST_DEADLINE, sequencer.start(credential(), plan(), 1))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(report.status, RunStatus::Aborted);
    assert!(!transport.is_open());
    assert!(transport.close_reason().is_some());
    let messages = sink.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].starts_with("Connection closed: "), "{messages:?}");
}

#[tokio::test]
async fn close_is_idempotent() {
    let url = spawn_endpoint(Behaviour::Answer).await;
    let transport = WsTransport::connect(fast_config(url)).await.unwrap();
    assert!(transport.is_open());

    transport.close().await;
    transport.close().await;

    assert!(!transport.is_open());
    assert_eq!(
        transport.close_reason().as_deref(),
        Some("closed by client")
    );
    let request = Request::new(
        1,
        RequestBody::Authorize {
            credential: credential(),
        },
    );
    assert_eq!(transport.send(request).await, Err(TransportError::Closed));
}

#[tokio::test]
async fn answers_server_ping() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    let (pong_tx, pong_rx) = oneshot::channel();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        ws.send(Message::Ping(b"hb".to_vec().into())).await.unwrap();
        while let Some(Ok(message)) = ws.next().await {
            if let Message::Pong(data) = message {
                let _ = pong_tx.send(data.to_vec());
                return;
            }
        }
    });

    let transport = WsTransport::connect(fast_config(url)).await.unwrap();
    let payload = tokio::time::timeout(TEST_DEADLINE, pong_rx)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(payload, b"hb".to_vec());
    transport.close().await;
}
