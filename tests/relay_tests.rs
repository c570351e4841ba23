//! Integration tests for the relay server
//!
//! Each test binds a real relay on an ephemeral port and drives it with a
//! raw tokio-tungstenite client, asserting on the wire-level envelopes.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use pulse_sync::protocol::{tags, Envelope, UpdateKind};
use pulse_sync::relay::{create_router, RelayState};

type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// Bind the relay on an ephemeral port and serve it in the background
async fn spawn_relay() -> (SocketAddr, Arc<RelayState>) {
    let state = Arc::new(RelayState::new(64));
    let app = create_router(Arc::clone(&state));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, state)
}

async fn connect(addr: SocketAddr) -> WsClient {
    let url = format!("ws://{}/ws", addr);
    let (ws, _) = connect_async(url).await.unwrap();
    ws
}

/// Read frames until the next text envelope
async fn recv_envelope(ws: &mut WsClient) -> Envelope {
    timeout(RECV_TIMEOUT, async {
        loop {
            match ws.next().await.expect("connection closed").unwrap() {
                Message::Text(text) => {
                    return serde_json::from_str::<Envelope>(&text).unwrap();
                }
                _ => continue,
            }
        }
    })
    .await
    .expect("timed out waiting for envelope")
}

async fn send_envelope(ws: &mut WsClient, envelope: &Envelope) {
    let json = serde_json::to_string(envelope).unwrap();
    ws.send(Message::Text(json)).await.unwrap();
}

#[tokio::test]
async fn test_welcome_on_connect() {
    let (addr, _state) = spawn_relay().await;
    let mut ws = connect(addr).await;

    let welcome = recv_envelope(&mut ws).await;
    assert_eq!(welcome.kind, tags::WELCOME);
    assert!(welcome.data["client_id"].is_u64());
    assert!(welcome.timestamp.is_some());
}

#[tokio::test]
async fn test_ping_answers_pong_with_original_timestamp() {
    let (addr, _state) = spawn_relay().await;
    let mut ws = connect(addr).await;
    recv_envelope(&mut ws).await; // welcome

    let sent_at = 1700000000000i64;
    send_envelope(
        &mut ws,
        &Envelope::new(tags::PING, json!({ "timestamp": sent_at })),
    )
    .await;

    let pong = recv_envelope(&mut ws).await;
    assert_eq!(pong.kind, tags::PONG);
    assert_eq!(pong.data["timestamp"], sent_at);
}

#[tokio::test]
async fn test_subscribe_acks_and_receives_topic_batch() {
    let (addr, state) = spawn_relay().await;
    let mut ws = connect(addr).await;
    recv_envelope(&mut ws).await; // welcome

    send_envelope(
        &mut ws,
        &Envelope::bare(tags::SUBSCRIBE, json!({ "topic": "social_updates" })),
    )
    .await;

    let ack = recv_envelope(&mut ws).await;
    assert_eq!(ack.kind, tags::SUBSCRIBED);
    assert_eq!(ack.data["topic"], "social_updates");

    // Topic-scoped publish reaches the subscriber
    state.publish(
        Some("social_updates".to_string()),
        Envelope::new(
            UpdateKind::SocialUpdates.batch_tag(),
            json!({ "updates": [{"post": "hello"}], "count": 1 }),
        ),
    );

    let batch = recv_envelope(&mut ws).await;
    assert_eq!(batch.kind, "social_update_batch");
    assert_eq!(batch.data["count"], 1);
}

#[tokio::test]
async fn test_unsubscribed_client_skips_topic_messages() {
    let (addr, state) = spawn_relay().await;
    let mut ws = connect(addr).await;
    recv_envelope(&mut ws).await; // welcome

    // Not subscribed to any topic: topic-scoped message must be skipped,
    // the following broadcast must come through
    state.publish(
        Some("keyword_alerts".to_string()),
        Envelope::new("keyword_alert_batch", json!({ "count": 1 })),
    );
    state.publish(None, Envelope::new(tags::HEARTBEAT, json!({ "clients": 1 })));

    let next = recv_envelope(&mut ws).await;
    assert_eq!(next.kind, tags::HEARTBEAT);
}

#[tokio::test]
async fn test_unsubscribe_stops_topic_delivery() {
    let (addr, state) = spawn_relay().await;
    let mut ws = connect(addr).await;
    recv_envelope(&mut ws).await; // welcome

    send_envelope(
        &mut ws,
        &Envelope::bare(tags::SUBSCRIBE, json!({ "topic": "platform_activity" })),
    )
    .await;
    recv_envelope(&mut ws).await; // subscribed ack

    send_envelope(
        &mut ws,
        &Envelope::bare(tags::UNSUBSCRIBE, json!({ "topic": "platform_activity" })),
    )
    .await;
    // Unsubscribe has no ack; ping/pong round-trip proves it was processed
    send_envelope(&mut ws, &Envelope::new(tags::PING, json!({ "timestamp": 1 }))).await;
    let pong = recv_envelope(&mut ws).await;
    assert_eq!(pong.kind, tags::PONG);

    state.publish(
        Some("platform_activity".to_string()),
        Envelope::new("platform_activity_batch", json!({ "count": 2 })),
    );
    state.publish(None, Envelope::new(tags::HEARTBEAT, json!({ "clients": 1 })));

    let next = recv_envelope(&mut ws).await;
    assert_eq!(next.kind, tags::HEARTBEAT);
}

#[tokio::test]
async fn test_unknown_type_is_echoed() {
    let (addr, _state) = spawn_relay().await;
    let mut ws = connect(addr).await;
    recv_envelope(&mut ws).await; // welcome

    send_envelope(
        &mut ws,
        &Envelope::bare("diagnostic_probe", json!({ "n": 7 })),
    )
    .await;

    let echo = recv_envelope(&mut ws).await;
    assert_eq!(echo.kind, tags::ECHO);
    assert_eq!(echo.data["original"]["type"], "diagnostic_probe");
    assert_eq!(echo.data["original"]["data"]["n"], 7);
}

#[tokio::test]
async fn test_malformed_json_is_discarded_without_closing() {
    let (addr, _state) = spawn_relay().await;
    let mut ws = connect(addr).await;
    recv_envelope(&mut ws).await; // welcome

    ws.send(Message::Text("{this is not json".to_string()))
        .await
        .unwrap();

    // Connection survives; a ping still round-trips
    send_envelope(&mut ws, &Envelope::new(tags::PING, json!({ "timestamp": 5 }))).await;
    let pong = recv_envelope(&mut ws).await;
    assert_eq!(pong.kind, tags::PONG);
    assert_eq!(pong.data["timestamp"], 5);
}

#[tokio::test]
async fn test_broadcast_reaches_all_clients() {
    let (addr, state) = spawn_relay().await;
    let mut first = connect(addr).await;
    let mut second = connect(addr).await;
    recv_envelope(&mut first).await;
    recv_envelope(&mut second).await;
    assert_eq!(state.client_count(), 2);

    state.publish(None, Envelope::new(tags::HEARTBEAT, json!({ "clients": 2 })));

    let a = recv_envelope(&mut first).await;
    let b = recv_envelope(&mut second).await;
    assert_eq!(a.kind, tags::HEARTBEAT);
    assert_eq!(b.kind, tags::HEARTBEAT);
}

#[tokio::test]
async fn test_client_count_drops_on_disconnect() {
    let (addr, state) = spawn_relay().await;
    let mut ws = connect(addr).await;
    recv_envelope(&mut ws).await;
    assert_eq!(state.client_count(), 1);

    ws.close(None).await.unwrap();

    // Give the handler a moment to observe the close
    timeout(RECV_TIMEOUT, async {
        while state.client_count() != 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("client count never dropped");
}
