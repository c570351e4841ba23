//! WebSocket connection handler

use std::collections::HashSet;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use serde_json::json;
use tokio::sync::broadcast;

use super::state::RelayState;
use crate::protocol::{tags, Envelope};

/// WebSocket upgrade handler for `GET /ws`
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<RelayState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle an individual WebSocket connection
async fn handle_socket(mut socket: WebSocket, state: Arc<RelayState>) {
    let client_id = state.next_client_id();
    let total = state.client_connected();
    tracing::info!(client_id, total, "WebSocket client connected");

    let mut rx = state.subscribe();

    // Topic interest lives only for this socket session
    let mut topics: HashSet<String> = HashSet::new();

    let welcome = Envelope::new(
        tags::WELCOME,
        json!({
            "client_id": client_id,
            "message": "Connected to Media Pulse realtime relay",
        }),
    );
    if send_envelope(&mut socket, &welcome).await.is_err() {
        state.client_disconnected();
        return; // Client disconnected immediately
    }

    loop {
        tokio::select! {
            // Fan-out from the broadcast channel
            result = rx.recv() => {
                match result {
                    Ok(msg) => {
                        let interested = match &msg.topic {
                            None => true,
                            Some(topic) => topics.contains(topic),
                        };
                        if interested && send_envelope(&mut socket, &msg.envelope).await.is_err() {
                            break; // Client disconnected
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        // Slow client; dropped messages are not replayed
                        tracing::warn!(client_id, missed = n, "client lagged behind broadcast");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }

            // Inbound frames from the client
            result = socket.recv() => {
                match result {
                    Some(Ok(msg)) => {
                        if !handle_client_message(msg, &mut socket, &mut topics, client_id).await {
                            break; // Client requested close or error
                        }
                    }
                    Some(Err(_)) => break, // WebSocket error
                    None => break, // Client disconnected
                }
            }
        }
    }

    let remaining = state.client_disconnected();
    tracing::info!(client_id, remaining, "WebSocket client disconnected");
}

async fn send_envelope(socket: &mut WebSocket, envelope: &Envelope) -> Result<(), axum::Error> {
    let json = serde_json::to_string(envelope)
        .map_err(|e| axum::Error::new(e))?;
    socket.send(Message::Text(json)).await
}

/// Handle a message from the client.
/// Returns false if the connection should be closed.
async fn handle_client_message(
    msg: Message,
    socket: &mut WebSocket,
    topics: &mut HashSet<String>,
    client_id: u64,
) -> bool {
    match msg {
        Message::Text(text) => {
            let envelope = match serde_json::from_str::<Envelope>(&text) {
                Ok(env) => env,
                Err(e) => {
                    // Malformed frames are logged and discarded, never fatal
                    tracing::warn!(client_id, error = %e, "discarding malformed message");
                    return true;
                }
            };

            match envelope.kind.as_str() {
                tags::PING => {
                    // Reply carries back the original timestamp so the
                    // client can measure round-trip latency
                    let original = envelope
                        .data
                        .get("timestamp")
                        .cloned()
                        .unwrap_or(serde_json::Value::Null);
                    let pong = Envelope::new(tags::PONG, json!({ "timestamp": original }));
                    let _ = send_envelope(socket, &pong).await;
                }
                tags::SUBSCRIBE => {
                    if let Some(topic) = envelope.data.get("topic").and_then(|t| t.as_str()) {
                        tracing::debug!(client_id, topic, "client subscribed");
                        topics.insert(topic.to_string());
                        let ack = Envelope::new(tags::SUBSCRIBED, json!({ "topic": topic }));
                        let _ = send_envelope(socket, &ack).await;
                    }
                }
                tags::UNSUBSCRIBE => {
                    if let Some(topic) = envelope.data.get("topic").and_then(|t| t.as_str()) {
                        tracing::debug!(client_id, topic, "client unsubscribed");
                        topics.remove(topic);
                    }
                }
                other => {
                    // Anything else is echoed back with a fresh timestamp
                    tracing::debug!(client_id, kind = other, "echoing message");
                    let echo = Envelope::new(
                        tags::ECHO,
                        json!({ "original": envelope }),
                    );
                    let _ = send_envelope(socket, &echo).await;
                }
            }
            true
        }
        Message::Binary(_) => true, // Ignore binary frames
        Message::Ping(data) => {
            let _ = socket.send(Message::Pong(data)).await;
            true
        }
        Message::Pong(_) => true,
        Message::Close(_) => false, // Client requested close
    }
}
