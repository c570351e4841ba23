//! Write-half ownership for the client socket

use futures::stream::{SplitSink, SplitStream};
use futures::SinkExt;
use tokio::net::TcpStream;
use tokio::sync::RwLock;
use tokio_tungstenite::{
    tungstenite::protocol::frame::coding::CloseCode,
    tungstenite::protocol::CloseFrame,
    tungstenite::Message,
    MaybeTlsStream, WebSocketStream,
};

use crate::protocol::Envelope;

pub(crate) type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
pub(crate) type WsRead = SplitStream<WsStream>;
type WsSink = SplitSink<WsStream, Message>;

/// Owns the WebSocket write half.
///
/// The writer is set after a successful connect and cleared when the read
/// loop observes closure; `send` degrades to a `false` return in between,
/// which is the channel's silent-failure contract.
pub struct ConnectionManager {
    writer: RwLock<Option<WsSink>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            writer: RwLock::new(None),
        }
    }

    /// Install the write sink after a successful connect
    pub async fn set_writer(&self, sink: WsSink) {
        let mut writer = self.writer.write().await;
        *writer = Some(sink);
    }

    /// Drop the write sink (connection observed closed)
    pub async fn clear_writer(&self) {
        let mut writer = self.writer.write().await;
        *writer = None;
    }

    /// Whether a write sink is installed
    pub async fn is_open(&self) -> bool {
        self.writer.read().await.is_some()
    }

    /// Serialize and write an envelope. Returns `false` without network
    /// I/O when no socket is open; write failures also report `false`.
    pub async fn send(&self, envelope: &Envelope) -> bool {
        let json = match serde_json::to_string(envelope) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize envelope");
                return false;
            }
        };

        let mut writer = self.writer.write().await;
        match writer.as_mut() {
            Some(sink) => match sink.send(Message::Text(json)).await {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!(error = %e, "WebSocket send failed");
                    false
                }
            },
            None => false,
        }
    }

    /// Close with a normal-closure frame and drop the writer.
    /// Consumer-initiated closes are never retried by the supervisor.
    pub async fn close(&self) {
        let mut writer = self.writer.write().await;
        if let Some(sink) = writer.as_mut() {
            let frame = CloseFrame {
                code: CloseCode::Normal,
                reason: "client disconnect".into(),
            };
            // The relay may already be gone; a failed handshake is fine
            if let Err(e) = sink.send(Message::Close(Some(frame))).await {
                tracing::debug!(error = %e, "close frame not delivered");
            }
        }
        *writer = None;
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}
