//! Error types for the sync channel and relay

use thiserror::Error;

/// Errors surfaced by the realtime sync layer.
#[derive(Error, Debug)]
pub enum SyncError {
    /// WebSocket transport error (handshake failed, invalid frame, etc.)
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Malformed endpoint URL
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// General connection error with descriptive message
    #[error("Connection error: {0}")]
    Connection(String),

    /// Attempted operation while not connected to the server
    #[error("Not connected")]
    NotConnected,

    /// I/O error (socket bind, listener)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias for `Result<T, SyncError>`.
pub type Result<T> = std::result::Result<T, SyncError>;
