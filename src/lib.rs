//! Pulse Sync
//!
//! Realtime synchronization layer for the Media Pulse monitoring
//! dashboard: a WebSocket relay server and a reconnecting client channel
//! speaking a `{type, data, timestamp}` JSON envelope protocol.
//!
//! # Features
//!
//! - **Relay**: axum `/ws` endpoint with topic-scoped fan-out, ping/pong,
//!   echo, heartbeats, and batched domain updates
//! - **Sync channel**: owned client connection with explicit lifecycle,
//!   geometric reconnect backoff, and channel-managed subscription replay
//! - **Best-effort semantics**: no persistence, no acks, no replay of
//!   messages lost across reconnects
//!
//! # Modules
//!
//! - `protocol`: the wire envelope, update kinds, and fan-out messages
//! - `relay`: server relay (router, socket handler, batcher, publisher)
//! - `channel`: client sync channel (state machine, backoff, keepalive)
//! - `config`: relay configuration from the environment
//! - `error`: error types
//!
//! # Example
//!
//! ```no_run
//! use pulse_sync::{ChannelOptions, SyncChannel};
//!
//! # async fn example() -> pulse_sync::Result<()> {
//! let channel = SyncChannel::new("ws://localhost:3000/ws", ChannelOptions::default())?;
//! channel.connect().await?;
//! channel.subscribe("keyword_alerts").await;
//!
//! let mut messages = channel.messages();
//! while let Ok(envelope) = messages.recv().await {
//!     println!("{}: {}", envelope.kind, envelope.data);
//! }
//! # Ok(())
//! # }
//! ```

pub mod channel;
pub mod config;
pub mod error;
pub mod protocol;
pub mod relay;

// Re-export commonly used items at crate root
pub use channel::{Backoff, ChannelOptions, ChannelStatus, SyncChannel};
pub use config::RelayConfig;
pub use error::{Result, SyncError};
pub use protocol::{tags, DomainUpdate, Envelope, RelayMessage, UpdateKind};
pub use relay::{create_router, RelayState, UpdateBatcher};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
