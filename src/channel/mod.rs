//! Client-side sync channel
//!
//! A [`SyncChannel`] owns one duplex WebSocket connection to the relay:
//! explicit `connect()`/`disconnect()` lifecycle, fire-and-forget sends,
//! keepalive pings with round-trip measurement, and automatic reconnection
//! with geometric backoff on abnormal closure.
//!
//! Topic subscriptions are recorded in the channel and replayed by the
//! channel itself after every reconnect, so consumers subscribe once and
//! stop worrying about connection churn.

pub mod backoff;
pub mod connection;
pub mod core;
pub mod heartbeat;
pub mod options;
pub mod state;

pub use backoff::Backoff;
pub use core::SyncChannel;
pub use options::ChannelOptions;
pub use state::ChannelStatus;
