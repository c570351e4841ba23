//! WebSocket relay server
//!
//! Serves the `/ws` endpoint the dashboard clients attach to: accepts
//! connections, answers `ping` with `pong`, tracks per-session topic
//! subscriptions, echoes anything unrecognized, and fans out buffered
//! domain updates and heartbeats from a shared broadcast channel.
//!
//! The relay holds no durable state: subscriptions die with the socket and
//! messages a client misses are gone.

pub mod batcher;
pub mod handler;
pub mod heartbeat;
pub mod http;
pub mod publisher;
pub mod state;

pub use batcher::UpdateBatcher;
pub use http::create_router;
pub use publisher::{init_publisher, publish_update, helpers as publish};
pub use state::RelayState;
