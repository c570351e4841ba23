//! Wire protocol for the realtime sync channel
//!
//! Every message crossing the socket is a JSON text frame wrapping an
//! [`Envelope`]: a free-form `type` tag, an arbitrary `data` payload and an
//! optional millisecond timestamp. There is no schema enforcement beyond the
//! envelope shape and no delivery guarantee: at-most-once, best-effort.

pub mod envelope;
pub mod events;

pub use envelope::{tags, Envelope};
pub use events::{DomainUpdate, RelayMessage, UpdateKind};
