//! Global update publisher
//!
//! Producing services (poll ingesters, sentiment jobs, keyword scanners)
//! publish domain updates without threading a handle through every call
//! site. The publisher is wired to the batcher's ingest channel once when
//! the relay starts; before that, publishes are silently dropped.

use std::sync::OnceLock;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::protocol::{DomainUpdate, UpdateKind};

/// Global ingest sender (initialized once when the relay starts)
static PUBLISHER: OnceLock<mpsc::Sender<DomainUpdate>> = OnceLock::new();

/// Wire the global publisher to the batcher's ingest channel.
///
/// Returns false if the publisher was already initialized.
pub fn init_publisher(tx: mpsc::Sender<DomainUpdate>) -> bool {
    PUBLISHER.set(tx).is_ok()
}

/// Publish a domain update if the publisher is initialized.
///
/// Best-effort: drops the update when uninitialized or when the batcher's
/// ingest buffer is full.
pub fn publish_update(kind: UpdateKind, payload: Value) {
    let Some(tx) = PUBLISHER.get() else {
        tracing::debug!(kind = kind.batch_tag(), "publisher not initialized, dropping update");
        return;
    };
    if let Err(e) = tx.try_send(DomainUpdate::new(kind, payload)) {
        tracing::warn!(kind = kind.batch_tag(), error = %e, "dropping domain update");
    }
}

/// Helper functions for common update kinds
pub mod helpers {
    use super::*;

    /// Publish a social post update
    pub fn social_update(payload: Value) {
        publish_update(UpdateKind::SocialUpdates, payload);
    }

    /// Publish a sentiment report update
    pub fn sentiment_update(payload: Value) {
        publish_update(UpdateKind::SentimentUpdates, payload);
    }

    /// Publish a keyword alert
    pub fn keyword_alert(payload: Value) {
        publish_update(UpdateKind::KeywordAlerts, payload);
    }

    /// Publish a platform activity sample
    pub fn platform_activity(payload: Value) {
        publish_update(UpdateKind::PlatformActivity, payload);
    }
}
