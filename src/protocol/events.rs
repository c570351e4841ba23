//! Domain update kinds and relay fan-out messages

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::envelope::Envelope;

/// The categories of buffered domain updates the relay pushes to
/// subscribed clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateKind {
    SocialUpdates,
    SentimentUpdates,
    KeywordAlerts,
    PlatformActivity,
}

impl UpdateKind {
    /// All kinds, in flush order
    pub const ALL: [UpdateKind; 4] = [
        UpdateKind::SocialUpdates,
        UpdateKind::SentimentUpdates,
        UpdateKind::KeywordAlerts,
        UpdateKind::PlatformActivity,
    ];

    /// Topic name a client subscribes to for this kind
    pub fn topic(&self) -> &'static str {
        match self {
            UpdateKind::SocialUpdates => "social_updates",
            UpdateKind::SentimentUpdates => "sentiment_updates",
            UpdateKind::KeywordAlerts => "keyword_alerts",
            UpdateKind::PlatformActivity => "platform_activity",
        }
    }

    /// Envelope tag used for a flushed batch of this kind
    pub fn batch_tag(&self) -> &'static str {
        match self {
            UpdateKind::SocialUpdates => "social_update_batch",
            UpdateKind::SentimentUpdates => "sentiment_update_batch",
            UpdateKind::KeywordAlerts => "keyword_alert_batch",
            UpdateKind::PlatformActivity => "platform_activity_batch",
        }
    }
}

/// A single domain event pushed into the batcher by a producing service
#[derive(Debug, Clone)]
pub struct DomainUpdate {
    pub kind: UpdateKind,
    pub payload: Value,
}

impl DomainUpdate {
    pub fn new(kind: UpdateKind, payload: Value) -> Self {
        Self { kind, payload }
    }
}

/// A message fanned out to connected sockets.
///
/// `topic == None` reaches every client; `Some(t)` only sockets whose
/// session subscription set contains `t`.
#[derive(Debug, Clone)]
pub struct RelayMessage {
    pub topic: Option<String>,
    pub envelope: Envelope,
}

impl RelayMessage {
    /// Message for every connected client
    pub fn broadcast(envelope: Envelope) -> Self {
        Self {
            topic: None,
            envelope,
        }
    }

    /// Message for subscribers of a topic only
    pub fn to_topic(topic: impl Into<String>, envelope: Envelope) -> Self {
        Self {
            topic: Some(topic.into()),
            envelope,
        }
    }
}
