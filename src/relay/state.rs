//! Shared relay state

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tokio::sync::broadcast;

use crate::protocol::{Envelope, RelayMessage};

/// Shared application state for relay connections.
///
/// Fan-out runs over a single broadcast channel; each socket task holds a
/// receiver and filters by its own subscription set. If a client is too
/// slow it misses messages, which is acceptable under the best-effort
/// contract.
pub struct RelayState {
    /// Broadcast channel feeding every connected socket
    tx: broadcast::Sender<RelayMessage>,

    /// Monotonically increasing client id counter
    client_id_counter: AtomicU64,

    /// Currently connected sockets
    client_count: AtomicUsize,
}

impl RelayState {
    /// Create relay state with the given broadcast capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            client_id_counter: AtomicU64::new(0),
            client_count: AtomicUsize::new(0),
        }
    }

    /// Publish an envelope to all clients, or to a topic's subscribers only
    pub fn publish(&self, topic: Option<String>, envelope: Envelope) {
        let msg = RelayMessage { topic, envelope };
        // Ignore send errors - they just mean no receivers are listening
        let _ = self.tx.send(msg);
    }

    /// Subscribe to the fan-out stream
    pub fn subscribe(&self) -> broadcast::Receiver<RelayMessage> {
        self.tx.subscribe()
    }

    /// Allocate the next client id
    pub fn next_client_id(&self) -> u64 {
        self.client_id_counter.fetch_add(1, Ordering::SeqCst)
    }

    /// Record a socket attaching; returns the new live count
    pub fn client_connected(&self) -> usize {
        self.client_count.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Record a socket detaching; returns the remaining live count
    pub fn client_disconnected(&self) -> usize {
        self.client_count.fetch_sub(1, Ordering::SeqCst).saturating_sub(1)
    }

    /// Currently connected socket count
    pub fn client_count(&self) -> usize {
        self.client_count.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::tags;
    use serde_json::json;

    #[tokio::test]
    async fn test_publish_reaches_subscriber() {
        let state = RelayState::new(16);
        let mut rx = state.subscribe();

        state.publish(None, Envelope::new(tags::HEARTBEAT, json!({"clients": 0})));

        let msg = rx.recv().await.unwrap();
        assert!(msg.topic.is_none());
        assert_eq!(msg.envelope.kind, tags::HEARTBEAT);
    }

    #[tokio::test]
    async fn test_topic_scoped_publish_carries_topic() {
        let state = RelayState::new(16);
        let mut rx = state.subscribe();

        state.publish(
            Some("keyword_alerts".to_string()),
            Envelope::new("keyword_alert_batch", json!({"updates": [], "count": 0})),
        );

        let msg = rx.recv().await.unwrap();
        assert_eq!(msg.topic.as_deref(), Some("keyword_alerts"));
    }

    #[test]
    fn test_client_counters() {
        let state = RelayState::new(16);
        assert_eq!(state.next_client_id(), 0);
        assert_eq!(state.next_client_id(), 1);

        assert_eq!(state.client_connected(), 1);
        assert_eq!(state.client_connected(), 2);
        assert_eq!(state.client_disconnected(), 1);
        assert_eq!(state.client_count(), 1);
    }

    #[test]
    fn test_publish_without_receivers_does_not_panic() {
        let state = RelayState::new(16);
        state.publish(None, Envelope::bare(tags::ECHO, json!({})));
    }
}
