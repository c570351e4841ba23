//! Channel status and mutable session state

use std::collections::HashSet;
use tokio::task::JoinHandle;

/// Connection status surfaced to consumers (status badge, toasts).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelStatus {
    /// No connection and none pending
    Disconnected,
    /// Initial connect in progress
    Connecting,
    /// Socket open; sends will reach the relay
    Connected,
    /// Waiting out a backoff delay before the next attempt
    Reconnecting,
    /// Last connect attempt or transport failed
    Error,
}

impl ChannelStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelStatus::Disconnected => "disconnected",
            ChannelStatus::Connecting => "connecting",
            ChannelStatus::Connected => "connected",
            ChannelStatus::Reconnecting => "reconnecting",
            ChannelStatus::Error => "error",
        }
    }
}

/// Mutable state behind the channel's lock.
///
/// `tasks` holds only per-connection tasks (the read loop); the supervisor
/// and heartbeat tasks are channel-lifetime and deliberately not tracked
/// here, so a manual disconnect leaves them alive for a later `connect()`.
pub(crate) struct ChannelState {
    /// Topics to replay after every reconnect
    pub subscriptions: HashSet<String>,

    /// Whether the current/last disconnect was consumer-initiated
    pub manual: bool,

    tasks: Vec<JoinHandle<()>>,
}

impl ChannelState {
    pub fn new() -> Self {
        Self {
            subscriptions: HashSet::new(),
            manual: false,
            tasks: Vec::new(),
        }
    }

    /// Track a per-connection background task
    pub fn track(&mut self, handle: JoinHandle<()>) {
        // Drop handles of tasks that already finished
        self.tasks.retain(|h| !h.is_finished());
        self.tasks.push(handle);
    }

    /// Abort all tracked tasks
    pub fn abort_all(&mut self) {
        for handle in &self.tasks {
            handle.abort();
        }
        self.tasks.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_strings() {
        assert_eq!(ChannelStatus::Connected.as_str(), "connected");
        assert_eq!(ChannelStatus::Reconnecting.as_str(), "reconnecting");
    }

    #[tokio::test]
    async fn test_abort_all_clears_tasks() {
        let mut state = ChannelState::new();
        state.track(tokio::spawn(async {
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
        }));
        state.abort_all();
        assert!(state.tasks.is_empty());
    }
}
