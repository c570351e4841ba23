//! Channel configuration

use std::time::Duration;

/// Tunables for a [`SyncChannel`](super::SyncChannel).
///
/// Defaults mirror the dashboard's production settings: retry after 3s
/// growing by 1.5x, give up after 5 attempts, ping every 30s.
#[derive(Debug, Clone)]
pub struct ChannelOptions {
    /// Base delay before the first reconnect attempt
    pub reconnect_interval: Duration,

    /// Reconnect attempts before the channel stays disconnected
    pub max_reconnect_attempts: u32,

    /// Keepalive ping period while connected
    pub heartbeat_interval: Duration,

    /// Capacity of the incoming-message broadcast buffer
    pub message_buffer: usize,
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self {
            reconnect_interval: Duration::from_millis(3000),
            max_reconnect_attempts: 5,
            heartbeat_interval: Duration::from_secs(30),
            message_buffer: 256,
        }
    }
}

impl ChannelOptions {
    pub fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_dashboard_settings() {
        let options = ChannelOptions::default();
        assert_eq!(options.reconnect_interval, Duration::from_millis(3000));
        assert_eq!(options.max_reconnect_attempts, 5);
        assert_eq!(options.heartbeat_interval, Duration::from_secs(30));
    }

    #[test]
    fn test_builder_overrides() {
        let options = ChannelOptions::default()
            .with_reconnect_interval(Duration::from_millis(100))
            .with_max_reconnect_attempts(2);
        assert_eq!(options.reconnect_interval, Duration::from_millis(100));
        assert_eq!(options.max_reconnect_attempts, 2);
    }
}
