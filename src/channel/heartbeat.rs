//! Keepalive ping task

use std::sync::Weak;
use std::time::Duration;
use serde_json::json;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use super::connection::ConnectionManager;
use super::state::ChannelStatus;
use crate::protocol::envelope::now_ms;
use crate::protocol::{tags, Envelope};

/// Sends a `ping` envelope at a fixed period while the channel is
/// connected. The relay's `pong` carries the timestamp back so the read
/// loop can measure round-trip latency; a missing pong is never acted on.
pub(crate) struct HeartbeatTask {
    interval: Duration,
    connection: Weak<ConnectionManager>,
    status: watch::Receiver<ChannelStatus>,
}

impl HeartbeatTask {
    pub fn new(
        interval: Duration,
        connection: Weak<ConnectionManager>,
        status: watch::Receiver<ChannelStatus>,
    ) -> Self {
        Self {
            interval,
            connection,
            status,
        }
    }

    /// Spawn the keepalive loop; it exits when the channel is dropped.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut timer = time::interval(self.interval);
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
            timer.tick().await; // immediate first tick

            loop {
                timer.tick().await;

                let Some(connection) = self.connection.upgrade() else {
                    break; // channel dropped
                };

                if *self.status.borrow() != ChannelStatus::Connected {
                    continue;
                }

                let ping = Envelope::new(tags::PING, json!({ "timestamp": now_ms() }));
                if connection.send(&ping).await {
                    tracing::debug!("sent keepalive ping");
                }
            }
        })
    }
}
