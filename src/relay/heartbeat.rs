//! Periodic heartbeat broadcast

use std::sync::Arc;
use std::time::Duration;
use serde_json::json;
use tokio::time::interval;

use super::state::RelayState;
use crate::protocol::{tags, Envelope};

/// Broadcast a `heartbeat` envelope to every client on a fixed interval.
/// Runs until the relay state is dropped by the caller aborting the task.
pub async fn run(state: Arc<RelayState>, period: Duration) {
    let mut timer = interval(period);
    // The first tick fires immediately; skip it so clients settle in
    timer.tick().await;

    loop {
        timer.tick().await;
        let clients = state.client_count();
        tracing::debug!(clients, "broadcasting heartbeat");
        state.publish(
            None,
            Envelope::new(tags::HEARTBEAT, json!({ "clients": clients })),
        );
    }
}
