//! Update batcher for buffering high-frequency domain events

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::time::interval;

use super::state::RelayState;
use crate::protocol::{DomainUpdate, Envelope, UpdateKind};

/// Collects domain updates per kind and pushes them to topic subscribers
/// in `*_batch` envelopes, on a timer or when a buffer fills up.
pub struct UpdateBatcher {
    /// Pending payloads per update kind
    buffers: HashMap<UpdateKind, Vec<Value>>,

    /// Flush interval
    flush_interval: Duration,

    /// Maximum buffered payloads per kind before a forced flush
    max_batch_size: usize,

    /// Relay state used to publish flushed batches
    state: Arc<RelayState>,
}

impl UpdateBatcher {
    pub fn new(state: Arc<RelayState>, flush_interval: Duration, max_batch_size: usize) -> Self {
        Self {
            buffers: HashMap::new(),
            flush_interval,
            max_batch_size,
            state,
        }
    }

    /// Buffer one update, force-flushing its kind when the buffer is full
    pub fn push(&mut self, update: DomainUpdate) {
        let buffer = self.buffers.entry(update.kind).or_default();
        buffer.push(update.payload);

        if buffer.len() >= self.max_batch_size {
            self.flush_kind(update.kind);
        }
    }

    /// Flush one kind's buffer as a batch envelope to its topic
    pub fn flush_kind(&mut self, kind: UpdateKind) {
        let Some(buffer) = self.buffers.get_mut(&kind) else {
            return;
        };
        if buffer.is_empty() {
            return;
        }

        let updates = std::mem::take(buffer);
        let count = updates.len();
        tracing::debug!(kind = kind.batch_tag(), count, "flushing update batch");

        let envelope = Envelope::new(
            kind.batch_tag(),
            json!({ "updates": updates, "count": count }),
        );
        self.state.publish(Some(kind.topic().to_string()), envelope);
    }

    /// Flush every non-empty buffer
    pub fn flush_all(&mut self) {
        for kind in UpdateKind::ALL {
            self.flush_kind(kind);
        }
    }

    /// Run the batcher as an async task.
    ///
    /// Receives updates from the channel and batches them, flushing on the
    /// timer or when a buffer reaches the max size. A closed channel
    /// flushes whatever remains and exits.
    pub async fn run(mut self, mut rx: mpsc::Receiver<DomainUpdate>) {
        let mut timer = interval(self.flush_interval);

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    self.flush_all();
                }

                update = rx.recv() => {
                    match update {
                        Some(u) => self.push(u),
                        None => {
                            self.flush_all();
                            break;
                        }
                    }
                }
            }
        }
    }
}
