//! The sync channel itself

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use futures::StreamExt;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::{broadcast, mpsc, watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use super::backoff::Backoff;
use super::connection::{ConnectionManager, WsRead};
use super::heartbeat::HeartbeatTask;
use super::options::ChannelOptions;
use super::state::{ChannelState, ChannelStatus};
use crate::error::{Result, SyncError};
use crate::protocol::envelope::now_ms;
use crate::protocol::{tags, Envelope};

/// Notification from a read loop to the reconnect supervisor.
///
/// `epoch` identifies which connection closed; the supervisor discards
/// notifications from connections that have already been replaced.
enum LinkEvent {
    Closed { epoch: u64, normal: bool },
}

/// A reconnecting duplex channel to the Media Pulse relay.
///
/// Create with [`SyncChannel::new`], then call [`connect`](Self::connect).
/// The channel exposes its status through a `watch` stream, incoming
/// envelopes through a broadcast stream, and replays recorded topic
/// subscriptions itself after every reconnect.
///
/// Cloning produces another handle to the same connection. Dropping the
/// last handle aborts the background tasks and closes the socket; the
/// status and message streams end with it.
///
/// Closure handling: close codes 1000/1001 and manual disconnects are
/// final; anything else (including transport errors and connection drops
/// without a close frame) schedules retries at
/// `reconnect_interval * 1.5^(attempt-1)` until the attempt cap, after
/// which the channel stays disconnected until a manual `connect()`.
#[derive(Clone)]
pub struct SyncChannel {
    inner: Arc<ChannelInner>,
}

/// Shared internals behind every handle clone.
///
/// Background tasks hold only `Weak` references to this struct, so the
/// strong count tracks user handles exactly and [`Drop`] fires when the
/// last handle goes away.
struct ChannelInner {
    endpoint: String,
    options: ChannelOptions,

    connection: Arc<ConnectionManager>,
    state: Mutex<ChannelState>,

    /// Identifies the current connection; bumped on every open and on
    /// manual disconnect so stale close notifications are ignored
    epoch: AtomicU64,

    /// Serializes socket opens; a manual `connect()` racing the reconnect
    /// supervisor must never install a second writer
    open_lock: AsyncMutex<()>,

    status_tx: watch::Sender<ChannelStatus>,
    message_tx: broadcast::Sender<Envelope>,
    events_tx: mpsc::UnboundedSender<LinkEvent>,

    last_message: Mutex<Option<Envelope>>,
    ping_time: Mutex<Option<i64>>,

    /// Supervisor and keepalive handles, aborted when the last user
    /// handle drops
    lifetime_tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Drop for ChannelInner {
    fn drop(&mut self) {
        for handle in self.lifetime_tasks.get_mut().drain(..) {
            handle.abort();
        }
        self.state.get_mut().abort_all();
    }
}

impl SyncChannel {
    /// Create a channel for the given `ws://`/`wss://` endpoint.
    ///
    /// Does not connect; spawns the reconnect supervisor and keepalive
    /// tasks, which idle until [`connect`](Self::connect) and are aborted
    /// when the last handle drops.
    pub fn new(endpoint: impl Into<String>, options: ChannelOptions) -> Result<Self> {
        let endpoint = endpoint.into();
        let parsed = Url::parse(&endpoint)?;
        if !matches!(parsed.scheme(), "ws" | "wss") {
            return Err(SyncError::Connection(format!(
                "unsupported scheme '{}', expected ws or wss",
                parsed.scheme()
            )));
        }

        let (status_tx, status_rx) = watch::channel(ChannelStatus::Disconnected);
        let (message_tx, _) = broadcast::channel(options.message_buffer);
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let heartbeat_interval = options.heartbeat_interval;
        let inner = Arc::new(ChannelInner {
            endpoint,
            options,
            connection: Arc::new(ConnectionManager::new()),
            state: Mutex::new(ChannelState::new()),
            epoch: AtomicU64::new(0),
            open_lock: AsyncMutex::new(()),
            status_tx,
            message_tx,
            events_tx,
            last_message: Mutex::new(None),
            ping_time: Mutex::new(None),
            lifetime_tasks: Mutex::new(Vec::new()),
        });

        // Channel-lifetime tasks: reconnect supervisor and keepalive.
        // Both hold only weak references, so they never pin the internals.
        let supervisor = tokio::spawn(ChannelInner::supervise(Arc::downgrade(&inner), events_rx));
        let keepalive = HeartbeatTask::new(
            heartbeat_interval,
            Arc::downgrade(&inner.connection),
            status_rx,
        )
        .spawn();
        inner.lifetime_tasks.lock().extend([supervisor, keepalive]);

        Ok(Self { inner })
    }

    /// Current connection status
    pub fn status(&self) -> ChannelStatus {
        self.inner.status()
    }

    /// Watch status transitions. The stream ends when the last channel
    /// handle drops.
    pub fn watch_status(&self) -> watch::Receiver<ChannelStatus> {
        self.inner.status_tx.subscribe()
    }

    /// Subscribe to every parsed incoming envelope
    pub fn messages(&self) -> broadcast::Receiver<Envelope> {
        self.inner.message_tx.subscribe()
    }

    /// The most recently received envelope, if any
    pub fn last_message(&self) -> Option<Envelope> {
        self.inner.last_message.lock().clone()
    }

    /// Last measured ping round-trip, in milliseconds
    pub fn ping_time_ms(&self) -> Option<i64> {
        *self.inner.ping_time.lock()
    }

    pub fn is_connected(&self) -> bool {
        self.status() == ChannelStatus::Connected
    }

    /// Establish the connection.
    ///
    /// Idempotent while connected or connecting. A failed attempt sets
    /// `Error` status, returns the error, and hands the retry schedule to
    /// the supervisor, so callers that want fire-and-forget semantics can
    /// ignore the result.
    pub async fn connect(&self) -> Result<()> {
        if matches!(
            self.status(),
            ChannelStatus::Connected | ChannelStatus::Connecting
        ) {
            return Ok(());
        }

        self.inner.state.lock().manual = false;
        self.inner.set_status(ChannelStatus::Connecting);
        tracing::info!(endpoint = %self.inner.endpoint, "connecting");

        match ChannelInner::open_socket(&self.inner).await {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::error!(error = %e, "connect failed");
                self.inner.set_status(ChannelStatus::Error);
                // Failed connects retry on the same backoff path as drops
                let _ = self.inner.events_tx.send(LinkEvent::Closed {
                    epoch: self.inner.epoch.load(Ordering::SeqCst),
                    normal: false,
                });
                Err(e)
            }
        }
    }

    /// Close the connection and cancel any pending reconnect.
    pub async fn disconnect(&self) {
        {
            let mut state = self.inner.state.lock();
            state.manual = true;
            state.abort_all();
        }
        // Invalidate in-flight close notifications from the read loop
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);

        self.inner.connection.close().await;
        self.inner.set_status(ChannelStatus::Disconnected);
        tracing::info!("disconnected");
    }

    /// Serialize `{type, data, timestamp}` and write it to the socket.
    ///
    /// Returns `false` with no network I/O unless the channel is
    /// connected; there is no queueing or retry for failed sends.
    pub async fn send(&self, kind: &str, data: Value) -> bool {
        if self.status() != ChannelStatus::Connected {
            tracing::debug!(kind, "cannot send, channel is not connected");
            return false;
        }
        self.inner.connection.send(&Envelope::new(kind, data)).await
    }

    /// Record interest in a topic and tell the relay when connected.
    ///
    /// The topic is replayed automatically after every reconnect. Returns
    /// whether the subscribe frame went out now; `false` still means the
    /// topic is recorded for replay.
    pub async fn subscribe(&self, topic: &str) -> bool {
        self.inner
            .state
            .lock()
            .subscriptions
            .insert(topic.to_string());

        if self.status() == ChannelStatus::Connected {
            self.inner
                .connection
                .send(&Envelope::new(tags::SUBSCRIBE, json!({ "topic": topic })))
                .await
        } else {
            false
        }
    }

    /// Drop interest in a topic.
    pub async fn unsubscribe(&self, topic: &str) -> bool {
        self.inner.state.lock().subscriptions.remove(topic);

        if self.status() == ChannelStatus::Connected {
            self.inner
                .connection
                .send(&Envelope::new(tags::UNSUBSCRIBE, json!({ "topic": topic })))
                .await
        } else {
            false
        }
    }

    /// Topics currently recorded for replay
    pub fn subscriptions(&self) -> Vec<String> {
        self.inner.state.lock().subscriptions.iter().cloned().collect()
    }
}

impl ChannelInner {
    fn status(&self) -> ChannelStatus {
        *self.status_tx.borrow()
    }

    fn set_status(&self, status: ChannelStatus) {
        tracing::debug!(status = status.as_str(), "status change");
        self.status_tx.send_replace(status);
    }

    /// Open the socket, install the writer, spawn the read loop, and
    /// replay recorded subscriptions.
    ///
    /// Serialized behind `open_lock`; a caller that loses the race finds
    /// the writer already installed and returns without opening a second
    /// socket.
    async fn open_socket(inner: &Arc<Self>) -> Result<()> {
        let _guard = inner.open_lock.lock().await;
        if inner.connection.is_open().await {
            return Ok(());
        }

        let (ws, _response) = connect_async(inner.endpoint.as_str()).await?;
        let epoch = inner.epoch.fetch_add(1, Ordering::SeqCst) + 1;

        let (sink, stream) = ws.split();
        inner.connection.set_writer(sink).await;

        let weak = Arc::downgrade(inner);
        inner
            .state
            .lock()
            .track(tokio::spawn(Self::read_loop(weak, stream, epoch)));

        inner.set_status(ChannelStatus::Connected);
        tracing::info!("connected");

        inner.replay_subscriptions().await;
        Ok(())
    }

    /// Re-send the recorded subscription set; the relay holds none of it
    /// across connections.
    async fn replay_subscriptions(&self) {
        let topics: Vec<String> = self.state.lock().subscriptions.iter().cloned().collect();
        for topic in topics {
            let sent = self
                .connection
                .send(&Envelope::new(tags::SUBSCRIBE, json!({ "topic": &topic })))
                .await;
            if sent {
                tracing::debug!(topic = %topic, "replayed subscription");
            } else {
                tracing::warn!(topic = %topic, "failed to replay subscription");
            }
        }
    }

    /// Consume incoming frames until the connection closes, then notify
    /// the supervisor whether the closure was normal.
    ///
    /// Holds only a weak reference while parked on the stream, so an idle
    /// connection never keeps a dropped channel alive.
    async fn read_loop(inner: Weak<Self>, mut stream: WsRead, epoch: u64) {
        let mut close_normal: Option<bool> = None;

        while let Some(result) = stream.next().await {
            let Some(chan) = inner.upgrade() else {
                return; // channel dropped
            };
            match result {
                Ok(Message::Text(text)) => match serde_json::from_str::<Envelope>(&text) {
                    Ok(envelope) => chan.handle_incoming(envelope),
                    Err(e) => {
                        // Malformed frames are logged and discarded
                        tracing::warn!(error = %e, "discarding malformed frame");
                    }
                },
                Ok(Message::Close(frame)) => {
                    let normal = frame
                        .map(|f| {
                            let code = u16::from(f.code);
                            tracing::info!(code, reason = %f.reason, "relay closed connection");
                            code == 1000 || code == 1001
                        })
                        .unwrap_or(false);
                    close_normal = Some(normal);
                    break;
                }
                Ok(_) => {} // transport ping/pong/binary frames
                Err(e) => {
                    tracing::error!(error = %e, "WebSocket read error");
                    close_normal = Some(false);
                    break;
                }
            }
        }

        let Some(chan) = inner.upgrade() else {
            return;
        };
        // A stream that ends without a close frame is an abnormal drop
        let normal = close_normal.unwrap_or(false);
        chan.connection.clear_writer().await;
        if chan.epoch.load(Ordering::SeqCst) == epoch {
            // Still the current connection: surface the drop before the
            // supervisor decides whether to retry
            chan.set_status(ChannelStatus::Disconnected);
        }
        let _ = chan.events_tx.send(LinkEvent::Closed { epoch, normal });
    }

    /// Dispatch one parsed envelope: latency bookkeeping for `pong`, then
    /// fan out to consumers.
    fn handle_incoming(&self, envelope: Envelope) {
        if envelope.is(tags::PONG) {
            if let Some(sent) = envelope.data.get("timestamp").and_then(Value::as_i64) {
                let rtt = (now_ms() - sent).max(0);
                *self.ping_time.lock() = Some(rtt);
                tracing::debug!(rtt_ms = rtt, "pong received");
            }
        }

        *self.last_message.lock() = Some(envelope.clone());
        // Ignore send errors - they just mean no consumers are listening
        let _ = self.message_tx.send(envelope);
    }

    /// Reconnect supervisor: reacts to close notifications from read
    /// loops and owns the single backoff timer.
    ///
    /// Upgrades its weak reference per event and exits when the channel
    /// is gone.
    async fn supervise(inner: Weak<Self>, mut events: mpsc::UnboundedReceiver<LinkEvent>) {
        while let Some(LinkEvent::Closed { epoch, normal }) = events.recv().await {
            let Some(chan) = inner.upgrade() else {
                break; // channel dropped
            };
            if epoch != chan.epoch.load(Ordering::SeqCst) {
                continue; // a replaced connection; nothing to do
            }

            let manual = chan.state.lock().manual;
            if manual || normal {
                chan.set_status(ChannelStatus::Disconnected);
                continue;
            }

            Self::run_reconnect_loop(&chan).await;
        }
        tracing::debug!("reconnect supervisor finished");
    }

    /// One disconnect episode: geometric delays until reconnected, the
    /// attempt cap is hit, or a manual disconnect intervenes.
    async fn run_reconnect_loop(inner: &Arc<Self>) {
        let mut backoff = Backoff::new(
            inner.options.reconnect_interval,
            inner.options.max_reconnect_attempts,
        );

        loop {
            let Some(delay) = backoff.next_delay() else {
                tracing::warn!(
                    attempts = backoff.attempts(),
                    "max reconnect attempts reached, giving up"
                );
                inner.set_status(ChannelStatus::Disconnected);
                break;
            };

            inner.set_status(ChannelStatus::Reconnecting);
            tracing::info!(
                attempt = backoff.attempts(),
                delay_ms = delay.as_millis() as u64,
                "scheduling reconnect"
            );
            tokio::time::sleep(delay).await;

            if inner.state.lock().manual {
                // disconnect() raced the retry timer; stop cleanly
                inner.set_status(ChannelStatus::Disconnected);
                break;
            }
            // Probe the writer, not the status flag: a connection that
            // died right after opening can leave a stale Connected status
            if inner.connection.is_open().await {
                break; // a manual connect() won the race
            }

            match Self::open_socket(inner).await {
                Ok(()) => {
                    tracing::info!(attempt = backoff.attempts(), "reconnected");
                    break;
                }
                Err(e) => {
                    tracing::error!(error = %e, "reconnect attempt failed");
                    inner.set_status(ChannelStatus::Error);
                }
            }
        }
    }
}
