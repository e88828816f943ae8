//! Reload notification hub for Server-Sent Events subscribers.
//!
//! Each subscriber is a bounded channel drained by the connection task that
//! owns the socket. A send that fails means that task is gone (its peer
//! disconnected or a socket write failed), so the subscriber is dropped on
//! the spot.

use crate::dev::shutdown::Shutdown;
use crate::dev::state::SharedState;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::mpsc::{self, error::TrySendError};

/// The only message pushed to browsers.
pub const RELOAD_MESSAGE: &str = "reload";

/// SSE comment frame used to probe idle subscribers. Browsers ignore it.
pub const PROBE_FRAME: &[u8] = b":\n\n";

/// Frames buffered per subscriber before further frames are dropped.
const DEFAULT_SUBSCRIBER_BUFFER: usize = 16;

/// Identifier assigned to each subscriber.
pub type SubscriberId = u64;

/// Format a message as a single SSE `data:` frame.
pub fn event_frame(message: &str) -> Bytes {
    Bytes::from(format!("data: {}\n\n", message))
}

/// Receiving side handed to a subscribed connection.
#[derive(Debug)]
pub struct Subscription {
    /// Registry key, used to unsubscribe explicitly
    pub id: SubscriberId,
    /// Frames to be written to the socket, in order
    pub frames: mpsc::Receiver<Bytes>,
}

#[derive(Debug, Default)]
struct HubInner {
    subscribers: HashMap<SubscriberId, mpsc::Sender<Bytes>>,
    next_id: SubscriberId,
}

/// Registry of live reload subscribers.
#[derive(Debug)]
pub struct ReloadHub {
    inner: Mutex<HubInner>,
    buffer: usize,
}

impl ReloadHub {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self::with_buffer(DEFAULT_SUBSCRIBER_BUFFER)
    }

    /// Create an empty hub with a custom per-subscriber buffer.
    pub fn with_buffer(buffer: usize) -> Self {
        Self {
            inner: Mutex::new(HubInner::default()),
            buffer: buffer.max(1),
        }
    }

    /// Register a new subscriber.
    ///
    /// The caller must have finished the SSE handshake before subscribing,
    /// so every frame delivered afterwards lands after the headers.
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::channel(self.buffer);

        let mut inner = self.inner.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.subscribers.insert(id, tx);

        tracing::debug!(
            "Subscriber {} registered ({} active)",
            id,
            inner.subscribers.len()
        );

        Subscription { id, frames: rx }
    }

    /// Remove a subscriber. Returns whether it was registered.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let removed = self.inner.lock().subscribers.remove(&id).is_some();
        if removed {
            tracing::debug!("Subscriber {} unregistered", id);
        }
        removed
    }

    /// Send `message` to every subscriber.
    ///
    /// The frame is built once and shared. Subscribers whose endpoint has
    /// closed are removed. A subscriber with a full buffer keeps its
    /// registration: it already has undelivered frames queued, which is
    /// enough to trigger its reload.
    ///
    /// Returns the number of subscribers that accepted the frame.
    pub fn broadcast(&self, message: &str) -> usize {
        let frame = event_frame(message);
        let mut delivered = 0;

        let mut inner = self.inner.lock();
        inner.subscribers.retain(|id, tx| match tx.try_send(frame.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                tracing::trace!("Subscriber {} is backed up, skipping frame", id);
                true
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!("Subscriber {} disconnected, removing", id);
                false
            }
        });

        tracing::debug!(
            "Broadcast '{}' to {} of {} subscribers",
            message,
            delivered,
            inner.subscribers.len()
        );

        delivered
    }

    /// Probe every subscriber and drop those whose endpoint is gone.
    ///
    /// The probe frame makes each connection task touch its socket, so
    /// half-open peers surface as a closed endpoint by the next sweep at the
    /// latest. Returns the number of subscribers removed.
    pub fn sweep(&self) -> usize {
        let probe = Bytes::from_static(PROBE_FRAME);

        let mut inner = self.inner.lock();
        let before = inner.subscribers.len();
        inner
            .subscribers
            .retain(|_, tx| !matches!(tx.try_send(probe.clone()), Err(TrySendError::Closed(_))));
        let removed = before - inner.subscribers.len();

        if removed > 0 {
            tracing::debug!("Sweep removed {} dead subscribers", removed);
        }

        removed
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().subscribers.len()
    }
}

impl Default for ReloadHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Sweep the hub on the configured period until shutdown.
pub async fn run_sweep_loop(state: SharedState, mut shutdown: Shutdown) {
    let period = state.config().sweep_interval();

    while !shutdown.sleep(period).await {
        let removed = state.hub().sweep();
        if removed > 0 {
            tracing::info!(
                "Dropped {} stale live-reload client(s), {} remaining",
                removed,
                state.hub().subscriber_count()
            );
        }
    }

    tracing::debug!("Sweep loop stopped");
}
