//! One-to-many event broadcast channel.
//!
//! An [`EventChannel`] fans every broadcast item out to all listeners that
//! were registered when the broadcast started. Each listener owns its own
//! bounded queue, so consumers never share buffers and never poll.
//!
//! Delivery is synchronous per listener: `broadcast` only returns once every
//! listener has accepted the item. A slow listener throttles the broadcaster,
//! which keeps ordering identical across listeners. Listeners that were
//! dropped or unregistered are skipped and pruned, never waited on.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tracing::trace;

/// Default per-listener queue depth. One slot makes delivery a hand-off.
pub const DEFAULT_LISTENER_CAPACITY: usize = 1;

/// Listener ids are process-wide so a listener handed to the wrong channel
/// never matches one of its endpoints.
static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(0);

/// Cloneable handle onto a shared set of listeners.
pub struct EventChannel<T> {
    inner: Arc<Inner<T>>,
}

struct Inner<T> {
    /// Registered endpoints. Held only to mutate or snapshot the set.
    endpoints: Mutex<Vec<Endpoint<T>>>,
    /// Serializes deliveries so concurrent broadcasters keep one global order.
    delivery: tokio::sync::Mutex<()>,
    capacity: usize,
}

struct Endpoint<T> {
    id: u64,
    tx: mpsc::Sender<T>,
}

impl<T> Clone for Endpoint<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            tx: self.tx.clone(),
        }
    }
}

impl<T> Clone for EventChannel<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for EventChannel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventChannel")
            .field("listeners", &self.listener_count())
            .field("capacity", &self.inner.capacity)
            .finish()
    }
}

impl<T: Clone + Send + 'static> Default for EventChannel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> EventChannel<T> {
    /// Number of currently registered listeners.
    pub fn listener_count(&self) -> usize {
        self.endpoints().len()
    }

    /// Unregister every listener. Pending items stay readable, after which
    /// each listener's `recv` yields `None`.
    pub fn close(&self) {
        let removed = std::mem::take(&mut *self.endpoints());
        trace!(listeners = removed.len(), "Event channel closed");
    }

    fn endpoints(&self) -> MutexGuard<'_, Vec<Endpoint<T>>> {
        self.inner
            .endpoints
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Clone + Send + 'static> EventChannel<T> {
    /// Create an empty channel with the default listener capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_LISTENER_CAPACITY)
    }

    /// Create an empty channel whose listeners buffer up to `capacity` items.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                endpoints: Mutex::new(Vec::new()),
                delivery: tokio::sync::Mutex::new(()),
                capacity: capacity.max(1),
            }),
        }
    }

    /// Register a new listener. It observes only items broadcast after this
    /// call returns.
    pub fn listen(&self) -> Listener<T> {
        let (tx, rx) = mpsc::channel(self.inner.capacity);
        let id = NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed);
        self.endpoints().push(Endpoint { id, tx });
        trace!(listener_id = id, "Listener registered");
        Listener { id, rx }
    }

    /// Unregister a listener. No broadcast started after this returns will
    /// reach it, and an in-flight broadcast targeting it is released.
    ///
    /// A listener from another channel removes nothing here; dropping it
    /// lets its own channel prune it on the next broadcast.
    pub fn unlisten(&self, listener: Listener<T>) {
        let id = listener.id;
        self.endpoints().retain(|e| e.id != id);
        drop(listener);
        trace!(listener_id = id, "Listener unregistered");
    }

    /// Deliver `item` to every registered listener, waiting until each one
    /// has accepted it. Returns the number of listeners that received it.
    pub async fn broadcast(&self, item: T) -> usize {
        let _delivery = self.inner.delivery.lock().await;
        let snapshot: Vec<Endpoint<T>> = self.endpoints().clone();

        let mut delivered = 0;
        let mut closed = Vec::new();
        for endpoint in &snapshot {
            if endpoint.tx.send(item.clone()).await.is_ok() {
                delivered += 1;
            } else {
                closed.push(endpoint.id);
            }
        }

        if !closed.is_empty() {
            self.endpoints().retain(|e| !closed.contains(&e.id));
            trace!(pruned = closed.len(), "Pruned closed listeners");
        }
        delivered
    }
}

/// Receiving side of one registration on an [`EventChannel`].
pub struct Listener<T> {
    id: u64,
    rx: mpsc::Receiver<T>,
}

impl<T> fmt::Debug for Listener<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener").field("id", &self.id).finish()
    }
}

impl<T> Listener<T> {
    /// Registration id, unique across all channels in the process.
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Wait for the next item. `None` once the channel closed this listener.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Take an already delivered item without waiting.
    pub fn try_recv(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }
}
