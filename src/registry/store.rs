//! Subscriber registry implementation
//!
//! The central registry that tracks every live subscriber and fans persisted
//! messages out to them.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, error::TrySendError};

use super::config::RegistryConfig;
use super::handle::{SubscriberHandle, Subscription};
use crate::message::Message;

/// Outcome of one broadcast pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Subscribers that accepted the message
    pub delivered: usize,
    /// Subscribers removed because their buffer was full or their receiver gone
    pub evicted: usize,
}

/// Snapshot of registry counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    /// Currently registered subscribers
    pub subscribers: usize,
    /// Subscribers ever registered
    pub total_registered: u64,
    /// Broadcast passes
    pub broadcasts: u64,
    /// Individual deliveries across all broadcasts
    pub deliveries: u64,
    /// Subscribers evicted by broadcast
    pub evictions: u64,
}

struct Inner {
    next_handle: u64,
    subscribers: HashMap<SubscriberHandle, mpsc::Sender<Arc<Message>>>,
    closed: bool,
    total_registered: u64,
    broadcasts: u64,
    deliveries: u64,
    evictions: u64,
}

/// Registry of live subscribers
///
/// The map and the handle counter sit behind a single mutex, so register,
/// unregister and broadcast each see a consistent view. The lock is never
/// held across an `.await`: delivery uses `try_send`, which cannot block.
pub struct SubscriberRegistry {
    inner: Mutex<Inner>,
    config: RegistryConfig,
}

impl SubscriberRegistry {
    /// Create a registry with default configuration
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a registry with custom configuration
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            inner: Mutex::new(Inner {
                next_handle: 1,
                subscribers: HashMap::new(),
                closed: false,
                total_registered: 0,
                broadcasts: 0,
                deliveries: 0,
                evictions: 0,
            }),
            config,
        }
    }

    /// Register a new subscriber
    ///
    /// Returns its handle and the receiving end of its outbound channel. The
    /// caller is responsible for calling [`unregister`](Self::unregister);
    /// prefer [`subscribe`](Self::subscribe), which does it on drop.
    ///
    /// After [`close_all`](Self::close_all) the handle is still allocated but
    /// nothing is stored, so the receiver reports end-of-stream immediately.
    pub fn register(&self) -> (SubscriberHandle, mpsc::Receiver<Arc<Message>>) {
        let (tx, rx) = mpsc::channel(self.config.channel_capacity.max(1));
        let mut inner = self.inner.lock();

        let handle = SubscriberHandle(inner.next_handle);
        inner.next_handle += 1;

        if inner.closed {
            tracing::debug!(handle = %handle, "Registry closed, subscriber not added");
            return (handle, rx);
        }

        inner.subscribers.insert(handle, tx);
        inner.total_registered += 1;

        tracing::info!(
            handle = %handle,
            subscribers = inner.subscribers.len(),
            "Subscriber added"
        );

        (handle, rx)
    }

    /// Register and wrap the receiver in a guard that unregisters on drop
    pub fn subscribe(self: &Arc<Self>) -> Subscription {
        let (handle, rx) = self.register();
        Subscription::new(Arc::clone(self), handle, rx)
    }

    /// Remove a subscriber
    ///
    /// Idempotent: removing an unknown or already-evicted handle does nothing.
    /// Returns whether an entry was removed.
    pub fn unregister(&self, handle: SubscriberHandle) -> bool {
        let mut inner = self.inner.lock();
        let removed = inner.subscribers.remove(&handle).is_some();

        if removed {
            tracing::debug!(
                handle = %handle,
                subscribers = inner.subscribers.len(),
                "Subscriber removed"
            );
        }

        removed
    }

    /// Hand a message to every registered subscriber
    ///
    /// Delivery never waits: a subscriber whose buffer is full, or whose
    /// receiver has been dropped, is evicted in the same pass and receives
    /// nothing further.
    pub fn broadcast(&self, message: Arc<Message>) -> BroadcastReport {
        let mut inner = self.inner.lock();
        let mut report = BroadcastReport::default();

        inner.subscribers.retain(|handle, tx| match tx.try_send(Arc::clone(&message)) {
            Ok(()) => {
                report.delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                tracing::warn!(handle = %handle, message_id = message.id, "Subscriber buffer full, evicting");
                report.evicted += 1;
                false
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(handle = %handle, "Subscriber receiver gone, evicting");
                report.evicted += 1;
                false
            }
        });

        inner.broadcasts += 1;
        inner.deliveries += report.delivered as u64;
        inner.evictions += report.evicted as u64;

        report
    }

    /// Drop every subscriber and refuse new ones (server shutdown)
    ///
    /// Each receiver yields what is already buffered, then `None`.
    pub fn close_all(&self) {
        let mut inner = self.inner.lock();
        inner.closed = true;
        let dropped = inner.subscribers.len();
        inner.subscribers.clear();

        tracing::info!(subscribers = dropped, "Registry closed");
    }

    /// Whether `handle` is currently registered
    pub fn contains(&self, handle: SubscriberHandle) -> bool {
        self.inner.lock().subscribers.contains_key(&handle)
    }

    /// Number of registered subscribers
    pub fn len(&self) -> usize {
        self.inner.lock().subscribers.len()
    }

    /// Whether no subscriber is registered
    pub fn is_empty(&self) -> bool {
        self.inner.lock().subscribers.is_empty()
    }

    /// Counter snapshot
    pub fn stats(&self) -> RegistryStats {
        let inner = self.inner.lock();
        RegistryStats {
            subscribers: inner.subscribers.len(),
            total_registered: inner.total_registered,
            broadcasts: inner.broadcasts,
            deliveries: inner.deliveries,
            evictions: inner.evictions,
        }
    }
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new()
    }
}
