//! Subscriber handles and the subscription guard

use std::sync::Arc;

use tokio::sync::mpsc;

use super::store::SubscriberRegistry;
use crate::message::Message;

/// Opaque identifier of one live subscriber slot
///
/// Handles are allocated from a counter that never goes backwards, so a
/// handle evicted earlier can never collide with a later subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberHandle(pub(super) u64);

impl SubscriberHandle {
    /// Raw numeric value
    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SubscriberHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A registered subscriber that unregisters itself when dropped
///
/// Holding the guard keeps the slot; dropping it (normal return, error,
/// task abort) removes the slot. Removal is idempotent, so it does not matter
/// whether a broadcast already evicted this subscriber.
pub struct Subscription {
    registry: Arc<SubscriberRegistry>,
    handle: SubscriberHandle,
    rx: mpsc::Receiver<Arc<Message>>,
}

impl Subscription {
    pub(super) fn new(
        registry: Arc<SubscriberRegistry>,
        handle: SubscriberHandle,
        rx: mpsc::Receiver<Arc<Message>>,
    ) -> Self {
        Self {
            registry,
            handle,
            rx,
        }
    }

    /// This subscriber's handle
    pub fn handle(&self) -> SubscriberHandle {
        self.handle
    }

    /// Wait for the next live message
    ///
    /// Returns `None` once the registry dropped this subscriber (eviction or
    /// shutdown) and the buffer is drained.
    pub async fn recv(&mut self) -> Option<Arc<Message>> {
        self.rx.recv().await
    }

    /// Take a buffered message without waiting
    pub fn try_recv(&mut self) -> Option<Arc<Message>> {
        self.rx.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.registry.unregister(self.handle);
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}
