//! Change notifications for record collections.
//!
//! Subscribers hear about a collection change through one of two paths: the
//! storage context's local listeners (writes made through this context) or the
//! backend's cross-context signal (writes made elsewhere). [`ChangeBus`] hides
//! the split; a subscription covers both.

use std::sync::{Arc, Weak};

use crate::storage::{ChangeCallback, ExternalWatch, LocalListeners, StorageBackend};

/// Publish/subscribe surface for collection changes.
///
/// Buses built on handles of the same storage context share their subscribers.
#[derive(Clone)]
pub struct ChangeBus {
    backend: Arc<dyn StorageBackend>,
    listeners: Arc<LocalListeners>,
}

impl ChangeBus {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        let listeners = backend.local_listeners();
        Self { backend, listeners }
    }

    /// Notify same-context subscribers that `collection` changed.
    ///
    /// Other contexts learn about the write from the storage backend itself.
    pub fn publish(&self, collection: &str) {
        let callbacks = self.listeners.callbacks(collection);
        tracing::trace!(
            "Publishing change for '{}' to {} subscriber(s)",
            collection,
            callbacks.len()
        );
        for callback in callbacks {
            callback();
        }
    }

    /// Call `callback` whenever `collection` changes, in this context or another.
    pub fn subscribe(
        &self,
        collection: &str,
        callback: impl Fn() + Send + Sync + 'static,
    ) -> Subscription {
        let callback: ChangeCallback = Arc::new(callback);
        let id = self.listeners.add(collection, Arc::clone(&callback));
        let external = self.backend.on_external_change(collection, callback);

        Subscription {
            local: Some(LocalRegistration {
                listeners: Arc::downgrade(&self.listeners),
                collection: collection.to_string(),
                id,
            }),
            external: Some(external),
        }
    }

    /// Number of same-context subscribers for `collection`.
    pub fn subscriber_count(&self, collection: &str) -> usize {
        self.listeners.count(collection)
    }
}

struct LocalRegistration {
    listeners: Weak<LocalListeners>,
    collection: String,
    id: u64,
}

/// Handle for one subscription. Unsubscribes when dropped.
#[must_use = "dropping a Subscription unsubscribes it"]
pub struct Subscription {
    local: Option<LocalRegistration>,
    external: Option<ExternalWatch>,
}

impl Subscription {
    /// Remove this registration; other subscriptions are untouched.
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(local) = self.local.take() {
            if let Some(listeners) = local.listeners.upgrade() {
                listeners.remove(&local.collection, local.id);
            }
        }
        if let Some(external) = self.external.take() {
            external.cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field(
                "collection",
                &self.local.as_ref().map(|local| local.collection.as_str()),
            )
            .finish_non_exhaustive()
    }
}
