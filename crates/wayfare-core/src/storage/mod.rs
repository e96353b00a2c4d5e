//! Durable storage backends for record collections.
//!
//! A backend is a plain key/value area (one key per collection name) plus two
//! signals: a listener registry for its own context and a callback that fires
//! when *another* context writes a key. The record store is the only component
//! that writes through it.

mod memory;
mod migrations;
mod sqlite;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

pub use memory::MemoryBackend;
pub use sqlite::SqliteBackend;

use crate::Result;

/// Callback fired when a watched key changes.
pub type ChangeCallback = Arc<dyn Fn() + Send + Sync>;

/// Key/value storage shared by every context of the application.
pub trait StorageBackend: Send + Sync {
    /// Read the raw value stored under `key`.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Replace the value stored under `key`. Either the whole value is
    /// written or nothing is.
    ///
    /// Other contexts that must hear about the write synchronously are
    /// returned rather than called, so the writer can release its own locks
    /// first.
    fn set(&self, key: &str, value: &str) -> Result<PendingNotifications>;

    /// Watch `key` for writes made by other contexts.
    ///
    /// Writes made through this backend's own context never trigger the callback.
    fn on_external_change(&self, key: &str, callback: ChangeCallback) -> ExternalWatch;

    /// Listeners registered in this backend's own context.
    ///
    /// Every handle on the same context returns the same registry.
    fn local_listeners(&self) -> Arc<LocalListeners>;
}

/// Callbacks owed to other contexts after a write.
#[must_use = "other contexts are not notified until `notify` is called"]
#[derive(Default)]
pub struct PendingNotifications {
    callbacks: Vec<ChangeCallback>,
}

impl PendingNotifications {
    pub(crate) fn new(callbacks: Vec<ChangeCallback>) -> Self {
        Self { callbacks }
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    /// Run every owed callback.
    pub fn notify(self) {
        for callback in self.callbacks {
            callback();
        }
    }
}

impl std::fmt::Debug for PendingNotifications {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingNotifications")
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}

/// Per-key subscribers of one storage context.
#[derive(Default)]
pub struct LocalListeners {
    subscribers: Mutex<HashMap<String, Vec<(u64, ChangeCallback)>>>,
    next_id: AtomicU64,
}

impl LocalListeners {
    /// Register `callback` for `key` and return its id.
    pub fn add(&self, key: &str, callback: ChangeCallback) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key.to_string())
            .or_default()
            .push((id, callback));
        id
    }

    pub fn remove(&self, key: &str, id: u64) {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(entries) = subscribers.get_mut(key) {
            entries.retain(|(entry_id, _)| *entry_id != id);
            if entries.is_empty() {
                subscribers.remove(key);
            }
        }
    }

    /// Snapshot of the callbacks for `key`, safe to call without the lock.
    pub fn callbacks(&self, key: &str) -> Vec<ChangeCallback> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .map(|entries| entries.iter().map(|(_, cb)| Arc::clone(cb)).collect())
            .unwrap_or_default()
    }

    pub fn count(&self, key: &str) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .map_or(0, Vec::len)
    }
}

/// Registration handle returned by [`StorageBackend::on_external_change`].
///
/// Dropping the handle removes the registration.
#[must_use = "dropping an ExternalWatch unregisters it"]
pub struct ExternalWatch {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl ExternalWatch {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Remove the registration now.
    pub fn cancel(mut self) {
        self.run_cancel();
    }

    fn run_cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for ExternalWatch {
    fn drop(&mut self) {
        self.run_cancel();
    }
}

impl std::fmt::Debug for ExternalWatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExternalWatch")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}
