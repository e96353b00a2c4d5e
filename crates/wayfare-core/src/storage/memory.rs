//! In-memory storage area shared between contexts.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use super::{ChangeCallback, ExternalWatch, LocalListeners, PendingNotifications, StorageBackend};
use crate::{Error, Result};

struct Listener {
    id: u64,
    context: u64,
    key: String,
    callback: ChangeCallback,
}

#[derive(Default)]
struct SharedArea {
    values: Mutex<HashMap<String, String>>,
    listeners: Mutex<Vec<Listener>>,
    quota_bytes: Option<usize>,
    next_context: AtomicU64,
    next_listener: AtomicU64,
}

/// One context's handle onto an in-memory storage area.
///
/// Handles created with [`MemoryBackend::open_context`] share values with the
/// handle they came from but are distinct contexts: a write through one fires
/// the external-change callbacks registered through the others. Clones stay
/// in the same context and share its local listeners.
#[derive(Clone)]
pub struct MemoryBackend {
    area: Arc<SharedArea>,
    context: u64,
    local: Arc<LocalListeners>,
}

impl MemoryBackend {
    /// Create a fresh, unbounded storage area and return its first context.
    pub fn new() -> Self {
        Self::from_area(SharedArea::default())
    }

    /// Create a storage area that rejects writes pushing its total size
    /// (keys plus values, in bytes) past `quota_bytes`.
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self::from_area(SharedArea {
            quota_bytes: Some(quota_bytes),
            ..SharedArea::default()
        })
    }

    fn from_area(area: SharedArea) -> Self {
        let area = Arc::new(area);
        let context = area.next_context.fetch_add(1, Ordering::Relaxed);
        Self {
            area,
            context,
            local: Arc::default(),
        }
    }

    /// Open another context on the same storage area.
    #[must_use]
    pub fn open_context(&self) -> Self {
        Self {
            area: Arc::clone(&self.area),
            context: self.area.next_context.fetch_add(1, Ordering::Relaxed),
            local: Arc::default(),
        }
    }

    fn callbacks_for_others(&self, key: &str) -> Vec<ChangeCallback> {
        self.area
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|listener| listener.key == key && listener.context != self.context)
            .map(|listener| Arc::clone(&listener.callback))
            .collect()
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let values = self
            .area
            .values
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<PendingNotifications> {
        {
            let mut values = self
                .area
                .values
                .lock()
                .unwrap_or_else(PoisonError::into_inner);

            if let Some(limit) = self.area.quota_bytes {
                let others: usize = values
                    .iter()
                    .filter(|(existing, _)| existing.as_str() != key)
                    .map(|(existing, stored)| existing.len() + stored.len())
                    .sum();
                let size = others + key.len() + value.len();
                if size > limit {
                    return Err(Error::QuotaExceeded {
                        key: key.to_string(),
                        size,
                        limit,
                    });
                }
            }

            values.insert(key.to_string(), value.to_string());
        }

        Ok(PendingNotifications::new(self.callbacks_for_others(key)))
    }

    fn on_external_change(&self, key: &str, callback: ChangeCallback) -> ExternalWatch {
        let id = self.area.next_listener.fetch_add(1, Ordering::Relaxed);
        self.area
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Listener {
                id,
                context: self.context,
                key: key.to_string(),
                callback,
            });

        let area: Weak<SharedArea> = Arc::downgrade(&self.area);
        ExternalWatch::new(move || {
            if let Some(area) = area.upgrade() {
                area.listeners
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .retain(|listener| listener.id != id);
            }
        })
    }

    fn local_listeners(&self) -> Arc<LocalListeners> {
        Arc::clone(&self.local)
    }
}
