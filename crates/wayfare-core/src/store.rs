//! Local-first record store.
//!
//! Every mutation rewrites the whole collection in the storage backend before
//! returning, then notifies subscribers. Remote mirroring happens afterwards on
//! a background task and can only ever add server fields to a record that is
//! still present locally.

use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::bus::{ChangeBus, Subscription};
use crate::mirror::{MirrorError, MirrorQueue, MirrorResult, RemoteMirror};
use crate::models::{CandidateRecord, Record, RecordKind, ServerFields};
use crate::storage::{PendingNotifications, StorageBackend};
use crate::Result;

/// Collection names used by the Wayfare clients.
pub mod collections {
    pub const SAVED_ITEMS: &str = "travel_saved_items_v1";
    pub const CREATED_TRIPS: &str = "travel_created_trips_v1";
    pub const BOOKINGS: &str = "travel_bookings_v1";
    pub const TOP_DEALS: &str = "travel_home_top_deals_v1";
}

struct StoreInner {
    backend: Arc<dyn StorageBackend>,
    bus: ChangeBus,
    write_lock: Mutex<()>,
    default_owner: Option<String>,
    mirror: OnceLock<MirrorQueue>,
}

/// A stored collection. Elements that no longer parse as records are kept
/// aside and written back after the readable ones.
#[derive(Default)]
struct Collection {
    records: Vec<Record>,
    unreadable: Vec<Value>,
}

/// Handle to the record store of one context. Cheap to clone.
///
/// Stores opened on handles of the same storage context see each other's
/// changes through the context's shared listeners.
#[derive(Clone)]
pub struct RecordStore {
    inner: Arc<StoreInner>,
}

impl RecordStore {
    /// Create a store over `backend` with no default owner and no mirror.
    pub fn new(backend: impl StorageBackend + 'static) -> Self {
        Self::builder(Arc::new(backend)).build()
    }

    pub fn builder(backend: Arc<dyn StorageBackend>) -> RecordStoreBuilder {
        RecordStoreBuilder {
            backend,
            default_owner: None,
        }
    }

    /// Start mirroring saved records to `mirror` on the current tokio runtime.
    pub fn attach_mirror<M: RemoteMirror>(&self, mirror: M, timeout: Duration) -> MirrorResult<()> {
        let store = Arc::downgrade(&self.inner);
        let queue = MirrorQueue::spawn(
            mirror,
            timeout,
            Box::new(move |collection: &str, id: &str, fields: ServerFields| {
                if let Some(inner) = Weak::upgrade(&store) {
                    Self { inner }.merge_server_fields(collection, id, fields);
                }
            }),
        )?;

        self.inner.mirror.set(queue).map_err(|_| {
            MirrorError::InvalidConfiguration("a mirror is already attached".to_string())
        })
    }

    pub fn has_mirror(&self) -> bool {
        self.inner.mirror.get().is_some()
    }

    /// Insert `candidate`, or field-merge it into the record with the same id.
    ///
    /// New records go to the front of the collection. The returned record is
    /// final even when the durable write fails; in that case the failure is
    /// logged and no change notification is raised.
    pub fn upsert(&self, collection: &str, candidate: CandidateRecord) -> Record {
        let candidate = candidate.normalized();
        let now = Utc::now();
        let guard = self.inner.lock_writes();

        let mut stored = match self.inner.load(collection) {
            Ok(stored) => stored.unwrap_or_default(),
            Err(error) => {
                tracing::warn!(
                    "Collection '{}' is unreadable; leaving it untouched: {}",
                    collection,
                    error
                );
                return self.inner.new_record(candidate, &[], now);
            }
        };

        let records = &mut stored.records;
        let existing = candidate
            .id
            .as_deref()
            .and_then(|id| records.iter().position(|record| record.id == id));
        let record = if let Some(position) = existing {
            records[position].merge_candidate(candidate);
            records[position].clone()
        } else {
            let record = self.inner.new_record(candidate, records, now);
            records.insert(0, record.clone());
            record
        };

        if let Some(pending) = self.inner.persist(collection, &stored) {
            drop(guard);
            self.inner.announce(collection, pending);
        }
        record
    }

    /// Remove the record with `id`. Returns `false` when nothing was removed.
    pub fn remove(&self, collection: &str, id: &str) -> bool {
        let guard = self.inner.lock_writes();

        let mut stored = match self.inner.load(collection) {
            Ok(Some(stored)) => stored,
            Ok(None) => return false,
            Err(error) => {
                tracing::warn!("Collection '{}' is unreadable: {}", collection, error);
                return false;
            }
        };

        let Some(position) = stored.records.iter().position(|record| record.id == id) else {
            return false;
        };
        stored.records.remove(position);

        let Some(pending) = self.inner.persist(collection, &stored) else {
            return false;
        };
        drop(guard);
        self.inner.announce(collection, pending);
        true
    }

    /// Replace the collection with an empty one.
    pub fn clear(&self, collection: &str) {
        let guard = self.inner.lock_writes();
        if let Some(pending) = self.inner.persist(collection, &Collection::default()) {
            drop(guard);
            self.inner.announce(collection, pending);
        }
    }

    /// Current records, newest first. Never fails: a missing or corrupt value
    /// reads as an empty collection.
    pub fn list(&self, collection: &str) -> Vec<Record> {
        match self.inner.load(collection) {
            Ok(stored) => stored.map(|stored| stored.records).unwrap_or_default(),
            Err(error) => {
                tracing::warn!("Failed to read collection '{}': {}", collection, error);
                Vec::new()
            }
        }
    }

    pub fn get(&self, collection: &str, id: &str) -> Option<Record> {
        self.list(collection)
            .into_iter()
            .find(|record| record.id == id)
    }

    /// Call `callback` whenever `collection` changes in any context.
    ///
    /// The callback carries no data; call [`RecordStore::list`] for a fresh snapshot.
    pub fn subscribe(
        &self,
        collection: &str,
        callback: impl Fn() + Send + Sync + 'static,
    ) -> Subscription {
        self.inner.bus.subscribe(collection, callback)
    }

    /// Queue `record` for the remote mirror and return immediately.
    pub fn mirror_async(&self, collection: &str, record: &Record) {
        match self.inner.mirror.get() {
            Some(queue) => queue.submit(collection, record.clone()),
            None => tracing::debug!(
                "No remote mirror configured; '{}' stays local only",
                record.id
            ),
        }
    }

    /// Upsert locally, then mirror in the background.
    pub fn save(&self, collection: &str, candidate: CandidateRecord) -> Record {
        let record = self.upsert(collection, candidate);
        self.mirror_async(collection, &record);
        record
    }

    /// Wait for every mirror job queued so far to finish.
    pub async fn flush_mirror(&self) {
        if let Some(queue) = self.inner.mirror.get() {
            queue.flush().await;
        }
    }

    /// Return the stored collection, or persist `defaults` (in the given order)
    /// when the collection is missing, empty, or unreadable.
    pub fn seed_if_empty(&self, collection: &str, defaults: Vec<CandidateRecord>) -> Vec<Record> {
        let guard = self.inner.lock_writes();

        match self.inner.load(collection) {
            Ok(Some(stored)) if !stored.records.is_empty() => return stored.records,
            Ok(_) => {}
            Err(error) => {
                tracing::warn!(
                    "Failed to parse persisted '{}'; reseeding defaults: {}",
                    collection,
                    error
                );
            }
        }

        let now = Utc::now();
        let mut records: Vec<Record> = Vec::with_capacity(defaults.len());
        for candidate in defaults {
            let candidate = candidate.normalized();
            if let Some(id) = candidate.id.as_deref() {
                if records.iter().any(|record| record.id == id) {
                    continue;
                }
            }
            let record = self.inner.new_record(candidate, &records, now);
            records.push(record);
        }

        let seeded = Collection {
            records,
            unreadable: Vec::new(),
        };
        if let Some(pending) = self.inner.persist(collection, &seeded) {
            drop(guard);
            self.inner.announce(collection, pending);
        }
        seeded.records
    }

    /// Merge fields returned by the remote service into a local record.
    ///
    /// Returns `false` if the record no longer exists locally; it is not
    /// recreated.
    pub fn merge_server_fields(&self, collection: &str, id: &str, fields: ServerFields) -> bool {
        let guard = self.inner.lock_writes();

        let mut stored = match self.inner.load(collection) {
            Ok(stored) => stored.unwrap_or_default(),
            Err(error) => {
                tracing::warn!("Collection '{}' is unreadable: {}", collection, error);
                return false;
            }
        };

        let Some(record) = stored.records.iter_mut().find(|record| record.id == id) else {
            tracing::debug!(
                "'{}' left '{}' before the server answered; dropping server fields",
                id,
                collection
            );
            return false;
        };
        record.merge_server_fields(fields);

        let Some(pending) = self.inner.persist(collection, &stored) else {
            return false;
        };
        drop(guard);
        self.inner.announce(collection, pending);
        true
    }
}

/// Builder for [`RecordStore`].
pub struct RecordStoreBuilder {
    backend: Arc<dyn StorageBackend>,
    default_owner: Option<String>,
}

impl RecordStoreBuilder {
    /// Owner stamped on records whose candidate does not name one.
    #[must_use]
    pub fn default_owner(mut self, owner: Option<String>) -> Self {
        self.default_owner = crate::util::normalize_text_option(owner);
        self
    }

    pub fn build(self) -> RecordStore {
        RecordStore {
            inner: Arc::new(StoreInner {
                bus: ChangeBus::new(Arc::clone(&self.backend)),
                backend: self.backend,
                write_lock: Mutex::new(()),
                default_owner: self.default_owner,
                mirror: OnceLock::new(),
            }),
        }
    }
}

impl StoreInner {
    fn lock_writes(&self) -> MutexGuard<'_, ()> {
        self.write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// A value that is not a JSON array is an error; single bad elements are not.
    fn load(&self, collection: &str) -> Result<Option<Collection>> {
        let Some(raw) = self.backend.get(collection)? else {
            return Ok(None);
        };
        let elements: Vec<Value> = serde_json::from_str(&raw)?;

        let mut stored = Collection::default();
        for element in elements {
            match Record::deserialize(&element) {
                Ok(record) => stored.records.push(record),
                Err(error) => {
                    tracing::warn!("Skipping unreadable record in '{}': {}", collection, error);
                    stored.unreadable.push(element);
                }
            }
        }
        Ok(Some(stored))
    }

    /// Write the collection; `None` means the change was discarded.
    fn persist(&self, collection: &str, stored: &Collection) -> Option<PendingNotifications> {
        let written = encode(stored)
            .map_err(crate::Error::from)
            .and_then(|raw| self.backend.set(collection, &raw));

        match written {
            Ok(pending) => Some(pending),
            Err(error) => {
                tracing::warn!(
                    "Failed to persist collection '{}'; change discarded: {}",
                    collection,
                    error
                );
                None
            }
        }
    }

    /// Notify every context about a persisted change. Call without `write_lock`.
    fn announce(&self, collection: &str, pending: PendingNotifications) {
        self.bus.publish(collection);
        pending.notify();
    }

    fn new_record(
        &self,
        candidate: CandidateRecord,
        existing: &[Record],
        now: DateTime<Utc>,
    ) -> Record {
        let id = candidate.id.clone().unwrap_or_else(|| {
            synthesize_id(candidate.kind.unwrap_or_default(), existing, now)
        });
        Record::from_candidate(candidate, id, self.default_owner.as_deref(), now)
    }
}

fn encode(stored: &Collection) -> serde_json::Result<String> {
    let mut elements = stored
        .records
        .iter()
        .map(serde_json::to_value)
        .collect::<serde_json::Result<Vec<_>>>()?;
    elements.extend(stored.unreadable.iter().cloned());
    serde_json::to_string(&elements)
}

/// `{kind}-{epoch millis}`, with a random suffix if that id is already taken.
fn synthesize_id(kind: RecordKind, existing: &[Record], now: DateTime<Utc>) -> String {
    let base = format!("{}-{}", kind.as_str(), now.timestamp_millis());
    if !existing.iter().any(|record| record.id == base) {
        return base;
    }
    let suffix = Uuid::now_v7().simple().to_string();
    format!("{base}-{}", &suffix[suffix.len() - 8..])
}
