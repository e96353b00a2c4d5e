//! `SQLite`-backed durable storage.
//!
//! Each collection is one row. Several processes (or several backends in one
//! process) may open the same file; each one notices the others' commits by
//! polling `PRAGMA data_version`, which only moves when a *different*
//! connection commits.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::thread;
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension};

use super::{
    migrations, ChangeCallback, ExternalWatch, LocalListeners, PendingNotifications, StorageBackend,
};
use crate::util::unix_millis_now;
use crate::Result;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

struct Watcher {
    id: u64,
    key: String,
    callback: ChangeCallback,
}

#[derive(Default)]
struct WatchState {
    data_version: i64,
    /// Last row version seen per watched key
    known_versions: HashMap<String, i64>,
    watchers: Vec<Watcher>,
}

struct Shared {
    conn: Mutex<Connection>,
    watch: Mutex<WatchState>,
    local: Arc<LocalListeners>,
    next_watcher: AtomicU64,
    poll_interval: Duration,
    poller_started: AtomicBool,
}

/// Durable storage in a local `SQLite` database file.
///
/// One opened handle is one context; clones share its connection and listeners.
#[derive(Clone)]
pub struct SqliteBackend {
    shared: Arc<Shared>,
}

impl SqliteBackend {
    /// Open (or create) the database at `path` and run migrations.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_poll_interval(path, DEFAULT_POLL_INTERVAL)
    }

    /// Like [`SqliteBackend::open`], with a custom interval for detecting
    /// writes from other connections.
    pub fn open_with_poll_interval(path: impl AsRef<Path>, poll_interval: Duration) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        tracing::debug!("Opened storage at {} (journal_mode={})", path.display(), mode);

        Self::from_connection(conn, poll_interval)
    }

    /// Open a private in-memory database (primarily for tests).
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?, DEFAULT_POLL_INTERVAL)
    }

    fn from_connection(mut conn: Connection, poll_interval: Duration) -> Result<Self> {
        migrations::run(&mut conn)?;
        let data_version = read_data_version(&conn)?;

        Ok(Self {
            shared: Arc::new(Shared {
                conn: Mutex::new(conn),
                watch: Mutex::new(WatchState {
                    data_version,
                    ..WatchState::default()
                }),
                local: Arc::default(),
                next_watcher: AtomicU64::new(0),
                poll_interval,
                poller_started: AtomicBool::new(false),
            }),
        })
    }

    fn ensure_poller(&self) {
        if self.shared.poller_started.swap(true, Ordering::SeqCst) {
            return;
        }

        let shared = Arc::downgrade(&self.shared);
        let interval = self.shared.poll_interval;
        let spawned = thread::Builder::new()
            .name("wayfare-storage-watch".to_string())
            .spawn(move || poll_loop(&shared, interval));

        if let Err(error) = spawned {
            tracing::warn!("Failed to start storage change watcher: {}", error);
            self.shared.poller_started.store(false, Ordering::SeqCst);
        }
    }
}

fn poll_loop(shared: &Weak<Shared>, interval: Duration) {
    loop {
        thread::sleep(interval);
        let Some(shared) = shared.upgrade() else {
            break;
        };
        shared.poll_external_changes();
    }
}

impl Shared {
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn watch(&self) -> MutexGuard<'_, WatchState> {
        self.watch.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn poll_external_changes(&self) {
        if self.watch().watchers.is_empty() {
            return;
        }

        match self.collect_external_changes() {
            Ok(callbacks) => {
                for callback in callbacks {
                    callback();
                }
            }
            Err(error) => tracing::warn!("Storage change detection failed: {}", error),
        }
    }

    fn collect_external_changes(&self) -> Result<Vec<ChangeCallback>> {
        let conn = self.conn();
        let data_version = read_data_version(&conn)?;

        let mut watch = self.watch();
        if data_version == watch.data_version {
            return Ok(Vec::new());
        }
        watch.data_version = data_version;

        let keys = watch.known_versions.keys().cloned().collect::<Vec<_>>();
        let mut changed = Vec::new();
        for key in keys {
            let current = read_row_version(&conn, &key)?;
            if watch.known_versions.insert(key.clone(), current) != Some(current) {
                tracing::debug!("Collection '{}' changed in another context", key);
                changed.push(key);
            }
        }

        Ok(watch
            .watchers
            .iter()
            .filter(|watcher| changed.contains(&watcher.key))
            .map(|watcher| Arc::clone(&watcher.callback))
            .collect())
    }

    fn remove_watcher(&self, id: u64) {
        let mut watch = self.watch();
        let Some(position) = watch.watchers.iter().position(|watcher| watcher.id == id) else {
            return;
        };
        let removed = watch.watchers.remove(position);
        if !watch.watchers.iter().any(|watcher| watcher.key == removed.key) {
            watch.known_versions.remove(&removed.key);
        }
    }
}

impl StorageBackend for SqliteBackend {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.shared.conn();
        let value = conn
            .query_row(
                "SELECT value FROM collections WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<PendingNotifications> {
        let mut conn = self.shared.conn();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO collections (key, value, updated_at, version) VALUES (?1, ?2, ?3, 1)
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at,
                version = collections.version + 1",
            params![key, value, unix_millis_now()],
        )?;
        let version = read_row_version(&tx, key)?;
        tx.commit()?;

        // Our own commit must not look like an external change.
        let mut watch = self.shared.watch();
        if let Some(known) = watch.known_versions.get_mut(key) {
            *known = version;
        }
        // Other connections hear about the commit from their own poller.
        Ok(PendingNotifications::default())
    }

    fn on_external_change(&self, key: &str, callback: ChangeCallback) -> ExternalWatch {
        let current = {
            let conn = self.shared.conn();
            read_row_version(&conn, key).unwrap_or_else(|error| {
                tracing::warn!("Failed to read version of '{}': {}", key, error);
                0
            })
        };

        let id = self.shared.next_watcher.fetch_add(1, Ordering::Relaxed);
        {
            let mut watch = self.shared.watch();
            watch.known_versions.entry(key.to_string()).or_insert(current);
            watch.watchers.push(Watcher {
                id,
                key: key.to_string(),
                callback,
            });
        }
        self.ensure_poller();

        let shared = Arc::downgrade(&self.shared);
        ExternalWatch::new(move || {
            if let Some(shared) = shared.upgrade() {
                shared.remove_watcher(id);
            }
        })
    }

    fn local_listeners(&self) -> Arc<LocalListeners> {
        Arc::clone(&self.shared.local)
    }
}

fn read_data_version(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row("PRAGMA data_version", [], |row| row.get(0))?)
}

fn read_row_version(conn: &Connection, key: &str) -> Result<i64> {
    let version = conn
        .query_row(
            "SELECT version FROM collections WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()?;
    Ok(version.unwrap_or(0))
}
