//! Two stores sharing one `SQLite` file behave like two open tabs.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use wayfare_core::storage::SqliteBackend;
use wayfare_core::{CandidateRecord, RecordStore};

const SAVES: &str = "travel_saved_items_v1";

fn open(path: &std::path::Path) -> RecordStore {
    RecordStore::new(SqliteBackend::open_with_poll_interval(path, Duration::from_millis(20)).unwrap())
}

fn wait_until(condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    false
}

#[test]
fn write_in_one_store_notifies_the_other() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("wayfare.db");
    let tab_a = open(&path);
    let tab_b = open(&path);

    let hits = Arc::new(AtomicUsize::new(0));
    let hits_in_callback = Arc::clone(&hits);
    let _subscription = tab_b.subscribe(SAVES, move || {
        hits_in_callback.fetch_add(1, Ordering::SeqCst);
    });

    let record = tab_a.upsert(SAVES, CandidateRecord::new().city("Lisbon"));

    assert!(wait_until(|| hits.load(Ordering::SeqCst) >= 1));
    let seen = tab_b.list(SAVES);
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].id, record.id);
}

#[test]
fn stores_sharing_one_handle_hear_each_other_immediately() {
    let dir = tempfile::tempdir().unwrap();
    let backend = SqliteBackend::open(dir.path().join("wayfare.db")).unwrap();
    let writer = RecordStore::new(backend.clone());
    let reader = RecordStore::new(backend);

    let hits = Arc::new(AtomicUsize::new(0));
    let hits_in_callback = Arc::clone(&hits);
    let _subscription = reader.subscribe(SAVES, move || {
        hits_in_callback.fetch_add(1, Ordering::SeqCst);
    });

    writer.upsert(SAVES, CandidateRecord::new().city("Kyoto"));

    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(reader.list(SAVES).len(), 1);
}

#[test]
fn last_writer_wins_per_collection() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("wayfare.db");
    let tab_a = open(&path);
    let tab_b = open(&path);

    tab_a.upsert(SAVES, CandidateRecord::new().with_id("a").city("Lisbon"));
    tab_b.upsert(SAVES, CandidateRecord::new().with_id("b").city("Kyoto"));

    // Each write re-reads the durable value first, so sequential writes from
    // different stores accumulate.
    let ids = tab_a
        .list(SAVES)
        .into_iter()
        .map(|record| record.id)
        .collect::<Vec<_>>();
    assert_eq!(ids, vec!["b".to_string(), "a".to_string()]);

    tab_b.clear(SAVES);
    assert!(tab_a.list(SAVES).is_empty());
}

#[test]
fn corrupt_durable_value_lists_empty() {
    use wayfare_core::storage::StorageBackend;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("wayfare.db");
    let raw = SqliteBackend::open(&path).unwrap();
    raw.set(SAVES, "[{\"id\": ").unwrap().notify();

    let store = open(&path);
    assert!(store.list(SAVES).is_empty());
}
