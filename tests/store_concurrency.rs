//! Condition pool behavior across independent connections
//!
//! Every store here is a separate SQLite connection on the same file, the
//! same way several server processes would share one database.

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use cohort::store::ProvisionRecord;
use cohort::{LeaseStore, StoreError};
use serde_json::json;
use tempfile::TempDir;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

fn seed(dir: &TempDir, ids: &[i64]) -> LeaseStore {
    let store = LeaseStore::open(dir.path(), BUSY_TIMEOUT).unwrap();
    let records: Vec<_> = ids
        .iter()
        .map(|&id| ProvisionRecord {
            condition_id: id,
            trial_order: json!([]),
        })
        .collect();
    store.provision(&records).unwrap();
    store
}

/// Race `contenders` connections on one allocate each; returns the ids won.
fn race(dir: &TempDir, contenders: usize) -> (Vec<i64>, usize) {
    let stores: Vec<_> = (0..contenders)
        .map(|_| LeaseStore::open(dir.path(), BUSY_TIMEOUT).unwrap())
        .collect();
    let barrier = Arc::new(Barrier::new(contenders));

    let handles: Vec<_> = stores
        .into_iter()
        .enumerate()
        .map(|(i, store)| {
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                store.allocate(&format!("worker-{}", i))
            })
        })
        .collect();

    let mut won = Vec::new();
    let mut exhausted = 0;
    for handle in handles {
        match handle.join().unwrap() {
            Ok(record) => won.push(record.condition_id),
            Err(StoreError::PoolExhausted) => exhausted += 1,
            Err(e) => panic!("unexpected allocation error: {}", e),
        }
    }
    won.sort_unstable();
    (won, exhausted)
}

// =============================================================================
// Allocation races
// =============================================================================

#[test]
fn test_single_record_goes_to_exactly_one_requester() {
    let dir = TempDir::new().unwrap();
    let seeded = seed(&dir, &[1]);

    let (won, exhausted) = race(&dir, 8);

    assert_eq!(won, vec![1]);
    assert_eq!(exhausted, 7);
    let record = seeded.get(1).unwrap().unwrap();
    assert_eq!(record.assigned, 1);
}

#[test]
fn test_each_record_leased_once_under_contention() {
    let dir = TempDir::new().unwrap();
    let seeded = seed(&dir, &[1, 2, 3]);

    let (won, exhausted) = race(&dir, 6);

    assert_eq!(won, vec![1, 2, 3]);
    assert_eq!(exhausted, 3);
    let stats = seeded.stats().unwrap();
    assert_eq!(stats.available, 0);
    assert_eq!(stats.leased, 3);
}

// =============================================================================
// Release
// =============================================================================

#[test]
fn test_completed_release_seen_by_other_connections() {
    let dir = TempDir::new().unwrap();
    let a = seed(&dir, &[1]);
    let b = LeaseStore::open(dir.path(), BUSY_TIMEOUT).unwrap();

    a.allocate("w1").unwrap();
    let released = b.release(1, true).unwrap();
    assert_eq!((released.assigned, released.completed), (0, 1));
    assert!(!released.is_eligible());
    assert!(matches!(a.allocate("w2"), Err(StoreError::PoolExhausted)));
}

#[test]
fn test_duplicate_release_keeps_assigned_at_zero() {
    let dir = TempDir::new().unwrap();
    let store = seed(&dir, &[1]);

    store.allocate("w1").unwrap();
    store.release(1, false).unwrap();
    store.release(1, false).unwrap();

    let record = store.get(1).unwrap().unwrap();
    assert_eq!(record.assigned, 0);
    assert!(record.is_eligible());
}

/// A session that never sends its release keeps the record forever. The
/// store reports it as leased and does not reclaim it.
#[test]
fn test_missing_release_leaves_record_leased() {
    let dir = TempDir::new().unwrap();
    let store = seed(&dir, &[1]);
    store.allocate("vanished").unwrap();
    drop(store);

    let reopened = LeaseStore::open(dir.path(), BUSY_TIMEOUT).unwrap();
    let leased = reopened.leased().unwrap();
    assert_eq!(leased.len(), 1);
    assert_eq!(leased[0].holder.as_deref(), Some("vanished"));
    assert!(matches!(
        reopened.allocate("next"),
        Err(StoreError::PoolExhausted)
    ));
}
