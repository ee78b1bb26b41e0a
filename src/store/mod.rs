//! Condition store backed by SQLite
//!
//! Holds the shared pool of condition records and the session payloads
//! handed off at the end of each run.
//!
//! ## Tables
//!
//! - `conditions` - one row per condition (assigned/completed counters, trial payload)
//! - `session_records` - finished session payloads

pub mod leases;
pub mod schema;
pub mod sessions;

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use rusqlite::Connection;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::StoreError;
use crate::session::SessionPayload;

pub use leases::{ConditionRecord, ProvisionRecord};

/// SQLite-backed lease store
pub struct LeaseStore {
    conn: Mutex<Connection>,
}

impl LeaseStore {
    /// Open or create `conditions.db` under `data_dir`
    pub fn open(data_dir: &Path, busy_timeout: Duration) -> Result<Self, StoreError> {
        std::fs::create_dir_all(data_dir)?;
        let db_path = data_dir.join("conditions.db");
        info!("Opening condition store at {:?}", db_path);

        let conn = Connection::open(&db_path)?;
        // Writers from other connections wait instead of failing immediately
        conn.busy_timeout(busy_timeout)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        Self::from_connection(conn)
    }

    /// Open an in-memory store (for testing)
    pub fn open_in_memory() -> Result<Self, StoreError> {
        debug!("Opening in-memory condition store");
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        schema::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| StoreError::Lock(e.to_string()))?;
        f(&conn)
    }

    pub fn with_conn_mut<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Connection) -> Result<T, StoreError>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| StoreError::Lock(e.to_string()))?;
        f(&mut conn)
    }

    /// Lease one eligible condition, or fail with `PoolExhausted`.
    pub fn allocate(&self, requester: &str) -> Result<ConditionRecord, StoreError> {
        self.with_conn_mut(|conn| leases::allocate(conn, requester))
    }

    /// Drop a lease, optionally marking the condition completed.
    pub fn release(&self, condition_id: i64, completed: bool) -> Result<ConditionRecord, StoreError> {
        self.with_conn(|conn| leases::release(conn, condition_id, completed))
    }

    pub fn get(&self, condition_id: i64) -> Result<Option<ConditionRecord>, StoreError> {
        self.with_conn(|conn| leases::get(conn, condition_id))
    }

    pub fn leased(&self) -> Result<Vec<ConditionRecord>, StoreError> {
        self.with_conn(leases::leased)
    }

    pub fn provision(&self, records: &[ProvisionRecord]) -> Result<usize, StoreError> {
        self.with_conn_mut(|conn| leases::provision(conn, records))
    }

    pub fn record_session(&self, payload: &SessionPayload) -> Result<bool, StoreError> {
        self.with_conn(|conn| sessions::record_session(conn, payload))
    }

    pub fn load_session(&self, session_id: &str) -> Result<Option<SessionPayload>, StoreError> {
        self.with_conn(|conn| sessions::load_session(conn, session_id))
    }

    /// Pool occupancy counts
    pub fn stats(&self) -> Result<PoolStats, StoreError> {
        self.with_conn(|conn| {
            let (total, available, leased, completed): (i64, i64, i64, i64) = conn.query_row(
                "SELECT COUNT(*),
                        COALESCE(SUM(CASE WHEN assigned = 0 AND completed = 0 THEN 1 ELSE 0 END), 0),
                        COALESCE(SUM(CASE WHEN assigned > 0 THEN 1 ELSE 0 END), 0),
                        COALESCE(SUM(CASE WHEN completed > 0 THEN 1 ELSE 0 END), 0)
                 FROM conditions",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )?;

            Ok(PoolStats {
                total: total as u64,
                available: available as u64,
                leased: leased as u64,
                completed: completed as u64,
                sessions: sessions::session_count(conn)?,
            })
        })
    }
}

/// Pool occupancy
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub total: u64,
    pub available: u64,
    pub leased: u64,
    pub completed: u64,
    pub sessions: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: i64) -> ProvisionRecord {
        ProvisionRecord {
            condition_id: id,
            trial_order: serde_json::json!([]),
        }
    }

    #[test]
    fn test_stats_track_lifecycle() {
        let store = LeaseStore::open_in_memory().unwrap();
        store.provision(&[record(1), record(2), record(3)]).unwrap();

        store.allocate("a").unwrap();
        store.allocate("b").unwrap();
        store.release(1, true).unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(
            stats,
            PoolStats {
                total: 3,
                available: 1,
                leased: 1,
                completed: 1,
                sessions: 0,
            }
        );
    }

    #[test]
    fn test_empty_pool_stats() {
        let store = LeaseStore::open_in_memory().unwrap();
        let stats = store.stats().unwrap();
        assert_eq!(stats.total, 0);
        assert_eq!(stats.available, 0);
    }

    #[test]
    fn test_on_disk_store_persists() {
        let dir = tempfile::TempDir::new().unwrap();
        {
            let store = LeaseStore::open(dir.path(), Duration::from_secs(1)).unwrap();
            store.provision(&[record(1)]).unwrap();
            store.allocate("w").unwrap();
        }
        let store = LeaseStore::open(dir.path(), Duration::from_secs(1)).unwrap();
        assert_eq!(store.get(1).unwrap().unwrap().assigned, 1);
    }
}
