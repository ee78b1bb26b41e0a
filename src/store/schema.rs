//! SQLite schema for the condition pool

use rusqlite::Connection;
use tracing::debug;

use crate::error::StoreError;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Create tables and indexes if they do not exist yet.
pub fn init_schema(conn: &Connection) -> Result<(), StoreError> {
    debug!("Initializing condition store schema v{}", SCHEMA_VERSION);

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );

        -- One row per pre-generated condition. Eligible iff assigned = 0 AND completed = 0.
        CREATE TABLE IF NOT EXISTS conditions (
            condition_id INTEGER PRIMARY KEY,
            assigned INTEGER NOT NULL DEFAULT 0 CHECK (assigned >= 0),
            completed INTEGER NOT NULL DEFAULT 0 CHECK (completed >= 0),
            trial_order TEXT NOT NULL,
            holder TEXT,
            leased_at TEXT,
            released_at TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_conditions_eligible
            ON conditions (assigned, completed, condition_id);

        -- Session payloads handed off at the end of a run
        CREATE TABLE IF NOT EXISTS session_records (
            session_id TEXT PRIMARY KEY,
            condition_id INTEGER,
            requester TEXT NOT NULL,
            payload TEXT NOT NULL,
            received_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_session_records_condition
            ON session_records (condition_id);
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [SCHEMA_VERSION],
    )?;

    Ok(())
}
