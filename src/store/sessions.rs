//! Persisted session payloads

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::session::SessionPayload;

/// Store a finished session. Returns `false` when the session id was
/// already recorded (a resubmitted payload is kept as first received).
pub fn record_session(conn: &Connection, payload: &SessionPayload) -> Result<bool, StoreError> {
    let body = serde_json::to_string(payload)?;
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO session_records (session_id, condition_id, requester, payload, received_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            payload.session_id.to_string(),
            payload.condition_id,
            payload.requester,
            body,
            Utc::now().to_rfc3339(),
        ],
    )?;

    if inserted == 0 {
        warn!(session_id = %payload.session_id, "Duplicate session payload ignored");
    } else {
        debug!(session_id = %payload.session_id, trials = payload.trials.len(), "Session recorded");
    }
    Ok(inserted > 0)
}

/// Load a stored session payload by id
pub fn load_session(conn: &Connection, session_id: &str) -> Result<Option<SessionPayload>, StoreError> {
    let body: Option<String> = conn
        .query_row(
            "SELECT payload FROM session_records WHERE session_id = ?1",
            params![session_id],
            |row| row.get(0),
        )
        .optional()?;

    match body {
        Some(body) => Ok(Some(serde_json::from_str(&body)?)),
        None => Ok(None),
    }
}

pub fn session_count(conn: &Connection) -> Result<u64, StoreError> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM session_records", [], |row| row.get(0))?;
    Ok(count as u64)
}
