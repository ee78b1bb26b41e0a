//! Condition leases: allocation, release and provisioning
//!
//! Allocation is a single conditional `UPDATE ... RETURNING` run inside an
//! immediate transaction. The eligibility predicate is checked by the same
//! statement that increments `assigned`, so two requesters can never both
//! claim one row, and a failed statement leaves the counter untouched.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::StoreError;

/// One row of the shared condition pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionRecord {
    pub condition_id: i64,
    /// Concurrent holders; 0 or 1 in normal operation
    pub assigned: i64,
    /// Completed sessions; 0 or 1 in normal operation
    pub completed: i64,
    /// Serialized trial payload, handed to the client verbatim
    pub trial_order: String,
    /// Requester token of the most recent lease
    pub holder: Option<String>,
    pub leased_at: Option<String>,
    pub released_at: Option<String>,
}

impl ConditionRecord {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            condition_id: row.get("condition_id")?,
            assigned: row.get("assigned")?,
            completed: row.get("completed")?,
            trial_order: row.get("trial_order")?,
            holder: row.get("holder")?,
            leased_at: row.get("leased_at")?,
            released_at: row.get("released_at")?,
        })
    }

    /// Whether the allocator may hand this record out.
    pub fn is_eligible(&self) -> bool {
        self.assigned == 0 && self.completed == 0
    }
}

/// Input row for out-of-band provisioning
#[derive(Debug, Clone, Deserialize)]
pub struct ProvisionRecord {
    pub condition_id: i64,
    /// Either a JSON string holding the payload or the payload itself
    pub trial_order: serde_json::Value,
}

impl ProvisionRecord {
    fn serialized_order(&self) -> String {
        match &self.trial_order {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Lease the lowest-id eligible condition for `requester`.
pub fn allocate(conn: &mut Connection, requester: &str) -> Result<ConditionRecord, StoreError> {
    let now = Utc::now().to_rfc3339();
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let record = tx
        .query_row(
            "UPDATE conditions
             SET assigned = assigned + 1, holder = ?1, leased_at = ?2
             WHERE condition_id = (
                 SELECT condition_id FROM conditions
                 WHERE assigned = 0 AND completed = 0
                 ORDER BY condition_id
                 LIMIT 1
             )
             AND assigned = 0 AND completed = 0
             RETURNING condition_id, assigned, completed, trial_order, holder, leased_at, released_at",
            params![requester, now],
            ConditionRecord::from_row,
        )
        .optional()?;

    tx.commit()?;

    match record {
        Some(record) => {
            info!(condition_id = record.condition_id, requester, "Condition leased");
            Ok(record)
        }
        None => {
            info!(requester, "Condition pool exhausted");
            Err(StoreError::PoolExhausted)
        }
    }
}

/// Drop one lease on `condition_id`, optionally marking it completed.
///
/// `assigned` never goes below zero, so duplicate releases for the same
/// session are harmless. `completed` is incremented on every call that
/// asks for it.
pub fn release(
    conn: &Connection,
    condition_id: i64,
    completed: bool,
) -> Result<ConditionRecord, StoreError> {
    let now = Utc::now().to_rfc3339();

    let record = conn
        .query_row(
            "UPDATE conditions
             SET assigned = MAX(assigned - 1, 0),
                 completed = completed + ?2,
                 released_at = ?3
             WHERE condition_id = ?1
             RETURNING condition_id, assigned, completed, trial_order, holder, leased_at, released_at",
            params![condition_id, if completed { 1 } else { 0 }, now],
            ConditionRecord::from_row,
        )
        .optional()?
        .ok_or(StoreError::UnknownCondition(condition_id))?;

    info!(
        condition_id,
        completed,
        assigned = record.assigned,
        "Condition released"
    );
    Ok(record)
}

/// Get a condition by id
pub fn get(conn: &Connection, condition_id: i64) -> Result<Option<ConditionRecord>, StoreError> {
    let record = conn
        .query_row(
            "SELECT condition_id, assigned, completed, trial_order, holder, leased_at, released_at
             FROM conditions WHERE condition_id = ?1",
            params![condition_id],
            ConditionRecord::from_row,
        )
        .optional()?;
    Ok(record)
}

/// Records currently held by at least one session.
///
/// A session whose release never arrived stays in this list forever; the
/// store reports it but does not reclaim it.
pub fn leased(conn: &Connection) -> Result<Vec<ConditionRecord>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT condition_id, assigned, completed, trial_order, holder, leased_at, released_at
         FROM conditions WHERE assigned > 0 ORDER BY condition_id",
    )?;
    let rows = stmt
        .query_map([], ConditionRecord::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Insert new condition rows, skipping ids that already exist.
pub fn provision(conn: &mut Connection, records: &[ProvisionRecord]) -> Result<usize, StoreError> {
    let tx = conn.transaction()?;
    let mut inserted = 0;
    {
        let mut stmt = tx.prepare(
            "INSERT OR IGNORE INTO conditions (condition_id, assigned, completed, trial_order)
             VALUES (?1, 0, 0, ?2)",
        )?;
        for record in records {
            inserted += stmt.execute(params![record.condition_id, record.serialized_order()])?;
        }
    }
    tx.commit()?;

    debug!(inserted, offered = records.len(), "Provisioned conditions");
    Ok(inserted)
}
