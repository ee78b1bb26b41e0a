//! Error types for cohort

use thiserror::Error;

/// Failures of the condition store.
///
/// Every variant is reported before any partial mutation becomes visible:
/// allocation and release each run as a single statement.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("No eligible condition available")]
    PoolExhausted,

    #[error("Unknown condition: {0}")]
    UnknownCondition(i64),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Lock poisoned: {0}")]
    Lock(String),
}

/// Errors raised while loading configuration.
#[derive(Error, Debug)]
pub enum CohortError {
    #[error("Configuration error: {0}")]
    Config(String),
}
