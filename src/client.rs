//! Participant-side access to the lease service and study content
//!
//! `LeaseService` is the seam the timeline talks through. `HttpLeaseClient`
//! reaches a running server; `LocalLeases` wraps a `LeaseStore` in-process.
//! Release is fire-and-forget on both: the participant may already be gone,
//! so failures are logged and dropped, never retried.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{debug, info, warn};

use crate::content::{ContentError, ProblemBank};
use crate::error::StoreError;
use crate::server::api::{CloseRequest, CloseResponse, SelectResponse, SessionAck};
use crate::session::{SessionPayload, SessionSink};
use crate::store::LeaseStore;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("No condition available")]
    PoolExhausted,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Store error: {0}")]
    Store(StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for ClientError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::PoolExhausted => ClientError::PoolExhausted,
            other => ClientError::Store(other),
        }
    }
}

/// A leased condition as seen by the participant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub condition_id: i64,
    /// Serialized trial payload
    pub trial_order: String,
}

/// Allocation and release of condition leases.
#[async_trait]
pub trait LeaseService: Send + Sync {
    /// Lease one condition for `requester`. `PoolExhausted` is terminal.
    async fn allocate(&self, requester: &str) -> Result<Assignment, ClientError>;

    /// Best-effort release; the outcome is not reported to the caller.
    async fn release(&self, condition_id: i64, completed: bool);
}

/// Source of the problem bank fetched at startup
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn problem_bank(&self) -> Result<ProblemBank, ContentError>;
}

// ============================================================================
// HTTP
// ============================================================================

/// Lease client for a running cohort server
#[derive(Clone)]
pub struct HttpLeaseClient {
    base_url: String,
    http: reqwest::Client,
}

impl HttpLeaseClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl LeaseService for HttpLeaseClient {
    async fn allocate(&self, requester: &str) -> Result<Assignment, ClientError> {
        let response = self
            .http
            .get(self.url("/api/assignments/select"))
            .query(&[("workerId", requester)])
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::SERVICE_UNAVAILABLE {
            // the body may come from a proxy rather than the lease API
            info!(requester, "Condition pool exhausted");
            return Err(ClientError::PoolExhausted);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ClientError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let body: SelectResponse = response
            .json()
            .await
            .map_err(|e| ClientError::InvalidResponse(e.to_string()))?;

        match body.data {
            Some(data) if body.success => {
                info!(condition_id = data.condition_id, requester, "Assignment received");
                Ok(Assignment {
                    condition_id: data.condition_id,
                    trial_order: data.trial_order,
                })
            }
            _ => Err(ClientError::Rejected {
                status: status.as_u16(),
                message: body.message,
            }),
        }
    }

    async fn release(&self, condition_id: i64, completed: bool) {
        let request = CloseRequest {
            condition_id,
            worker_id: None,
            completed: completed.then_some(true),
        };

        let result = self
            .http
            .post(self.url("/api/assignments/close"))
            .json(&request)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                let ack = response.json::<CloseResponse>().await;
                debug!(condition_id, completed, ?ack, "Release delivered");
            }
            Ok(response) => {
                warn!(condition_id, status = %response.status(), "Release rejected");
            }
            Err(e) => {
                warn!(condition_id, error = %e, "Release not delivered");
            }
        }
    }
}

/// Posts finished sessions to `/api/sessions`
#[derive(Clone)]
pub struct HttpSessionSink {
    client: HttpLeaseClient,
}

impl HttpSessionSink {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: HttpLeaseClient::new(base_url),
        }
    }
}

#[async_trait]
impl SessionSink for HttpSessionSink {
    async fn submit(&self, payload: &SessionPayload) -> Result<(), ClientError> {
        let response = self
            .client
            .http
            .post(self.client.url("/api/sessions"))
            .json(payload)
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ClientError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let ack: SessionAck = response
            .json()
            .await
            .map_err(|e| ClientError::InvalidResponse(e.to_string()))?;
        debug!(session_id = %payload.session_id, stored = ack.stored, "Session submitted");
        Ok(())
    }
}

/// Problem bank served over HTTP
pub struct HttpContent {
    url: String,
    http: reqwest::Client,
}

impl HttpContent {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ContentSource for HttpContent {
    async fn problem_bank(&self) -> Result<ProblemBank, ContentError> {
        let response = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(|e| ContentError::Fetch(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ContentError::Fetch(format!(
                "{} returned {}",
                self.url,
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ContentError::Fetch(e.to_string()))?;
        ProblemBank::parse(&body)
    }
}

// ============================================================================
// Local
// ============================================================================

/// Problem bank read from a JSON file
pub struct FileContent {
    path: PathBuf,
}

impl FileContent {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ContentSource for FileContent {
    async fn problem_bank(&self) -> Result<ProblemBank, ContentError> {
        let body = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| ContentError::Fetch(format!("{}: {}", self.path.display(), e)))?;
        ProblemBank::parse(&body)
    }
}

#[async_trait]
impl ContentSource for ProblemBank {
    async fn problem_bank(&self) -> Result<ProblemBank, ContentError> {
        Ok(self.clone())
    }
}

/// In-process lease service over a shared store
#[derive(Clone)]
pub struct LocalLeases {
    store: Arc<LeaseStore>,
}

impl LocalLeases {
    pub fn new(store: Arc<LeaseStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<LeaseStore> {
        &self.store
    }
}

#[async_trait]
impl LeaseService for LocalLeases {
    async fn allocate(&self, requester: &str) -> Result<Assignment, ClientError> {
        let record = self.store.allocate(requester)?;
        Ok(Assignment {
            condition_id: record.condition_id,
            trial_order: record.trial_order,
        })
    }

    async fn release(&self, condition_id: i64, completed: bool) {
        if let Err(e) = self.store.release(condition_id, completed) {
            warn!(condition_id, error = %e, "Release failed");
        }
    }
}

#[async_trait]
impl SessionSink for LocalLeases {
    async fn submit(&self, payload: &SessionPayload) -> Result<(), ClientError> {
        self.store.record_session(payload)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ProvisionRecord;

    #[tokio::test]
    async fn test_local_leases_round_trip() {
        let store = Arc::new(LeaseStore::open_in_memory().unwrap());
        store
            .provision(&[ProvisionRecord {
                condition_id: 9,
                trial_order: serde_json::json!([]),
            }])
            .unwrap();
        let leases = LocalLeases::new(store.clone());

        let assignment = leases.allocate("w").await.unwrap();
        assert_eq!(assignment.condition_id, 9);
        assert_eq!(assignment.trial_order, "[]");
        assert!(matches!(
            leases.allocate("x").await,
            Err(ClientError::PoolExhausted)
        ));

        leases.release(9, true).await;
        let record = store.get(9).unwrap().unwrap();
        assert_eq!((record.assigned, record.completed), (0, 1));
    }

    #[tokio::test]
    async fn test_local_release_of_unknown_condition_is_swallowed() {
        let store = Arc::new(LeaseStore::open_in_memory().unwrap());
        LocalLeases::new(store).release(404, false).await;
    }

    #[tokio::test]
    async fn test_file_content_missing_file() {
        let source = FileContent::new("/nonexistent/problems.json");
        assert!(matches!(
            source.problem_bank().await,
            Err(ContentError::Fetch(_))
        ));
    }

    #[tokio::test]
    async fn test_file_content_reads_bank() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("problems.json");
        std::fs::write(&path, r#"{"p0": {"A": [[1]], "B": [[0]], "C": [[0]], "D": [[0]]}}"#).unwrap();
        let bank = FileContent::new(&path).problem_bank().await.unwrap();
        assert_eq!(bank.0.len(), 1);
    }
}
