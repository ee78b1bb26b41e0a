//! Lease API handlers

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use tracing::{error, info, warn};

use super::api::{
    AssignmentData, CloseRequest, CloseResponse, SelectParams, SelectResponse, SessionAck,
};
use super::SharedState;
use crate::error::StoreError;
use crate::session::SessionPayload;
use crate::store::{ConditionRecord, PoolStats};

/// Requester token used when the client does not identify itself
const ANONYMOUS: &str = "anonymous";

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    "OK"
}

/// GET|POST /api/assignments/select?workerId=...
pub async fn select_assignment(
    State(state): State<SharedState>,
    Query(params): Query<SelectParams>,
) -> (StatusCode, Json<SelectResponse>) {
    let requester = params.worker_id.as_deref().unwrap_or(ANONYMOUS);

    match state.store.allocate(requester) {
        Ok(record) => (
            StatusCode::OK,
            Json(SelectResponse {
                success: true,
                message: String::new(),
                data: Some(AssignmentData {
                    condition_id: record.condition_id,
                    trial_order: record.trial_order,
                }),
            }),
        ),
        Err(StoreError::PoolExhausted) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(SelectResponse {
                success: false,
                message: "No conditions available".to_string(),
                data: None,
            }),
        ),
        Err(e) => {
            error!(requester, error = %e, "Allocation failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(SelectResponse {
                    success: false,
                    message: e.to_string(),
                    data: None,
                }),
            )
        }
    }
}

/// POST /api/assignments/close
pub async fn close_assignment(
    State(state): State<SharedState>,
    Json(req): Json<CloseRequest>,
) -> (StatusCode, Json<CloseResponse>) {
    let completed = req.completed.unwrap_or(false);

    match state.store.release(req.condition_id, completed) {
        Ok(_) => (
            StatusCode::OK,
            Json(CloseResponse {
                success: true,
                completed,
                message: None,
            }),
        ),
        Err(StoreError::UnknownCondition(id)) => {
            warn!(condition_id = id, worker_id = ?req.worker_id, "Close for unknown condition");
            (
                StatusCode::NOT_FOUND,
                Json(CloseResponse {
                    success: false,
                    completed,
                    message: Some(format!("Unknown condition {}", id)),
                }),
            )
        }
        Err(e) => {
            error!(condition_id = req.condition_id, error = %e, "Release failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(CloseResponse {
                    success: false,
                    completed,
                    message: Some(e.to_string()),
                }),
            )
        }
    }
}

/// POST /api/sessions
pub async fn submit_session(
    State(state): State<SharedState>,
    Json(payload): Json<SessionPayload>,
) -> Response {
    match state.store.record_session(&payload) {
        Ok(stored) => {
            info!(
                session_id = %payload.session_id,
                condition_id = payload.condition_id,
                running_total = payload.running_total,
                "Session payload received"
            );
            Json(SessionAck {
                success: true,
                stored,
            })
            .into_response()
        }
        Err(e) => {
            error!(session_id = %payload.session_id, error = %e, "Failed to store session");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// GET /api/pool/status
pub async fn pool_status(State(state): State<SharedState>) -> Result<Json<PoolStats>, (StatusCode, String)> {
    state
        .store
        .stats()
        .map(Json)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

/// GET /api/pool/leased
pub async fn pool_leased(
    State(state): State<SharedState>,
) -> Result<Json<Vec<ConditionRecord>>, (StatusCode, String)> {
    state
        .store
        .leased()
        .map(Json)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

/// GET /content/problems.json
pub async fn problem_bank(State(state): State<SharedState>) -> Response {
    let path = &state.config.content.problems_path;
    match tokio::fs::read(path).await {
        Ok(body) => ([(header::CONTENT_TYPE, "application/json")], body).into_response(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Problem bank unavailable");
            (StatusCode::NOT_FOUND, "Problem bank unavailable").into_response()
        }
    }
}
