//! Wire types for the lease API

use serde::{Deserialize, Serialize};

/// Leased condition inside a successful select response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentData {
    #[serde(rename = "conditionId")]
    pub condition_id: i64,
    /// Serialized trial payload, exactly as provisioned
    pub trial_order: String,
}

/// Response of `/api/assignments/select`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectResponse {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    pub data: Option<AssignmentData>,
}

/// Query parameters of `/api/assignments/select`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SelectParams {
    #[serde(rename = "workerId", default)]
    pub worker_id: Option<String>,
}

/// Body of `/api/assignments/close`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseRequest {
    pub condition_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloseResponse {
    pub success: bool,
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Response of `/api/sessions`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionAck {
    pub success: bool,
    /// `false` when the session id had already been stored
    pub stored: bool,
}
