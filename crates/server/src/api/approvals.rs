//! Approval gate handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use courtwatch_core::{ApprovalError, ApprovalRequest};

use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Body of an approve or reject call. Both fields are optional.
#[derive(Debug, Deserialize)]
pub struct DecisionBody {
    #[serde(default = "default_reviewer")]
    pub reviewer: String,
    #[serde(default)]
    pub notes: Option<String>,
}

fn default_reviewer() -> String {
    "api".to_string()
}

impl Default for DecisionBody {
    fn default() -> Self {
        Self {
            reviewer: default_reviewer(),
            notes: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListApprovalsResponse {
    pub approvals: Vec<ApprovalRequest>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct ApprovalErrorResponse {
    pub error: String,
}

fn error_response(e: ApprovalError) -> (StatusCode, Json<ApprovalErrorResponse>) {
    let status = match &e {
        ApprovalError::NotFound(_) => StatusCode::NOT_FOUND,
        ApprovalError::AlreadyProcessed { .. } => StatusCode::CONFLICT,
        ApprovalError::InvalidTransition(_) => StatusCode::BAD_REQUEST,
        ApprovalError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ApprovalErrorResponse {
            error: e.to_string(),
        }),
    )
}

// ============================================================================
// Handlers
// ============================================================================

/// Pending requests, oldest first.
pub async fn list_pending(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.gate().pending() {
        Ok(approvals) => {
            let total = approvals.len();
            (StatusCode::OK, Json(ListApprovalsResponse { approvals, total })).into_response()
        }
        Err(e) => error_response(e).into_response(),
    }
}

pub async fn get_approval(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.gate().get(&id) {
        Ok(Some(request)) => (StatusCode::OK, Json(request)).into_response(),
        Ok(None) => error_response(ApprovalError::NotFound(id)).into_response(),
        Err(e) => error_response(e).into_response(),
    }
}

pub async fn approve(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Option<Json<DecisionBody>>,
) -> impl IntoResponse {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    match state
        .gate()
        .approve(&id, &body.reviewer, body.notes.as_deref())
    {
        Ok(request) => (StatusCode::OK, Json(request)).into_response(),
        Err(e) => error_response(e).into_response(),
    }
}

pub async fn reject(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Option<Json<DecisionBody>>,
) -> impl IntoResponse {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    match state
        .gate()
        .reject(&id, &body.reviewer, body.notes.as_deref())
    {
        Ok(request) => (StatusCode::OK, Json(request)).into_response(),
        Err(e) => error_response(e).into_response(),
    }
}
