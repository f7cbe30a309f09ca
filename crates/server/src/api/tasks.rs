//! Task queue handler.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use std::sync::Arc;

use courtwatch_core::TaskQueueStore;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct TaskErrorResponse {
    pub error: String,
}

/// Summary of the queue file the last cycle wrote.
pub async fn get_tasks(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let store = TaskQueueStore::new(&state.config().paths.task_queue);

    match store.read() {
        Ok(Some(queue)) => (StatusCode::OK, Json(queue.summary())).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(TaskErrorResponse {
                error: format!("no task queue at {}", store.path().display()),
            }),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(TaskErrorResponse {
                error: e.to_string(),
            }),
        )
            .into_response(),
    }
}
