//! Health, status and metrics handlers.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use courtwatch_core::{
    coverage::CoverageSummary, orchestrator::CycleState, ratelimit::RateLimitAlert,
    ComponentHealth, OrchestratorStatus, RateLimiterStats, SanitizedConfig,
};

use crate::metrics::{collect_dynamic_metrics, encode_metrics};
use crate::state::AppState;

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ComponentStatus {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "healthy" when every component is alive, "degraded" otherwise
    pub status: String,
    pub components: BTreeMap<String, ComponentStatus>,
}

#[derive(Debug, Serialize)]
pub struct LastCycle {
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub cycles_completed: u64,
    pub cycles_failed: u64,
}

impl From<&CycleState> for LastCycle {
    fn from(state: &CycleState) -> Self {
        Self {
            started_at: state.last_started_at,
            finished_at: state.last_finished_at,
            error: state.last_error.clone(),
            cycles_completed: state.cycles_completed,
            cycles_failed: state.cycles_failed,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    #[serde(flatten)]
    pub health: HealthResponse,
    pub timestamp: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    pub last_cycle: LastCycle,
    pub orchestrator: OrchestratorStatus,
    pub restarts: BTreeMap<String, u32>,
    pub rate_limits: Vec<RateLimiterStats>,
    pub alerts: Vec<RateLimitAlert>,
}

#[derive(Debug, Serialize)]
pub struct TaskCounts {
    pub total: usize,
    pub by_priority: BTreeMap<String, usize>,
}

#[derive(Debug, Serialize)]
pub struct InventoryMetrics {
    pub total_objects: usize,
    pub total_size_gb: f64,
}

#[derive(Debug, Serialize)]
pub struct MetricsResponse {
    pub tasks: TaskCounts,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coverage: Option<CoverageSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s3_inventory: Option<InventoryMetrics>,
    pub rate_limits: Vec<RateLimiterStats>,
    pub orchestrator: OrchestratorStatus,
}

// ============================================================================
// Handlers
// ============================================================================

fn health_from(components: &BTreeMap<String, ComponentHealth>) -> HealthResponse {
    let healthy = components.values().all(ComponentHealth::is_alive);
    HealthResponse {
        status: if healthy { "healthy" } else { "degraded" }.to_string(),
        components: components
            .iter()
            .map(|(name, health)| {
                (
                    name.clone(),
                    ComponentStatus {
                        status: health.phase.as_str().to_string(),
                        message: health.message.clone(),
                    },
                )
            })
            .collect(),
    }
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let components = state.health().read().await;
    Json(health_from(&components))
}

pub async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let (health, restarts) = {
        let components = state.health().read().await;
        let restarts = components
            .iter()
            .map(|(name, h)| (name.clone(), h.restart_count))
            .collect();
        (health_from(&components), restarts)
    };
    let cycle = state.cycle_state().await;

    Json(StatusResponse {
        health,
        timestamp: Utc::now(),
        started_at: state.started_at(),
        last_cycle: LastCycle::from(&cycle),
        orchestrator: state.orchestrator().status().await,
        restarts,
        rate_limits: state.registry().all_stats().await,
        alerts: state.registry().alerts().await,
    })
}

pub async fn metrics(State(state): State<Arc<AppState>>) -> Json<MetricsResponse> {
    let cycle = state.cycle_state().await;

    let tasks = match &cycle.queue {
        Some(queue) => TaskCounts {
            total: queue.total_tasks,
            by_priority: queue.by_priority.clone(),
        },
        None => TaskCounts {
            total: 0,
            by_priority: BTreeMap::new(),
        },
    };

    Json(MetricsResponse {
        tasks,
        coverage: cycle.coverage.clone(),
        s3_inventory: cycle.inventory.as_ref().map(|inv| InventoryMetrics {
            total_objects: inv.total_objects,
            total_size_gb: inv.total_size_bytes as f64 / BYTES_PER_GB,
        }),
        rate_limits: state.registry().all_stats().await,
        orchestrator: state.orchestrator().status().await,
    })
}

pub async fn prometheus_metrics(State(state): State<Arc<AppState>>) -> Response {
    collect_dynamic_metrics(&state).await;

    match encode_metrics() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("failed to encode metrics: {e}"),
        )
            .into_response(),
    }
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<SanitizedConfig> {
    Json(state.sanitized_config())
}

#[cfg(test)]
mod tests {
    use super::*;
    use courtwatch_core::ComponentPhase;

    fn component(name: &str, phase: ComponentPhase) -> (String, ComponentHealth) {
        let mut health = ComponentHealth::new(name);
        health.phase = phase;
        (name.to_string(), health)
    }

    #[test]
    fn test_all_alive_is_healthy() {
        let components = BTreeMap::from([
            component("cycle", ComponentPhase::Alive),
            component("monitor", ComponentPhase::Alive),
        ]);
        let health = health_from(&components);
        assert_eq!(health.status, "healthy");
        assert_eq!(health.components["cycle"].status, "alive");
    }

    #[test]
    fn test_backoff_component_is_degraded() {
        let components = BTreeMap::from([
            component("cycle", ComponentPhase::Backoff),
            component("monitor", ComponentPhase::Alive),
        ]);
        let health = health_from(&components);
        assert_eq!(health.status, "degraded");
        assert_eq!(health.components["cycle"].status, "backoff");
    }
}
