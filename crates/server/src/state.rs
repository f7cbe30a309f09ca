use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use courtwatch_core::{
    supervisor::HealthHandle, ApprovalGate, Config, CycleState, RateLimitRegistry,
    SanitizedConfig, TaskOrchestrator,
};

/// Shared application state
///
/// The cycle and health handles are written by the daemon's background
/// tasks; handlers only take short read locks on them.
pub struct AppState {
    config: Config,
    started_at: DateTime<Utc>,
    cycle: Arc<RwLock<CycleState>>,
    health: HealthHandle,
    registry: Arc<RateLimitRegistry>,
    orchestrator: Arc<TaskOrchestrator>,
    gate: Arc<ApprovalGate>,
}

impl AppState {
    pub fn new(
        config: Config,
        cycle: Arc<RwLock<CycleState>>,
        health: HealthHandle,
        registry: Arc<RateLimitRegistry>,
        orchestrator: Arc<TaskOrchestrator>,
        gate: Arc<ApprovalGate>,
    ) -> Self {
        Self {
            config,
            started_at: Utc::now(),
            cycle,
            health,
            registry,
            orchestrator,
            gate,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub async fn cycle_state(&self) -> CycleState {
        self.cycle.read().await.clone()
    }

    pub fn health(&self) -> &HealthHandle {
        &self.health
    }

    pub fn registry(&self) -> &RateLimitRegistry {
        &self.registry
    }

    pub fn orchestrator(&self) -> &TaskOrchestrator {
        &self.orchestrator
    }

    pub fn gate(&self) -> &ApprovalGate {
        &self.gate
    }
}
