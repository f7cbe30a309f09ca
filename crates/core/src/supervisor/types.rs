//! Supervisor health types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentPhase {
    Alive,
    Restarting,
    /// Restart budget exhausted; waiting for the window to drain.
    Backoff,
}

impl ComponentPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentPhase::Alive => "alive",
            ComponentPhase::Restarting => "restarting",
            ComponentPhase::Backoff => "backoff",
        }
    }
}

/// Health of one supervised component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub name: String,
    pub phase: ComponentPhase,
    pub restart_count: u32,
    pub last_restart: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ComponentHealth {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            phase: ComponentPhase::Alive,
            restart_count: 0,
            last_restart: None,
            message: None,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.phase == ComponentPhase::Alive
    }
}
