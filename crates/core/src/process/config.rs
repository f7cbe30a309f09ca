//! Process controller configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// How long a freshly started daemon must stay alive to count as started.
    #[serde(default = "default_start_grace")]
    pub start_grace_ms: u64,

    /// Wait after SIGTERM before escalating to SIGKILL.
    #[serde(default = "default_stop_timeout")]
    pub stop_timeout_secs: u64,

    /// Liveness polling interval while stopping, and log polling when following.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Timeout for requests to the health monitor.
    #[serde(default = "default_health_timeout")]
    pub health_timeout_secs: u64,
}

fn default_start_grace() -> u64 {
    2000
}

fn default_stop_timeout() -> u64 {
    10
}

fn default_poll_interval() -> u64 {
    200
}

fn default_health_timeout() -> u64 {
    5
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            start_grace_ms: default_start_grace(),
            stop_timeout_secs: default_stop_timeout(),
            poll_interval_ms: default_poll_interval(),
            health_timeout_secs: default_health_timeout(),
        }
    }
}

impl ControllerConfig {
    pub fn start_grace(&self) -> Duration {
        Duration::from_millis(self.start_grace_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(10))
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_secs(self.health_timeout_secs)
    }
}
