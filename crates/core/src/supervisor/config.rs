//! Supervisor configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// How often component liveness is checked (seconds).
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,

    /// Restarts allowed per component within the restart window.
    #[serde(default = "default_max_restarts")]
    pub max_restarts: usize,

    /// Trailing window the restart budget applies to (seconds).
    #[serde(default = "default_restart_window")]
    pub restart_window_secs: u64,

    /// Minimum spacing between two restarts of one component (seconds).
    #[serde(default = "default_backoff")]
    pub backoff_secs: u64,
}

fn default_check_interval() -> u64 {
    30
}

fn default_max_restarts() -> usize {
    5
}

fn default_restart_window() -> u64 {
    600 // 10 minutes
}

fn default_backoff() -> u64 {
    10
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: default_check_interval(),
            max_restarts: default_max_restarts(),
            restart_window_secs: default_restart_window(),
            backoff_secs: default_backoff(),
        }
    }
}

impl SupervisorConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    pub fn restart_window(&self) -> Duration {
        Duration::from_secs(self.restart_window_secs)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_secs(self.backoff_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SupervisorConfig::default();
        assert_eq!(config.check_interval(), Duration::from_secs(30));
        assert_eq!(config.max_restarts, 5);
        assert_eq!(config.restart_window(), Duration::from_secs(600));
        assert_eq!(config.backoff(), Duration::from_secs(10));
    }

    #[test]
    fn test_deserialize_partial() {
        let config: SupervisorConfig = toml::from_str("max_restarts = 2").unwrap();
        assert_eq!(config.max_restarts, 2);
        assert_eq!(config.check_interval_secs, 30);
    }
}
