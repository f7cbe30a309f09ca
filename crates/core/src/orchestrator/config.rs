//! Orchestrator configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the task orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Maximum tasks executing at once.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Attempts per task before it is marked failed.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Upper bound on one attempt, rate-limit wait included (seconds).
    #[serde(default = "default_task_timeout")]
    pub task_timeout_secs: u64,

    /// Retry backoff unit; attempt `n` waits `n` times this (milliseconds).
    #[serde(default = "default_retry_base_delay")]
    pub retry_base_delay_ms: u64,

    /// Mark every task skipped instead of dispatching it.
    #[serde(default)]
    pub dry_run: bool,
}

fn default_max_concurrent() -> usize {
    4
}

fn default_max_attempts() -> u32 {
    3
}

fn default_task_timeout() -> u64 {
    300 // 5 minutes
}

fn default_retry_base_delay() -> u64 {
    5000
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            max_attempts: default_max_attempts(),
            task_timeout_secs: default_task_timeout(),
            retry_base_delay_ms: default_retry_base_delay(),
            dry_run: false,
        }
    }
}

impl OrchestratorConfig {
    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_secs)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.max_concurrent, 4);
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.task_timeout(), Duration::from_secs(300));
        assert_eq!(config.retry_base_delay(), Duration::from_secs(5));
        assert!(!config.dry_run);
    }

    #[test]
    fn test_deserialize_minimal() {
        let config: OrchestratorConfig = toml::from_str("max_concurrent = 8").unwrap();
        assert_eq!(config.max_concurrent, 8);
        assert_eq!(config.max_attempts, 3);
    }

    #[test]
    fn test_deserialize_full() {
        let toml = r#"
            max_concurrent = 2
            max_attempts = 5
            task_timeout_secs = 60
            retry_base_delay_ms = 250
            dry_run = true
        "#;
        let config: OrchestratorConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.max_concurrent, 2);
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.task_timeout_secs, 60);
        assert_eq!(config.retry_base_delay_ms, 250);
        assert!(config.dry_run);
    }
}
