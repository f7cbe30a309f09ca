//! Approval gate configuration.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalConfig {
    /// Drift (percent) at or above which a critical metric needs review.
    #[serde(default = "default_threshold_pct")]
    pub threshold_pct: f64,

    /// Metrics guarded by the gate, as `category.name` or `category.*`.
    #[serde(default)]
    pub critical_metrics: Vec<String>,
}

fn default_threshold_pct() -> f64 {
    10.0
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            threshold_pct: default_threshold_pct(),
            critical_metrics: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_toml() {
        let config: ApprovalConfig = toml::from_str("").unwrap();
        assert_eq!(config.threshold_pct, 10.0);
        assert!(config.critical_metrics.is_empty());
    }
}
