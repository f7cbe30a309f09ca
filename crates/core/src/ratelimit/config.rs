//! Rate limiter configuration.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Defaults applied to every domain, with optional per-domain overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Starting rate in requests per second.
    #[serde(default = "default_initial_rate")]
    pub initial_rate: f64,

    /// Floor the controller never goes below.
    #[serde(default = "default_min_rate")]
    pub min_rate: f64,

    /// Ceiling the controller never exceeds.
    #[serde(default = "default_max_rate")]
    pub max_rate: f64,

    /// Multiplicative decrease on 429 (0 < f < 1).
    #[serde(default = "default_adaptation_factor")]
    pub adaptation_factor: f64,

    /// Fixed bucket capacity. When unset the capacity follows the current rate.
    #[serde(default)]
    pub burst_capacity: Option<u32>,

    /// Alert once a domain sees this many 429s in a row.
    #[serde(default = "default_alert_consecutive_429s")]
    pub alert_consecutive_429s: u32,

    /// Alert when the success rate drops below this (after 10 requests).
    #[serde(default = "default_alert_min_success_rate")]
    pub alert_min_success_rate: f64,

    /// Per-domain overrides keyed by host name.
    #[serde(default)]
    pub domains: HashMap<String, DomainRateOverride>,
}

/// Per-domain override; unset fields inherit the defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DomainRateOverride {
    pub initial_rate: Option<f64>,
    pub min_rate: Option<f64>,
    pub max_rate: Option<f64>,
    pub adaptation_factor: Option<f64>,
    pub burst_capacity: Option<u32>,
}

/// Fully resolved limits for one domain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimits {
    pub initial_rate: f64,
    pub min_rate: f64,
    pub max_rate: f64,
    pub adaptation_factor: f64,
    pub burst_capacity: Option<u32>,
}

impl RateLimitConfig {
    /// Resolve the limits for `domain`, applying its override if any.
    pub fn limits_for(&self, domain: &str) -> RateLimits {
        let base = RateLimits {
            initial_rate: self.initial_rate,
            min_rate: self.min_rate,
            max_rate: self.max_rate,
            adaptation_factor: self.adaptation_factor,
            burst_capacity: self.burst_capacity,
        };

        match self.domains.get(domain) {
            Some(o) => RateLimits {
                initial_rate: o.initial_rate.unwrap_or(base.initial_rate),
                min_rate: o.min_rate.unwrap_or(base.min_rate),
                max_rate: o.max_rate.unwrap_or(base.max_rate),
                adaptation_factor: o.adaptation_factor.unwrap_or(base.adaptation_factor),
                burst_capacity: o.burst_capacity.or(base.burst_capacity),
            },
            None => base,
        }
    }
}

fn default_initial_rate() -> f64 {
    2.0
}

fn default_min_rate() -> f64 {
    0.1
}

fn default_max_rate() -> f64 {
    10.0
}

fn default_adaptation_factor() -> f64 {
    0.8
}

fn default_alert_consecutive_429s() -> u32 {
    3
}

fn default_alert_min_success_rate() -> f64 {
    0.8
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            initial_rate: default_initial_rate(),
            min_rate: default_min_rate(),
            max_rate: default_max_rate(),
            adaptation_factor: default_adaptation_factor(),
            burst_capacity: None,
            alert_consecutive_429s: default_alert_consecutive_429s(),
            alert_min_success_rate: default_alert_min_success_rate(),
            domains: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RateLimitConfig::default();
        assert_eq!(config.initial_rate, 2.0);
        assert_eq!(config.min_rate, 0.1);
        assert_eq!(config.max_rate, 10.0);
        assert_eq!(config.adaptation_factor, 0.8);
        assert!(config.burst_capacity.is_none());
    }

    #[test]
    fn test_deserialize_with_override() {
        let toml = r#"
            initial_rate = 1.0

            [domains."www.basketball-reference.com"]
            max_rate = 0.5
            initial_rate = 0.3
        "#;
        let config: RateLimitConfig = toml::from_str(toml).unwrap();

        let bref = config.limits_for("www.basketball-reference.com");
        assert_eq!(bref.initial_rate, 0.3);
        assert_eq!(bref.max_rate, 0.5);
        assert_eq!(bref.min_rate, 0.1);

        let espn = config.limits_for("site.api.espn.com");
        assert_eq!(espn.initial_rate, 1.0);
        assert_eq!(espn.max_rate, 10.0);
    }
}
