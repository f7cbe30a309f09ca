use super::{types::Config, ConfigError};
use crate::ratelimit::RateLimits;

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Rate limits (defaults and every override): 0 < min <= initial <= max,
///   0 < adaptation_factor < 1
/// - Orchestrator: at least one worker and one attempt
/// - Season boundary month within 1..=12
/// - Approval threshold is not negative
/// - Supervisor and cycle intervals are not zero
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Server validation
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    validate_limits("rate_limit", &config.rate_limit.limits_for(""))?;
    for domain in config.rate_limit.domains.keys() {
        validate_limits(
            &format!("rate_limit.domains.\"{domain}\""),
            &config.rate_limit.limits_for(domain),
        )?;
    }
    if !(0.0..=1.0).contains(&config.rate_limit.alert_min_success_rate) {
        return Err(ConfigError::ValidationError(
            "rate_limit.alert_min_success_rate must be within 0..=1".to_string(),
        ));
    }

    if config.orchestrator.max_concurrent == 0 {
        return Err(ConfigError::ValidationError(
            "orchestrator.max_concurrent must be at least 1".to_string(),
        ));
    }
    if config.orchestrator.max_attempts == 0 {
        return Err(ConfigError::ValidationError(
            "orchestrator.max_attempts must be at least 1".to_string(),
        ));
    }

    if !(1..=12).contains(&config.reconciliation.season_start_month) {
        return Err(ConfigError::ValidationError(format!(
            "reconciliation.season_start_month must be within 1..=12, got {}",
            config.reconciliation.season_start_month
        )));
    }
    if config.reconciliation.cycle_interval_secs == 0 {
        return Err(ConfigError::ValidationError(
            "reconciliation.cycle_interval_secs cannot be 0".to_string(),
        ));
    }

    if !(config.approval.threshold_pct >= 0.0) {
        return Err(ConfigError::ValidationError(
            "approval.threshold_pct cannot be negative".to_string(),
        ));
    }

    if config.supervisor.check_interval_secs == 0 {
        return Err(ConfigError::ValidationError(
            "supervisor.check_interval_secs cannot be 0".to_string(),
        ));
    }

    Ok(())
}

fn validate_limits(section: &str, limits: &RateLimits) -> Result<(), ConfigError> {
    if !(limits.adaptation_factor > 0.0 && limits.adaptation_factor < 1.0) {
        return Err(ConfigError::ValidationError(format!(
            "{section}: adaptation_factor must be strictly between 0 and 1, got {}",
            limits.adaptation_factor
        )));
    }
    if !(limits.min_rate > 0.0) {
        return Err(ConfigError::ValidationError(format!(
            "{section}: min_rate must be positive"
        )));
    }
    if !(limits.min_rate <= limits.initial_rate && limits.initial_rate <= limits.max_rate) {
        return Err(ConfigError::ValidationError(format!(
            "{section}: expected min_rate <= initial_rate <= max_rate, got {} / {} / {}",
            limits.min_rate, limits.initial_rate, limits.max_rate
        )));
    }
    if limits.burst_capacity == Some(0) {
        return Err(ConfigError::ValidationError(format!(
            "{section}: burst_capacity cannot be 0"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{load_config_from_str, ServerConfig};
    use crate::ratelimit::DomainRateOverride;
    use std::net::IpAddr;

    fn invalid(toml: &str) -> ConfigError {
        let config = load_config_from_str(toml).unwrap();
        validate_config(&config).unwrap_err()
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let config = Config {
            server: ServerConfig {
                host: "0.0.0.0".parse::<IpAddr>().unwrap(),
                port: 0,
            },
            ..Default::default()
        };
        let result = validate_config(&config);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_validate_adaptation_factor_bounds() {
        let err = invalid("[rate_limit]\nadaptation_factor = 1.0\n");
        assert!(err.to_string().contains("adaptation_factor"));
        invalid("[rate_limit]\nadaptation_factor = 0.0\n");
    }

    #[test]
    fn test_validate_rate_ordering() {
        let err = invalid("[rate_limit]\ninitial_rate = 20.0\nmax_rate = 10.0\n");
        assert!(err.to_string().contains("min_rate <= initial_rate <= max_rate"));
        invalid("[rate_limit]\nmin_rate = 3.0\ninitial_rate = 2.0\n");
    }

    #[test]
    fn test_validate_domain_override() {
        let mut config = Config::default();
        config.rate_limit.domains.insert(
            "stats.example".to_string(),
            DomainRateOverride {
                max_rate: Some(0.05),
                ..Default::default()
            },
        );
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("stats.example"));
    }

    #[test]
    fn test_validate_orchestrator() {
        invalid("[orchestrator]\nmax_concurrent = 0\n");
        invalid("[orchestrator]\nmax_attempts = 0\n");
    }

    #[test]
    fn test_validate_season_month() {
        invalid("[reconciliation]\nseason_start_month = 0\n");
        invalid("[reconciliation]\nseason_start_month = 13\n");
        let ok = load_config_from_str("[reconciliation]\nseason_start_month = 12\n").unwrap();
        assert!(validate_config(&ok).is_ok());
    }

    #[test]
    fn test_validate_approval_threshold() {
        invalid("[approval]\nthreshold_pct = -1.0\n");
    }
}
