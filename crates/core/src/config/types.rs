use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use crate::approval::ApprovalConfig;
use crate::orchestrator::OrchestratorConfig;
use crate::process::ControllerConfig;
use crate::ratelimit::RateLimitConfig;
use crate::supervisor::SupervisorConfig;
use crate::tasks::TaskQueueConfig;

/// Root configuration. Every section has defaults, so an empty file is valid.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub reconciliation: ReconciliationConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub supervisor: SupervisorConfig,
    #[serde(default)]
    pub approval: ApprovalConfig,
    #[serde(default)]
    pub controller: ControllerConfig,
}

impl Config {
    /// Queue generation settings derived from the orchestrator and
    /// reconciliation sections.
    pub fn task_queue_config(&self) -> TaskQueueConfig {
        TaskQueueConfig {
            max_attempts: self.orchestrator.max_attempts,
            default_task_minutes: self.reconciliation.default_task_minutes,
            source_task_minutes: self.reconciliation.source_task_minutes.clone(),
        }
    }

    /// Base URL of the health monitor as seen from this host.
    pub fn monitor_url(&self) -> String {
        let host = if self.server.host.is_unspecified() {
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        } else {
            self.server.host
        };
        match host {
            IpAddr::V6(v6) => format!("http://[{v6}]:{}", self.server.port),
            IpAddr::V4(v4) => format!("http://{v4}:{}", self.server.port),
        }
    }
}

/// Health monitor listener
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}

fn default_port() -> u16 {
    8765
}

/// Files shared between the daemon and the CLI
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PathsConfig {
    #[serde(default = "default_pid_file")]
    pub pid_file: PathBuf,
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
    #[serde(default = "default_task_queue")]
    pub task_queue: PathBuf,
    #[serde(default = "default_coverage_report")]
    pub coverage_report: PathBuf,
    #[serde(default = "default_expectations")]
    pub expectations: PathBuf,
    /// JSON manifest produced by the inventory scanner
    #[serde(default = "default_inventory")]
    pub inventory: PathBuf,
    #[serde(default = "default_approvals_db")]
    pub approvals_db: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            pid_file: default_pid_file(),
            log_file: default_log_file(),
            task_queue: default_task_queue(),
            coverage_report: default_coverage_report(),
            expectations: default_expectations(),
            inventory: default_inventory(),
            approvals_db: default_approvals_db(),
        }
    }
}

fn default_pid_file() -> PathBuf {
    PathBuf::from("data/courtwatch.pid")
}

fn default_log_file() -> PathBuf {
    PathBuf::from("logs/courtwatch.log")
}

fn default_task_queue() -> PathBuf {
    PathBuf::from("data/task_queue.json")
}

fn default_coverage_report() -> PathBuf {
    PathBuf::from("data/coverage_report.json")
}

fn default_expectations() -> PathBuf {
    PathBuf::from("coverage_expectations.toml")
}

fn default_inventory() -> PathBuf {
    PathBuf::from("data/inventory.json")
}

fn default_approvals_db() -> PathBuf {
    PathBuf::from("data/approvals.db")
}

/// Reconciliation cycle settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReconciliationConfig {
    /// First month (1-12) of a new season.
    #[serde(default = "default_season_start_month")]
    pub season_start_month: u32,
    /// Files under this size are reported as quality issues.
    #[serde(default = "default_min_file_size")]
    pub min_file_size_bytes: u64,
    /// Pause between daemon cycles.
    #[serde(default = "default_cycle_interval")]
    pub cycle_interval_secs: u64,
    /// Per-task estimate for sources without their own.
    #[serde(default = "default_task_minutes")]
    pub default_task_minutes: f64,
    #[serde(default)]
    pub source_task_minutes: HashMap<String, f64>,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            season_start_month: default_season_start_month(),
            min_file_size_bytes: default_min_file_size(),
            cycle_interval_secs: default_cycle_interval(),
            default_task_minutes: default_task_minutes(),
            source_task_minutes: HashMap::new(),
        }
    }
}

fn default_season_start_month() -> u32 {
    10
}

fn default_min_file_size() -> u64 {
    1024
}

fn default_cycle_interval() -> u64 {
    3600
}

fn default_task_minutes() -> f64 {
    5.0
}

/// Read-only view served on `/config`
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub paths: PathsConfig,
    pub rate_limit: SanitizedRateLimitConfig,
    pub reconciliation: ReconciliationConfig,
    pub orchestrator: OrchestratorConfig,
    pub supervisor: SupervisorConfig,
    pub approval: ApprovalConfig,
}

/// Rate limit defaults with per-domain overrides listed by name only
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedRateLimitConfig {
    pub initial_rate: f64,
    pub min_rate: f64,
    pub max_rate: f64,
    pub adaptation_factor: f64,
    pub burst_capacity: Option<u32>,
    pub overridden_domains: Vec<String>,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        let mut overridden_domains: Vec<String> =
            config.rate_limit.domains.keys().cloned().collect();
        overridden_domains.sort();

        Self {
            server: config.server.clone(),
            paths: config.paths.clone(),
            rate_limit: SanitizedRateLimitConfig {
                initial_rate: config.rate_limit.initial_rate,
                min_rate: config.rate_limit.min_rate,
                max_rate: config.rate_limit.max_rate,
                adaptation_factor: config.rate_limit.adaptation_factor,
                burst_capacity: config.rate_limit.burst_capacity,
                overridden_domains,
            },
            reconciliation: config.reconciliation.clone(),
            orchestrator: config.orchestrator.clone(),
            supervisor: config.supervisor.clone(),
            approval: config.approval.clone(),
        }
    }
}
