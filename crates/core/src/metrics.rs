//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Adaptive rate limiting (429s, adjustments, current rates)
//! - Task execution (attempts, durations, outcomes)
//! - Reconciliation, supervision and approvals

use once_cell::sync::Lazy;
use prometheus::{GaugeVec, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Rate Limiting
// =============================================================================

/// 429 responses by domain.
pub static RATE_LIMIT_HITS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "courtwatch_rate_limit_hits_total",
            "Total 429 responses received",
        ),
        &["domain"],
    )
    .unwrap()
});

/// Rate adjustments by domain and direction.
pub static RATE_ADJUSTMENTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "courtwatch_rate_adjustments_total",
            "Total rate adjustments made by the adaptive limiter",
        ),
        &["domain", "direction"], // "increase", "decrease"
    )
    .unwrap()
});

/// Current request rate per domain.
pub static CURRENT_RATE: Lazy<GaugeVec> = Lazy::new(|| {
    GaugeVec::new(
        Opts::new(
            "courtwatch_current_rate",
            "Current allowed requests per second",
        ),
        &["domain"],
    )
    .unwrap()
});

// =============================================================================
// Tasks
// =============================================================================

/// Task attempts by result.
pub static TASK_ATTEMPTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("courtwatch_task_attempts_total", "Total task attempts"),
        &["result"], // "succeeded", "failed", "timed_out", "cancelled"
    )
    .unwrap()
});

/// Task execution duration in seconds.
pub static TASK_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "courtwatch_task_duration_seconds",
            "Duration of a single task attempt",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 300.0]),
        &["source"],
    )
    .unwrap()
});

/// Tasks currently running.
pub static TASKS_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("courtwatch_tasks_running", "Tasks currently running").unwrap()
});

// =============================================================================
// Cycles, supervision, approvals
// =============================================================================

/// Reconciliation cycles by result.
pub static CYCLES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("courtwatch_cycles_total", "Total reconciliation cycles"),
        &["result"], // "ok", "error"
    )
    .unwrap()
});

/// Component restarts performed by the supervisor.
pub static COMPONENT_RESTARTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "courtwatch_component_restarts_total",
            "Total component restarts by the supervisor",
        ),
        &["component"],
    )
    .unwrap()
});

/// Restart attempts refused by the restart-storm guard.
pub static RESTARTS_SUPPRESSED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "courtwatch_restarts_suppressed_total",
        "Restarts skipped because the restart budget was exhausted",
    )
    .unwrap()
});

/// Approval gate decisions.
pub static APPROVAL_DECISIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "courtwatch_approval_decisions_total",
            "Approval gate outcomes",
        ),
        &["outcome"], // "applied", "pending", "approved", "rejected"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Rate limiting
        Box::new(RATE_LIMIT_HITS.clone()),
        Box::new(RATE_ADJUSTMENTS.clone()),
        Box::new(CURRENT_RATE.clone()),
        // Tasks
        Box::new(TASK_ATTEMPTS.clone()),
        Box::new(TASK_DURATION.clone()),
        Box::new(TASKS_RUNNING.clone()),
        // Cycles, supervision, approvals
        Box::new(CYCLES_TOTAL.clone()),
        Box::new(COMPONENT_RESTARTS.clone()),
        Box::new(RESTARTS_SUPPRESSED.clone()),
        Box::new(APPROVAL_DECISIONS.clone()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::Registry;

    #[test]
    fn test_all_metrics_register() {
        let registry = Registry::new();
        for metric in all_metrics() {
            registry.register(metric).unwrap();
        }
    }
}
