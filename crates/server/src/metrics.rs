//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the courtwatch daemon:
//! - HTTP request metrics (latency, counts)
//! - Orchestrator, queue and coverage state (collected dynamically)
//! - Supervised component liveness (collected dynamically)
//!
//! Rate limiting, task and approval counters live in the core crate and are
//! registered here alongside.

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, Gauge, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};

use courtwatch_core::TaskPriority;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "courtwatch_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("courtwatch_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "courtwatch_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Daemon State (collected dynamically)
// =============================================================================

/// Orchestrator running state (1 = running, 0 = idle).
pub static ORCHESTRATOR_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "courtwatch_orchestrator_running",
        "Whether a task queue run is in progress (1) or not (0)",
    )
    .unwrap()
});

/// Tasks still queued in the current run.
pub static ORCHESTRATOR_PENDING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "courtwatch_orchestrator_pending_tasks",
        "Tasks waiting for a worker slot in the current run",
    )
    .unwrap()
});

/// Tasks in the last generated queue, by priority.
pub static QUEUE_TASKS: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new(
            "courtwatch_queue_tasks",
            "Tasks in the last generated queue by priority",
        ),
        &["priority"],
    )
    .unwrap()
});

/// Overall completeness of the last reconciliation, in percent.
pub static COVERAGE_COMPLETENESS: Lazy<Gauge> = Lazy::new(|| {
    Gauge::new(
        "courtwatch_coverage_completeness_pct",
        "Overall completeness of the last reconciliation",
    )
    .unwrap()
});

/// Supervised component liveness (1 = alive).
pub static COMPONENT_ALIVE: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("courtwatch_component_alive", "Whether a component is alive"),
        &["component"],
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // Daemon state
    registry
        .register(Box::new(ORCHESTRATOR_RUNNING.clone()))
        .unwrap();
    registry
        .register(Box::new(ORCHESTRATOR_PENDING.clone()))
        .unwrap();
    registry.register(Box::new(QUEUE_TASKS.clone())).unwrap();
    registry
        .register(Box::new(COVERAGE_COMPLETENESS.clone()))
        .unwrap();
    registry.register(Box::new(COMPONENT_ALIVE.clone())).unwrap();

    // Core metrics (rate limiting, tasks, supervisor, approvals)
    for metric in courtwatch_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Collect dynamic metrics from current application state.
///
/// Called before encoding so the gauges reflect the latest snapshots.
pub async fn collect_dynamic_metrics(state: &crate::state::AppState) {
    let status = state.orchestrator().status().await;
    ORCHESTRATOR_RUNNING.set(i64::from(status.running));
    ORCHESTRATOR_PENDING.set(status.pending as i64);

    let cycle = state.cycle_state().await;
    if let Some(queue) = &cycle.queue {
        for priority in TaskPriority::ALL {
            let count = queue.by_priority.get(priority.as_str()).copied().unwrap_or(0);
            QUEUE_TASKS
                .with_label_values(&[priority.as_str()])
                .set(count as i64);
        }
    }
    if let Some(coverage) = &cycle.coverage {
        COVERAGE_COMPLETENESS.set(coverage.overall_completeness_pct);
    }

    for (name, health) in state.health().read().await.iter() {
        COMPONENT_ALIVE
            .with_label_values(&[name.as_str()])
            .set(i64::from(health.is_alive()));
    }
}

/// Normalize a path for metric labels (replace IDs with placeholders).
///
/// Task ids are hex digests and approval ids are UUIDs; both would explode
/// label cardinality.
pub fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| if looks_like_id(segment) { "{id}" } else { segment })
        .collect::<Vec<_>>()
        .join("/")
}

fn looks_like_id(segment: &str) -> bool {
    if segment.is_empty() {
        return false;
    }
    if segment.chars().all(|c| c.is_ascii_digit()) {
        return true;
    }
    segment.len() >= 16 && segment.chars().all(|c| c.is_ascii_hexdigit() || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_uuid() {
        let path = "/approvals/550e8400-e29b-41d4-a716-446655440000/approve";
        assert_eq!(normalize_path(path), "/approvals/{id}/approve");
    }

    #[test]
    fn test_normalize_path_task_id() {
        assert_eq!(normalize_path("/tasks/9f86d081884c7d65"), "/tasks/{id}");
    }

    #[test]
    fn test_normalize_path_numeric() {
        assert_eq!(normalize_path("/seasons/2024"), "/seasons/{id}");
    }

    #[test]
    fn test_normalize_path_no_ids() {
        assert_eq!(normalize_path("/metrics/prometheus"), "/metrics/prometheus");
        assert_eq!(normalize_path("/"), "/");
    }

    #[test]
    fn test_encode_metrics_returns_prometheus_format() {
        HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/test", "200"])
            .inc();

        let output = encode_metrics().unwrap();
        assert!(output.contains("courtwatch_http_requests_total"));
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE"));
    }

    #[test]
    fn test_registry_contains_core_metrics() {
        courtwatch_core::metrics::RATE_LIMIT_HITS
            .with_label_values(&["metrics-test.example"])
            .inc();
        ORCHESTRATOR_RUNNING.set(0);
        QUEUE_TASKS.with_label_values(&["critical"]).set(0);

        let output = encode_metrics().unwrap();

        assert!(output.contains("courtwatch_orchestrator_running"));
        assert!(output.contains("courtwatch_queue_tasks"));
        assert!(output.contains("metrics-test.example"));
    }
}
