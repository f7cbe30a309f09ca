//! Health monitor endpoint tests against an in-process router.

mod common;

use std::collections::HashMap;

use axum::http::StatusCode;
use chrono::Utc;
use serde_json::json;

use common::{fixtures, TestFixture};
use courtwatch_core::{
    coverage::CoverageSummary,
    generate_task_queue,
    orchestrator::InventoryTotals,
    ComponentPhase, GateDecision, MetricChange, Severity, TaskQueueConfig, TaskQueueStore,
};

fn coverage_change(old_value: f64, new_value: f64) -> MetricChange {
    MetricChange {
        metric_category: "coverage".to_string(),
        metric_name: "completeness_threshold".to_string(),
        old_value,
        new_value,
        severity: Severity::Medium,
        requested_by: "tuner".to_string(),
    }
}

fn pending_request_id(fixture: &TestFixture) -> String {
    match fixture.gate.propose(coverage_change(0.8, 0.5)).unwrap() {
        GateDecision::PendingApproval(request) => request.id,
        other => panic!("expected a pending request, got {other:?}"),
    }
}

// ============================================================================
// Health and status
// ============================================================================

#[tokio::test]
async fn test_health_all_alive() {
    let fixture = TestFixture::new().await;

    let response = fixture.get("/health").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "healthy");
    assert_eq!(response.body["components"]["cycle"]["status"], "alive");
    assert_eq!(response.body["components"]["monitor"]["status"], "alive");
    assert!(response.body["components"]["cycle"].get("message").is_none());
}

#[tokio::test]
async fn test_health_degraded_when_component_backs_off() {
    let fixture = TestFixture::new().await;
    {
        let mut health = fixture.health.write().await;
        let cycle = health.get_mut("cycle").unwrap();
        cycle.phase = ComponentPhase::Backoff;
        cycle.message = Some("5 restarts within 600s".to_string());
    }

    let response = fixture.get("/health").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "degraded");
    assert_eq!(response.body["components"]["cycle"]["status"], "backoff");
    assert_eq!(
        response.body["components"]["cycle"]["message"],
        "5 restarts within 600s"
    );
}

#[tokio::test]
async fn test_status_document() {
    let fixture = TestFixture::new().await;
    fixture
        .registry
        .record_response("espn.example", 200, &HashMap::new())
        .await;
    {
        let mut health = fixture.health.write().await;
        health.get_mut("monitor").unwrap().restart_count = 2;
    }
    {
        let mut cycle = fixture.cycle.write().await;
        cycle.cycles_completed = 3;
        cycle.last_started_at = Some(Utc::now());
        cycle.last_error = Some("inventory manifest missing".to_string());
    }

    let response = fixture.get("/status").await;

    assert_eq!(response.status, StatusCode::OK);
    let body = &response.body;
    assert_eq!(body["status"], "healthy");
    assert!(body["timestamp"].is_string());
    assert!(body["started_at"].is_string());
    assert_eq!(body["last_cycle"]["cycles_completed"], 3);
    assert_eq!(body["last_cycle"]["error"], "inventory manifest missing");
    assert_eq!(body["orchestrator"]["running"], false);
    assert_eq!(body["restarts"]["monitor"], 2);
    assert_eq!(body["restarts"]["cycle"], 0);

    let limits = body["rate_limits"].as_array().unwrap();
    assert_eq!(limits.len(), 1);
    assert_eq!(limits[0]["domain"], "espn.example");
    assert!(body["alerts"].is_array());
}

// ============================================================================
// Metrics
// ============================================================================

#[tokio::test]
async fn test_metrics_before_first_cycle() {
    let fixture = TestFixture::new().await;

    let response = fixture.get("/metrics").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["tasks"]["total"], 0);
    assert!(response.body.get("coverage").is_none());
    assert!(response.body.get("s3_inventory").is_none());
    assert!(response.body["rate_limits"].is_array());
    assert_eq!(response.body["orchestrator"]["running"], false);
}

#[tokio::test]
async fn test_metrics_after_cycle() {
    let fixture = TestFixture::new().await;
    let queue = generate_task_queue(
        &[
            fixtures::gap("espn", 2021, "box_scores", 100),
            fixtures::gap("bref", 2021, "box_scores", 10),
        ],
        &TaskQueueConfig::default(),
        Utc::now(),
    );
    {
        let mut cycle = fixture.cycle.write().await;
        cycle.queue = Some(queue.summary());
        cycle.coverage = Some(CoverageSummary {
            total_expected: 2460,
            total_actual: 2350,
            total_missing: 110,
            overall_completeness_pct: 95.5,
            ..Default::default()
        });
        cycle.inventory = Some(InventoryTotals {
            total_objects: 2350,
            total_size_bytes: 2 * 1024 * 1024 * 1024,
        });
    }

    let response = fixture.get("/metrics").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["tasks"]["total"], 2);
    assert_eq!(response.body["coverage"]["total_missing"], 110);
    assert_eq!(response.body["s3_inventory"]["total_objects"], 2350);
    assert_eq!(response.body["s3_inventory"]["total_size_gb"], 2.0);
}

#[tokio::test]
async fn test_prometheus_exposition() {
    let fixture = TestFixture::new().await;
    // Make sure at least one request has been counted.
    fixture.get("/health").await;

    let response = fixture.get("/metrics/prometheus").await;

    assert_eq!(response.status, StatusCode::OK);
    assert!(response.text.contains("courtwatch_http_requests_total"));
    assert!(response.text.contains("courtwatch_orchestrator_running"));
    assert!(response.text.contains("courtwatch_component_alive"));
}

// ============================================================================
// Tasks
// ============================================================================

#[tokio::test]
async fn test_tasks_missing_queue_is_404() {
    let fixture = TestFixture::new().await;

    let response = fixture.get("/tasks").await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert!(response.body["error"]
        .as_str()
        .unwrap()
        .contains("task_queue.json"));
}

#[tokio::test]
async fn test_tasks_summarizes_queue_file() {
    let fixture = TestFixture::new().await;
    let queue = generate_task_queue(
        &[
            fixtures::gap("espn", 2021, "box_scores", 100),
            fixtures::gap("espn", 2022, "box_scores", 50),
            fixtures::gap("bref", 2021, "box_scores", 10),
        ],
        &TaskQueueConfig::default(),
        Utc::now(),
    );
    TaskQueueStore::new(&fixture.config.paths.task_queue)
        .write(&queue)
        .unwrap();

    let response = fixture.get("/tasks").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["total_tasks"], 3);
    assert_eq!(response.body["by_source"]["espn"], 2);
    assert_eq!(response.body["by_source"]["bref"], 1);
    assert!(response.body["generated_at"].is_string());
    assert!(response.body["estimated_total_minutes"].as_f64().unwrap() > 0.0);
    // The summary does not carry the task list itself.
    assert!(response.body.get("tasks").is_none());
}

// ============================================================================
// Approvals
// ============================================================================

#[tokio::test]
async fn test_list_pending_approvals() {
    let fixture = TestFixture::new().await;
    let id = pending_request_id(&fixture);
    // Small drift on a critical metric goes straight through.
    fixture.gate.propose(coverage_change(0.8, 0.82)).unwrap();

    let response = fixture.get("/approvals").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["total"], 1);
    assert_eq!(response.body["approvals"][0]["id"], id.as_str());
    assert_eq!(response.body["approvals"][0]["status"], "pending");
}

#[tokio::test]
async fn test_approve_then_conflict() {
    let fixture = TestFixture::new().await;
    let id = pending_request_id(&fixture);

    let response = fixture
        .post(
            &format!("/approvals/{id}/approve"),
            json!({ "reviewer": "alice", "notes": "expected after schedule change" }),
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "approved");
    assert_eq!(response.body["reviewed_by"], "alice");
    assert_eq!(response.body["review_notes"], "expected after schedule change");

    let again = fixture.post_empty(&format!("/approvals/{id}/reject")).await;
    assert_eq!(again.status, StatusCode::CONFLICT);

    let pending = fixture.get("/approvals").await;
    assert_eq!(pending.body["total"], 0);
}

#[tokio::test]
async fn test_reject_without_body_uses_default_reviewer() {
    let fixture = TestFixture::new().await;
    let id = pending_request_id(&fixture);

    let response = fixture.post_empty(&format!("/approvals/{id}/reject")).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "rejected");
    assert_eq!(response.body["reviewed_by"], "api");

    let fetched = fixture.get(&format!("/approvals/{id}")).await;
    assert_eq!(fetched.status, StatusCode::OK);
    assert_eq!(fetched.body["status"], "rejected");
}

#[tokio::test]
async fn test_unknown_approval_is_404() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post_empty("/approvals/00000000-0000-0000-0000-000000000000/approve")
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    let response = fixture.get("/approvals/does-not-exist").await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

// ============================================================================
// Config
// ============================================================================

#[tokio::test]
async fn test_config_is_sanitized() {
    let fixture = TestFixture::new().await;

    let response = fixture.get("/config").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["server"]["port"], 0);
    assert!(response.body["rate_limit"]["overridden_domains"].is_array());
    assert!(response.body["rate_limit"].get("domains").is_none());
    assert_eq!(response.body["approval"]["critical_metrics"][0], "coverage.*");
    // Process control settings are CLI-side only.
    assert!(response.body.get("controller").is_none());
}
