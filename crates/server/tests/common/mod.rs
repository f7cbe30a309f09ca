//! Common test utilities for the health monitor API.
//!
//! This module provides a test fixture that builds the router in process,
//! with handles to the shared state the daemon's background tasks would
//! normally write.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tokio::sync::RwLock;
use tower::ServiceExt;

use courtwatch_core::{
    supervisor::HealthHandle, ApprovalConfig, ApprovalGate, ComponentHealth, Config, CycleState,
    OrchestratorConfig, RateLimitRegistry, SqliteApprovalStore, TaskOrchestrator,
};

/// Re-export fixtures for test convenience
pub use courtwatch_core::testing::fixtures;

/// Test fixture for API testing.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_health() {
///     let fixture = TestFixture::new().await;
///     let response = fixture.get("/health").await;
///     assert_eq!(response.status, StatusCode::OK);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    pub config: Config,
    /// Published cycle state, as the cycle loop would write it
    pub cycle: Arc<RwLock<CycleState>>,
    /// Component health, as the supervisor would write it
    pub health: HealthHandle,
    pub registry: Arc<RateLimitRegistry>,
    pub gate: Arc<ApprovalGate>,
    /// Temporary directory holding the task queue file
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
    pub text: String,
}

impl TestFixture {
    pub async fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");

        let mut config = Config::default();
        config.server.port = 0; // Not used for in-process testing
        config.paths.task_queue = temp_dir.path().join("data/task_queue.json");
        config.paths.coverage_report = temp_dir.path().join("data/coverage_report.json");
        config.rate_limit = fixtures::fast_rate_limits();
        config.approval = ApprovalConfig {
            threshold_pct: 10.0,
            critical_metrics: vec!["coverage.*".to_string()],
        };

        let cycle = Arc::new(RwLock::new(CycleState::default()));
        let health: HealthHandle = Arc::new(RwLock::new(BTreeMap::from([
            ("cycle".to_string(), ComponentHealth::new("cycle")),
            ("monitor".to_string(), ComponentHealth::new("monitor")),
        ])));
        let registry = Arc::new(RateLimitRegistry::new(config.rate_limit.clone()));
        let orchestrator = Arc::new(TaskOrchestrator::new(
            OrchestratorConfig::default(),
            Arc::clone(&registry),
        ));
        let store = SqliteApprovalStore::in_memory().expect("Failed to create approval store");
        let gate = Arc::new(ApprovalGate::new(config.approval.clone(), Arc::new(store)));

        let state = Arc::new(courtwatch_server::state::AppState::new(
            config.clone(),
            Arc::clone(&cycle),
            Arc::clone(&health),
            Arc::clone(&registry),
            orchestrator,
            Arc::clone(&gate),
        ));
        let router = courtwatch_server::api::create_router(state);

        Self {
            router,
            config,
            cycle,
            health,
            registry,
            gate,
            temp_dir,
        }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a POST request without a body.
    pub async fn post_empty(&self, path: &str) -> TestResponse {
        self.request("POST", path, None).await
    }

    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        let request = request_builder.body(body).unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let text = String::from_utf8_lossy(&body_bytes).into_owned();
        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body, text }
    }
}
