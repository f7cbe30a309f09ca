//! Testing utilities and mock implementations for integration tests.
//!
//! This module provides mock implementations of the collaborator traits
//! (crawl workers, inventory scanner), so the orchestrator and cycle can be
//! exercised without any real crawling.
//!
//! # Example
//!
//! ```rust,ignore
//! use courtwatch_core::testing::{fixtures, MockWorker};
//!
//! let worker = Arc::new(MockWorker::new("espn", "espn.example"));
//! let orchestrator = TaskOrchestrator::new(config, registry).with_worker(worker.clone());
//! let summary = orchestrator
//!     .run(fixtures::queue(vec![fixtures::task("espn", 2020, TaskPriority::High)]))
//!     .await?;
//! ```

mod mock_inventory;
mod mock_worker;

pub use mock_inventory::MockInventory;
pub use mock_worker::MockWorker;

/// Test fixtures and helper functions.
pub mod fixtures {
    use chrono::Utc;
    use serde_json::json;

    use crate::coverage::{Gap, InventoryEntry};
    use crate::ratelimit::RateLimitConfig;
    use crate::tasks::{task_id, Task, TaskPriority, TaskQueue, TaskStatus};

    /// Rate limits high enough that tests never wait on a token.
    pub fn fast_rate_limits() -> RateLimitConfig {
        RateLimitConfig {
            initial_rate: 1000.0,
            min_rate: 100.0,
            max_rate: 10_000.0,
            adaptation_factor: 0.5,
            burst_capacity: Some(1000),
            ..Default::default()
        }
    }

    /// A pending box-score task.
    pub fn task(source: &str, season: i32, priority: TaskPriority) -> Task {
        Task {
            id: task_id(source, season, "box_scores"),
            source: source.to_string(),
            season,
            data_type: "box_scores".to_string(),
            priority,
            payload: json!({ "kind": "backfill", "missing_count": 10 }),
            attempts: 0,
            max_attempts: 3,
            status: TaskStatus::Pending,
            created_at: Utc::now(),
            last_error: None,
        }
    }

    /// A queue holding `tasks` in the given order.
    pub fn queue(tasks: Vec<Task>) -> TaskQueue {
        let minutes = tasks.len() as f64 * 5.0;
        TaskQueue::from_tasks(tasks, Utc::now(), minutes)
    }

    /// A required, non-critical gap in a past season.
    pub fn gap(source: &str, season: i32, data_type: &str, missing: u64) -> Gap {
        let expected = 1230;
        let actual = expected - missing.min(expected);
        Gap {
            source: source.to_string(),
            season,
            data_type: data_type.to_string(),
            expected_count: expected,
            actual_count: actual,
            missing_count: missing,
            stale_count: 0,
            completeness_pct: actual as f64 / expected as f64 * 100.0,
            is_critical: false,
            required: true,
            completeness_threshold: 0.8,
            is_current_season: false,
        }
    }

    /// `count` classified, fresh, full-size objects for one combination.
    pub fn inventory_entries(
        source: &str,
        season: i32,
        data_type: &str,
        count: usize,
    ) -> Vec<InventoryEntry> {
        let now = Utc::now().to_rfc3339();
        (0..count)
            .map(|i| InventoryEntry {
                path: format!("{source}/{data_type}/{season}/{i:05}.json"),
                size_bytes: 4096,
                last_modified: now.clone(),
                source: Some(source.to_string()),
                season: Some(season),
                data_type: Some(data_type.to_string()),
            })
            .collect()
    }
}
