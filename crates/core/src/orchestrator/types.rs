//! Types for the task orchestrator.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::coverage::CoverageError;
use crate::persist::PersistError;
use crate::tasks::{Task, TaskQueueError, TaskStatus};

/// Errors that can occur during orchestration.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// A run is already in progress on this orchestrator.
    #[error("orchestrator is already running")]
    AlreadyRunning,

    #[error("coverage error: {0}")]
    Coverage(#[from] CoverageError),

    #[error("task queue error: {0}")]
    TaskQueue(#[from] TaskQueueError),

    #[error("persistence error: {0}")]
    Persist(#[from] PersistError),
}

/// Result of one worker attempt.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkerOutcome {
    pub success: bool,
    /// HTTP status of the last upstream request, fed to the rate limiter.
    pub status_code: Option<u16>,
    /// Response headers of that request (Retry-After in particular).
    pub headers: HashMap<String, String>,
    pub message: Option<String>,
}

impl WorkerOutcome {
    pub fn ok(status_code: u16) -> Self {
        Self {
            success: true,
            status_code: Some(status_code),
            ..Default::default()
        }
    }

    pub fn failed(status_code: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            status_code,
            message: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// Terminal outcome counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeCounts {
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl OutcomeCounts {
    pub fn record(&mut self, status: TaskStatus) {
        match status {
            TaskStatus::Succeeded => self.succeeded += 1,
            TaskStatus::Failed => self.failed += 1,
            TaskStatus::Skipped => self.skipped += 1,
            TaskStatus::Pending | TaskStatus::Running => {}
        }
    }
}

/// What a finished run did.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Worker attempts, retries included.
    pub attempts: u32,
    /// Most tasks seen executing at the same time.
    pub peak_concurrency: usize,
    pub by_priority: BTreeMap<String, OutcomeCounts>,
    /// Final state of every task.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tasks: Vec<Task>,
}

impl RunSummary {
    pub fn from_tasks(
        started_at: DateTime<Utc>,
        tasks: Vec<Task>,
        attempts: u32,
        peak_concurrency: usize,
    ) -> Self {
        let mut totals = OutcomeCounts::default();
        let mut by_priority: BTreeMap<String, OutcomeCounts> = BTreeMap::new();
        for task in &tasks {
            totals.record(task.status);
            by_priority
                .entry(task.priority.as_str().to_string())
                .or_default()
                .record(task.status);
        }

        Self {
            started_at,
            finished_at: Utc::now(),
            total: tasks.len(),
            succeeded: totals.succeeded,
            failed: totals.failed,
            skipped: totals.skipped,
            attempts,
            peak_concurrency,
            by_priority,
            tasks,
        }
    }

    /// The summary with the task list dropped, for status snapshots.
    pub fn without_tasks(&self) -> Self {
        Self {
            tasks: Vec::new(),
            ..self.clone()
        }
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }
}

/// Current status of the orchestrator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrchestratorStatus {
    pub running: bool,
    pub active_tasks: usize,
    pub max_concurrent: usize,
    /// Tasks waiting for a worker slot in the current run.
    pub pending: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub current_run_started_at: Option<DateTime<Utc>>,
    pub last_run: Option<RunSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::TaskPriority;
    use serde_json::json;

    fn task(id: &str, priority: TaskPriority, status: TaskStatus) -> Task {
        Task {
            id: id.to_string(),
            source: "espn".to_string(),
            season: 2024,
            data_type: "box_scores".to_string(),
            priority,
            payload: json!({}),
            attempts: 1,
            max_attempts: 3,
            status,
            created_at: Utc::now(),
            last_error: None,
        }
    }

    #[test]
    fn test_summary_counts() {
        let summary = RunSummary::from_tasks(
            Utc::now(),
            vec![
                task("a", TaskPriority::Critical, TaskStatus::Succeeded),
                task("b", TaskPriority::Critical, TaskStatus::Failed),
                task("c", TaskPriority::Low, TaskStatus::Skipped),
            ],
            4,
            2,
        );

        assert_eq!(summary.total, 3);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.by_priority["critical"].succeeded, 1);
        assert_eq!(summary.by_priority["critical"].failed, 1);
        assert_eq!(summary.by_priority["low"].skipped, 1);
        assert_eq!(summary.task("b").unwrap().status, TaskStatus::Failed);
        assert!(summary.without_tasks().tasks.is_empty());
    }

    #[test]
    fn test_outcome_builders() {
        let outcome = WorkerOutcome::failed(Some(429), "throttled").with_header("Retry-After", "10");
        assert!(!outcome.success);
        assert_eq!(outcome.status_code, Some(429));
        assert_eq!(outcome.headers["Retry-After"], "10");
        assert!(WorkerOutcome::ok(200).success);
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            OrchestratorError::AlreadyRunning.to_string(),
            "orchestrator is already running"
        );
    }
}
