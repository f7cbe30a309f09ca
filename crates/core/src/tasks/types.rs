//! Crawl task data types.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::persist::PersistError;

// ============================================================================
// Priority & Status
// ============================================================================

/// Task priority. Variants are declared lowest first so `Ord` ranks
/// `Critical` highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
    Critical,
}

impl TaskPriority {
    /// Highest first.
    pub const ALL: [TaskPriority; 4] = [
        TaskPriority::Critical,
        TaskPriority::High,
        TaskPriority::Medium,
        TaskPriority::Low,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Critical => "critical",
            TaskPriority::High => "high",
            TaskPriority::Medium => "medium",
            TaskPriority::Low => "low",
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    Running,
    Succeeded,
    Failed,
    Skipped,
}

impl TaskStatus {
    /// Whether the task will not run again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Succeeded | TaskStatus::Failed | TaskStatus::Skipped
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Succeeded => "succeeded",
            TaskStatus::Failed => "failed",
            TaskStatus::Skipped => "skipped",
        }
    }
}

/// What a task has to do about its gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Fetch objects that do not exist yet.
    Backfill,
    /// Re-fetch stale objects.
    Refresh,
}

// ============================================================================
// Task & Queue
// ============================================================================

/// One crawl unit of work derived from a coverage gap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Deterministic id derived from source, season and data type.
    pub id: String,
    pub source: String,
    pub season: i32,
    pub data_type: String,
    pub priority: TaskPriority,
    /// Opaque instructions for the worker.
    pub payload: serde_json::Value,
    #[serde(default)]
    pub attempts: u32,
    pub max_attempts: u32,
    #[serde(default)]
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl Task {
    /// Whether another attempt is allowed.
    pub fn can_retry(&self) -> bool {
        self.attempts < self.max_attempts
    }
}

/// Persisted queue document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskQueue {
    pub generated_at: DateTime<Utc>,
    pub total_tasks: usize,
    /// Task count per priority; every priority is present.
    pub by_priority: BTreeMap<String, usize>,
    pub by_source: BTreeMap<String, usize>,
    pub estimated_total_minutes: f64,
    pub tasks: Vec<Task>,
}

impl TaskQueue {
    pub fn empty(generated_at: DateTime<Utc>) -> Self {
        Self::from_tasks(Vec::new(), generated_at, 0.0)
    }

    /// Build a queue and its counters from already ordered tasks.
    pub fn from_tasks(tasks: Vec<Task>, generated_at: DateTime<Utc>, minutes: f64) -> Self {
        let mut by_priority: BTreeMap<String, usize> = TaskPriority::ALL
            .iter()
            .map(|p| (p.as_str().to_string(), 0))
            .collect();
        let mut by_source: BTreeMap<String, usize> = BTreeMap::new();

        for task in &tasks {
            *by_priority
                .entry(task.priority.as_str().to_string())
                .or_default() += 1;
            *by_source.entry(task.source.clone()).or_default() += 1;
        }

        Self {
            generated_at,
            total_tasks: tasks.len(),
            by_priority,
            by_source,
            estimated_total_minutes: minutes,
            tasks,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Queue metadata without the task list, as served on `/tasks`.
    pub fn summary(&self) -> TaskQueueSummary {
        TaskQueueSummary {
            total_tasks: self.total_tasks,
            generated_at: self.generated_at,
            by_priority: self.by_priority.clone(),
            by_source: self.by_source.clone(),
            estimated_total_minutes: self.estimated_total_minutes,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskQueueSummary {
    pub total_tasks: usize,
    pub generated_at: DateTime<Utc>,
    pub by_priority: BTreeMap<String, usize>,
    pub by_source: BTreeMap<String, usize>,
    pub estimated_total_minutes: f64,
}

#[derive(Debug, Error)]
pub enum TaskQueueError {
    #[error("task queue not found at {0} (run a reconciliation cycle first)")]
    NotFound(PathBuf),

    #[error(transparent)]
    Persist(#[from] PersistError),
}
