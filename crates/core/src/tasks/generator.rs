//! Turns coverage gaps into a prioritized task queue.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use super::types::{Task, TaskKind, TaskPriority, TaskQueue, TaskStatus};
use crate::coverage::Gap;

/// Completeness thresholds at or above this make a required gap high priority.
const HIGH_PRIORITY_THRESHOLD: f64 = 0.9;

/// Queue generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskQueueConfig {
    /// Attempts each generated task is allowed.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Estimate for sources without their own average.
    #[serde(default = "default_task_minutes")]
    pub default_task_minutes: f64,

    /// Average minutes per task, by source.
    #[serde(default)]
    pub source_task_minutes: HashMap<String, f64>,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_task_minutes() -> f64 {
    5.0
}

impl Default for TaskQueueConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            default_task_minutes: default_task_minutes(),
            source_task_minutes: HashMap::new(),
        }
    }
}

impl TaskQueueConfig {
    pub fn minutes_for(&self, source: &str) -> f64 {
        self.source_task_minutes
            .get(source)
            .copied()
            .unwrap_or(self.default_task_minutes)
    }
}

/// Priority of the task that closes `gap`.
pub fn priority_for(gap: &Gap) -> TaskPriority {
    if gap.is_critical {
        return TaskPriority::Critical;
    }
    let below_threshold = gap.completeness_pct < gap.completeness_threshold * 100.0;
    if gap.is_current_season
        || (gap.required && gap.completeness_threshold >= HIGH_PRIORITY_THRESHOLD && below_threshold)
    {
        return TaskPriority::High;
    }
    if gap.required {
        TaskPriority::Medium
    } else {
        TaskPriority::Low
    }
}

/// First 16 hex chars of SHA-256 over `source|season|data_type`.
pub fn task_id(source: &str, season: i32, data_type: &str) -> String {
    let digest = Sha256::digest(format!("{source}|{season}|{data_type}").as_bytes());
    let mut hex = format!("{digest:x}");
    hex.truncate(16);
    hex
}

/// One task per gap, deduplicated by id, highest priority first.
///
/// Within a priority, larger shortfalls go first, then earlier seasons.
pub fn generate_task_queue(gaps: &[Gap], config: &TaskQueueConfig, now: DateTime<Utc>) -> TaskQueue {
    let mut seen = HashSet::new();
    let mut tasks = Vec::with_capacity(gaps.len());

    for gap in gaps {
        let id = task_id(&gap.source, gap.season, &gap.data_type);
        if !seen.insert(id.clone()) {
            debug!(task_id = %id, source = %gap.source, season = gap.season, "Duplicate gap skipped");
            continue;
        }

        let kind = if gap.missing_count > 0 {
            TaskKind::Backfill
        } else {
            TaskKind::Refresh
        };

        tasks.push(Task {
            id,
            source: gap.source.clone(),
            season: gap.season,
            data_type: gap.data_type.clone(),
            priority: priority_for(gap),
            payload: json!({
                "kind": kind,
                "missing_count": gap.missing_count,
                "stale_count": gap.stale_count,
                "expected_count": gap.expected_count,
                "completeness_pct": gap.completeness_pct,
            }),
            attempts: 0,
            max_attempts: config.max_attempts,
            status: TaskStatus::Pending,
            created_at: now,
            last_error: None,
        });
    }

    tasks.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| missing_of(b).cmp(&missing_of(a)))
            .then_with(|| a.season.cmp(&b.season))
    });

    let minutes: f64 = tasks.iter().map(|t| config.minutes_for(&t.source)).sum();
    let queue = TaskQueue::from_tasks(tasks, now, minutes);

    info!(
        total = queue.total_tasks,
        critical = queue.by_priority.get("critical").copied().unwrap_or(0),
        estimated_minutes = queue.estimated_total_minutes,
        "Generated task queue"
    );
    queue
}

fn missing_of(task: &Task) -> u64 {
    task.payload
        .get("missing_count")
        .and_then(|v| v.as_u64())
        .unwrap_or(0)
}
