//! File-backed task queue.

use std::path::{Path, PathBuf};

use tracing::debug;

use super::types::{TaskQueue, TaskQueueError};
use crate::persist;

/// The queue file shared between the daemon and the CLI.
///
/// Writes replace the whole document atomically, so a concurrent reader
/// sees either the previous or the new queue.
#[derive(Debug, Clone)]
pub struct TaskQueueStore {
    path: PathBuf,
}

impl TaskQueueStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&self, queue: &TaskQueue) -> Result<(), TaskQueueError> {
        persist::write_json_atomic(&self.path, queue)?;
        debug!(path = %self.path.display(), tasks = queue.total_tasks, "Wrote task queue");
        Ok(())
    }

    /// `None` when no queue has been written yet.
    pub fn read(&self) -> Result<Option<TaskQueue>, TaskQueueError> {
        Ok(persist::read_json(&self.path)?)
    }

    /// Like [`read`](Self::read) but a missing file is an error.
    pub fn load(&self) -> Result<TaskQueue, TaskQueueError> {
        self.read()?
            .ok_or_else(|| TaskQueueError::NotFound(self.path.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::{generate_task_queue, TaskQueueConfig};
    use crate::testing::fixtures;
    use chrono::Utc;
    use tempfile::TempDir;

    #[test]
    fn test_write_then_read() {
        let dir = TempDir::new().unwrap();
        let store = TaskQueueStore::new(dir.path().join("queue/tasks.json"));
        let queue = generate_task_queue(
            &[fixtures::gap("espn", 2019, "box_scores", 120)],
            &TaskQueueConfig::default(),
            Utc::now(),
        );

        store.write(&queue).unwrap();
        let loaded = store.read().unwrap().unwrap();

        assert_eq!(loaded, queue);
    }

    #[test]
    fn test_missing_queue() {
        let dir = TempDir::new().unwrap();
        let store = TaskQueueStore::new(dir.path().join("tasks.json"));

        assert!(store.read().unwrap().is_none());
        assert!(matches!(store.load(), Err(TaskQueueError::NotFound(_))));
    }

    #[test]
    fn test_overwrite_replaces_queue() {
        let dir = TempDir::new().unwrap();
        let store = TaskQueueStore::new(dir.path().join("tasks.json"));
        let now = Utc::now();
        let config = TaskQueueConfig::default();

        store
            .write(&generate_task_queue(
                &[
                    fixtures::gap("espn", 2019, "box_scores", 120),
                    fixtures::gap("espn", 2020, "box_scores", 120),
                ],
                &config,
                now,
            ))
            .unwrap();
        store.write(&TaskQueue::empty(now)).unwrap();

        assert_eq!(store.load().unwrap().total_tasks, 0);
    }
}
