//! Task queue generation and storage.

mod generator;
mod store;
mod types;

pub use generator::{generate_task_queue, priority_for, task_id, TaskQueueConfig};
pub use store::TaskQueueStore;
pub use types::{
    Task, TaskKind, TaskPriority, TaskQueue, TaskQueueError, TaskQueueSummary, TaskStatus,
};
