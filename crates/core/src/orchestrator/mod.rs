//! Task orchestrator and cycle driver.
//!
//! The orchestrator executes a task queue with bounded concurrency:
//! - **Dispatch**: priority order, FIFO within a priority
//! - **Execution**: one attempt per worker slot, gated by the domain rate limiter
//! - **Recovery**: retries with linear backoff, prompt cancellation on stop
//!
//! The [`CycleRunner`] wraps it with reconciliation and queue generation.

mod config;
mod cycle;
mod runner;
mod traits;
mod types;

pub use config::OrchestratorConfig;
pub use cycle::{CycleRunner, CycleSettings, CycleState, InventoryTotals};
pub use runner::TaskOrchestrator;
pub use traits::CrawlWorker;
pub use types::{OrchestratorError, OrchestratorStatus, OutcomeCounts, RunSummary, WorkerOutcome};
