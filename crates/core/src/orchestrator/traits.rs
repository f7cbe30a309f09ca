//! Crawl worker abstraction.

use async_trait::async_trait;

use super::types::WorkerOutcome;
use crate::tasks::Task;

/// Fetches data for one source.
///
/// Site-specific scraping lives behind this trait. The orchestrator handles
/// rate limiting, timeouts and retries around each call.
#[async_trait]
pub trait CrawlWorker: Send + Sync {
    /// Source this worker serves; tasks are routed by it.
    fn source(&self) -> &str;

    /// Rate-limit key (host name) the worker's requests go to.
    fn domain(&self) -> &str;

    /// Perform one attempt at `task`.
    async fn execute(&self, task: &Task) -> WorkerOutcome;
}
