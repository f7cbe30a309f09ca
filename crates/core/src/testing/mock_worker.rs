//! Mock crawl worker for testing.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::orchestrator::{CrawlWorker, WorkerOutcome};
use crate::tasks::Task;

/// Mock implementation of the CrawlWorker trait.
///
/// Provides controllable behavior for testing:
/// - Record every task it is asked to execute
/// - Fail a fixed number of calls before succeeding
/// - Return scripted outcomes (e.g. a 429 with headers)
/// - Simulate slow requests and track peak concurrency
///
/// # Example
///
/// ```rust,ignore
/// use courtwatch_core::testing::MockWorker;
///
/// let worker = Arc::new(MockWorker::new("espn", "espn.example"));
/// worker.fail_times(2).await;
///
/// // Register with an orchestrator, run a queue...
/// assert_eq!(worker.call_count().await, 3);
/// ```
#[derive(Debug)]
pub struct MockWorker {
    source: String,
    domain: String,
    /// Tasks received, in call order.
    executed: Arc<RwLock<Vec<Task>>>,
    /// Outcomes returned before falling back to the failure counter.
    outcomes: Arc<RwLock<VecDeque<WorkerOutcome>>>,
    /// Calls left that fail with a 500.
    failures_remaining: Arc<RwLock<u32>>,
    /// Simulated request duration.
    delay: Arc<RwLock<Duration>>,
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl MockWorker {
    /// Create a mock worker that succeeds immediately.
    pub fn new(source: &str, domain: &str) -> Self {
        Self {
            source: source.to_string(),
            domain: domain.to_string(),
            executed: Arc::new(RwLock::new(Vec::new())),
            outcomes: Arc::new(RwLock::new(VecDeque::new())),
            failures_remaining: Arc::new(RwLock::new(0)),
            delay: Arc::new(RwLock::new(Duration::ZERO)),
            active: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Fail the next `n` calls with a 500.
    pub async fn fail_times(&self, n: u32) {
        *self.failures_remaining.write().await = n;
    }

    /// Queue an outcome for a future call.
    pub async fn push_outcome(&self, outcome: WorkerOutcome) {
        self.outcomes.write().await.push_back(outcome);
    }

    /// Set the simulated request duration.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = delay;
    }

    /// Number of execute calls so far.
    pub async fn call_count(&self) -> usize {
        self.executed.read().await.len()
    }

    /// Tasks received, in call order.
    pub async fn executed(&self) -> Vec<Task> {
        self.executed.read().await.clone()
    }

    /// Highest number of calls in flight at once.
    pub async fn max_observed_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

/// Decrements the in-flight counter even when the call is abandoned.
struct InFlight(Arc<AtomicUsize>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl CrawlWorker for MockWorker {
    fn source(&self) -> &str {
        &self.source
    }

    fn domain(&self) -> &str {
        &self.domain
    }

    async fn execute(&self, task: &Task) -> WorkerOutcome {
        self.executed.write().await.push(task.clone());

        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlight(Arc::clone(&self.active));
        self.peak.fetch_max(now_active, Ordering::SeqCst);

        let delay = *self.delay.read().await;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if let Some(outcome) = self.outcomes.write().await.pop_front() {
            return outcome;
        }

        let mut failures = self.failures_remaining.write().await;
        if *failures > 0 {
            *failures -= 1;
            return WorkerOutcome::failed(Some(500), "mock failure");
        }
        WorkerOutcome::ok(200)
    }
}
