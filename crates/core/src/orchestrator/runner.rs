//! Task orchestrator implementation.
//!
//! Executes a task queue with bounded concurrency:
//! - Dispatch: highest priority first, FIFO within a priority
//! - Workers: at most `max_concurrent`, each gated by the domain rate limiter
//! - Retries: failed attempts are re-enqueued after a linear backoff

use std::cmp::Ordering as CmpOrdering;
use std::collections::{BinaryHeap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch, OwnedSemaphorePermit, RwLock, Semaphore};
use tracing::{debug, error, info, warn};

use crate::metrics;
use crate::ratelimit::RateLimitRegistry;
use crate::tasks::{Task, TaskPriority, TaskQueue, TaskStatus};

use super::config::OrchestratorConfig;
use super::traits::CrawlWorker;
use super::types::{OrchestratorError, OrchestratorStatus, OutcomeCounts, RunSummary};

/// Heap entry: priority first, then enqueue order (earlier wins).
struct QueuedTask {
    priority: TaskPriority,
    seq: u64,
    task: Task,
}

impl PartialEq for QueuedTask {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == CmpOrdering::Equal
    }
}

impl Eq for QueuedTask {}

impl PartialOrd for QueuedTask {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedTask {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Message from a worker back to the dispatcher.
enum TaskEvent {
    /// The task reached a terminal state.
    Done(Task),
    /// The attempt failed and the task should be queued again.
    Retry(Task),
}

/// Everything a spawned attempt needs.
#[derive(Clone)]
struct AttemptContext {
    registry: Arc<RateLimitRegistry>,
    status: Arc<RwLock<OrchestratorStatus>>,
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    task_timeout: Duration,
    retry_base_delay: Duration,
}

/// Runs crawl tasks through registered workers.
pub struct TaskOrchestrator {
    config: OrchestratorConfig,
    registry: Arc<RateLimitRegistry>,
    workers: HashMap<String, Arc<dyn CrawlWorker>>,

    // Runtime state
    running: Arc<AtomicBool>,
    /// Set by `stop()`, consumed by the next `run()` that starts.
    stop_requested: AtomicBool,
    status: Arc<RwLock<OrchestratorStatus>>,
    cancel_tx: watch::Sender<bool>,
}

impl TaskOrchestrator {
    pub fn new(config: OrchestratorConfig, registry: Arc<RateLimitRegistry>) -> Self {
        let (cancel_tx, _) = watch::channel(false);
        let status = OrchestratorStatus {
            max_concurrent: config.max_concurrent,
            ..Default::default()
        };

        Self {
            config,
            registry,
            workers: HashMap::new(),
            running: Arc::new(AtomicBool::new(false)),
            stop_requested: AtomicBool::new(false),
            status: Arc::new(RwLock::new(status)),
            cancel_tx,
        }
    }

    /// Register the worker for its source. A later worker for the same
    /// source replaces the earlier one.
    pub fn with_worker(mut self, worker: Arc<dyn CrawlWorker>) -> Self {
        self.workers.insert(worker.source().to_string(), worker);
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<RateLimitRegistry> {
        &self.registry
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Cancel the current run. In-flight attempts are abandoned and their
    /// tasks marked skipped; nothing new is dispatched.
    ///
    /// A stop that arrives while idle cancels the next run as soon as it starts.
    pub fn stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
        if self.is_running() {
            info!("Stopping task orchestrator");
        } else {
            debug!("Stop requested while orchestrator idle");
        }
        self.cancel_tx.send_replace(true);
    }

    /// Current status snapshot.
    pub async fn status(&self) -> OrchestratorStatus {
        self.status.read().await.clone()
    }

    /// Execute every task in `queue` and wait for the run to finish.
    ///
    /// Task failures are recorded in the summary; they never fail the run.
    pub async fn run(&self, queue: TaskQueue) -> Result<RunSummary, OrchestratorError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(OrchestratorError::AlreadyRunning);
        }
        // Clear first, then honor a stop that raced the claim above.
        self.cancel_tx.send_replace(false);
        if self.stop_requested.swap(false, Ordering::SeqCst) {
            info!("Stop requested before the run started, cancelling");
            self.cancel_tx.send_replace(true);
        }

        let started_at = Utc::now();
        info!(
            tasks = queue.tasks.len(),
            max_concurrent = self.config.max_concurrent,
            dry_run = self.config.dry_run,
            "Starting orchestrator run"
        );

        let summary = self.execute(queue.tasks, started_at).await;

        {
            let mut status = self.status.write().await;
            status.running = false;
            status.active_tasks = 0;
            status.pending = 0;
            status.current_run_started_at = None;
            status.last_run = Some(summary.without_tasks());
        }
        self.stop_requested.store(false, Ordering::SeqCst);
        self.running.store(false, Ordering::SeqCst);

        info!(
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped = summary.skipped,
            attempts = summary.attempts,
            peak_concurrency = summary.peak_concurrency,
            "Orchestrator run finished"
        );
        Ok(summary)
    }

    async fn execute(&self, tasks: Vec<Task>, started_at: DateTime<Utc>) -> RunSummary {
        let total = tasks.len();
        {
            let mut status = self.status.write().await;
            *status = OrchestratorStatus {
                running: true,
                max_concurrent: self.config.max_concurrent,
                pending: total,
                current_run_started_at: Some(started_at),
                last_run: status.last_run.take(),
                ..Default::default()
            };
        }

        if self.config.dry_run {
            let tasks = tasks
                .into_iter()
                .map(|mut task| {
                    debug!(task_id = %task.id, source = %task.source, "Dry run, not dispatching");
                    task.status = TaskStatus::Skipped;
                    task.last_error = Some("dry run".to_string());
                    task
                })
                .collect();
            return RunSummary::from_tasks(started_at, tasks, 0, 0);
        }

        let mut heap = BinaryHeap::with_capacity(total);
        let mut seq = 0u64;
        for task in tasks {
            heap.push(QueuedTask {
                priority: task.priority,
                seq,
                task,
            });
            seq += 1;
        }

        let ctx = AttemptContext {
            registry: Arc::clone(&self.registry),
            status: Arc::clone(&self.status),
            active: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
            task_timeout: self.config.task_timeout(),
            retry_base_delay: self.config.retry_base_delay(),
        };
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent.max(1)));
        let (done_tx, mut done_rx) = mpsc::unbounded_channel::<TaskEvent>();
        let mut cancel = self.cancel_tx.subscribe();

        let mut finished: Vec<Task> = Vec::with_capacity(total);
        let mut counts = OutcomeCounts::default();
        let mut in_flight = 0usize;
        let mut attempts = 0u32;

        loop {
            if *cancel.borrow_and_update() || (heap.is_empty() && in_flight == 0) {
                break;
            }

            if heap.is_empty() {
                tokio::select! {
                    Some(event) = done_rx.recv() => {
                        in_flight -= 1;
                        self.on_event(event, &mut heap, &mut seq, &mut finished, &mut counts, false)
                            .await;
                    }
                    _ = cancel.changed() => {}
                }
                continue;
            }

            // Take a slot before choosing the task, so a retry or a
            // higher-priority entry queued meanwhile is seen first.
            let permit = tokio::select! {
                biased;
                _ = cancel.changed() => continue,
                Some(event) = done_rx.recv() => {
                    in_flight -= 1;
                    self.on_event(event, &mut heap, &mut seq, &mut finished, &mut counts, false)
                        .await;
                    continue;
                }
                permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let Some(QueuedTask { mut task, .. }) = heap.pop() else {
                continue;
            };

            let Some(worker) = self.workers.get(&task.source).cloned() else {
                warn!(task_id = %task.id, source = %task.source, "No worker registered for source, skipping");
                task.status = TaskStatus::Skipped;
                task.last_error = Some(format!("no worker registered for source '{}'", task.source));
                counts.record(task.status);
                finished.push(task);
                self.publish_progress(heap.len(), &counts).await;
                continue;
            };

            in_flight += 1;
            attempts += 1;
            debug!(
                task_id = %task.id,
                source = %task.source,
                season = task.season,
                priority = %task.priority,
                attempt = task.attempts + 1,
                "Dispatching task"
            );
            self.publish_progress(heap.len(), &counts).await;
            tokio::spawn(run_attempt(
                ctx.clone(),
                worker,
                task,
                permit,
                cancel.clone(),
                done_tx.clone(),
            ));
        }

        let cancelled = *cancel.borrow();
        if cancelled {
            warn!(
                queued = heap.len(),
                in_flight, "Run cancelled, abandoning remaining tasks"
            );
        }
        while let Some(QueuedTask { mut task, .. }) = heap.pop() {
            task.status = TaskStatus::Skipped;
            task.last_error = Some("cancelled".to_string());
            counts.record(task.status);
            finished.push(task);
        }
        while in_flight > 0 {
            let Some(event) = done_rx.recv().await else {
                break;
            };
            in_flight -= 1;
            self.on_event(event, &mut heap, &mut seq, &mut finished, &mut counts, true)
                .await;
        }

        RunSummary::from_tasks(
            started_at,
            finished,
            attempts,
            ctx.peak.load(Ordering::SeqCst),
        )
    }

    async fn on_event(
        &self,
        event: TaskEvent,
        heap: &mut BinaryHeap<QueuedTask>,
        seq: &mut u64,
        finished: &mut Vec<Task>,
        counts: &mut OutcomeCounts,
        draining: bool,
    ) {
        match event {
            TaskEvent::Done(task) => {
                counts.record(task.status);
                finished.push(task);
            }
            TaskEvent::Retry(mut task) if draining => {
                task.status = TaskStatus::Skipped;
                counts.record(task.status);
                finished.push(task);
            }
            TaskEvent::Retry(task) => {
                heap.push(QueuedTask {
                    priority: task.priority,
                    seq: *seq,
                    task,
                });
                *seq += 1;
            }
        }
        self.publish_progress(heap.len(), counts).await;
    }

    async fn publish_progress(&self, pending: usize, counts: &OutcomeCounts) {
        let mut status = self.status.write().await;
        status.pending = pending;
        status.succeeded = counts.succeeded;
        status.failed = counts.failed;
        status.skipped = counts.skipped;
    }
}

/// One attempt at `task`, holding a worker slot until the worker returns.
async fn run_attempt(
    ctx: AttemptContext,
    worker: Arc<dyn CrawlWorker>,
    mut task: Task,
    permit: OwnedSemaphorePermit,
    mut cancel: watch::Receiver<bool>,
    done_tx: mpsc::UnboundedSender<TaskEvent>,
) {
    task.status = TaskStatus::Running;
    task.attempts += 1;

    let now_active = ctx.active.fetch_add(1, Ordering::SeqCst) + 1;
    ctx.peak.fetch_max(now_active, Ordering::SeqCst);
    ctx.status.write().await.active_tasks = now_active;
    metrics::TASKS_RUNNING.inc();

    let started = Instant::now();
    let result = tokio::select! {
        result = attempt(&ctx, worker.as_ref(), &task) => Some(result),
        _ = cancelled(&mut cancel) => None,
    };
    metrics::TASK_DURATION
        .with_label_values(&[task.source.as_str()])
        .observe(started.elapsed().as_secs_f64());

    let now_active = ctx.active.fetch_sub(1, Ordering::SeqCst) - 1;
    ctx.status.write().await.active_tasks = now_active;
    metrics::TASKS_RUNNING.dec();
    drop(permit);

    let event = match result {
        None => {
            metrics::TASK_ATTEMPTS.with_label_values(&["cancelled"]).inc();
            task.status = TaskStatus::Skipped;
            task.last_error = Some("cancelled".to_string());
            TaskEvent::Done(task)
        }
        Some(Ok(())) => {
            info!(task_id = %task.id, source = %task.source, season = task.season, "Task succeeded");
            task.status = TaskStatus::Succeeded;
            task.last_error = None;
            TaskEvent::Done(task)
        }
        Some(Err(message)) if task.can_retry() => {
            let backoff = ctx.retry_base_delay * task.attempts;
            warn!(
                task_id = %task.id,
                attempt = task.attempts,
                max_attempts = task.max_attempts,
                backoff_ms = backoff.as_millis() as u64,
                error = %message,
                "Task attempt failed, will retry"
            );
            task.status = TaskStatus::Pending;
            task.last_error = Some(message);
            tokio::select! {
                _ = tokio::time::sleep(backoff) => TaskEvent::Retry(task),
                _ = cancelled(&mut cancel) => {
                    task.status = TaskStatus::Skipped;
                    TaskEvent::Done(task)
                }
            }
        }
        Some(Err(message)) => {
            error!(
                task_id = %task.id,
                attempts = task.attempts,
                error = %message,
                "Task failed permanently"
            );
            task.status = TaskStatus::Failed;
            task.last_error = Some(message);
            TaskEvent::Done(task)
        }
    };

    // The dispatcher outlives every attempt; a send error means it is gone.
    let _ = done_tx.send(event);
}

/// Rate-limit wait plus worker call, both bounded by the task timeout.
async fn attempt(ctx: &AttemptContext, worker: &dyn CrawlWorker, task: &Task) -> Result<(), String> {
    let domain = worker.domain();

    if let Err(e) = ctx.registry.acquire_timeout(domain, ctx.task_timeout).await {
        metrics::TASK_ATTEMPTS.with_label_values(&["timed_out"]).inc();
        return Err(e.to_string());
    }

    let outcome = match tokio::time::timeout(ctx.task_timeout, worker.execute(task)).await {
        Ok(outcome) => outcome,
        Err(_) => {
            metrics::TASK_ATTEMPTS.with_label_values(&["timed_out"]).inc();
            return Err(format!(
                "attempt timed out after {}s",
                ctx.task_timeout.as_secs_f64()
            ));
        }
    };

    if let Some(code) = outcome.status_code {
        ctx.registry
            .record_response(domain, code, &outcome.headers)
            .await;
    }

    if outcome.success {
        metrics::TASK_ATTEMPTS.with_label_values(&["succeeded"]).inc();
        Ok(())
    } else {
        metrics::TASK_ATTEMPTS.with_label_values(&["failed"]).inc();
        Err(outcome.message.unwrap_or_else(|| match outcome.status_code {
            Some(code) => format!("worker failed with status {code}"),
            None => "worker failed".to_string(),
        }))
    }
}

/// Resolves once the run is cancelled.
async fn cancelled(rx: &mut watch::Receiver<bool>) {
    if rx.wait_for(|&c| c).await.is_err() {
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::WorkerOutcome;
    use crate::ratelimit::RateLimitConfig;
    use crate::testing::{fixtures, MockWorker};

    fn registry() -> Arc<RateLimitRegistry> {
        Arc::new(RateLimitRegistry::new(fixtures::fast_rate_limits()))
    }

    fn config(max_concurrent: usize) -> OrchestratorConfig {
        OrchestratorConfig {
            max_concurrent,
            max_attempts: 3,
            task_timeout_secs: 5,
            retry_base_delay_ms: 10,
            dry_run: false,
        }
    }

    #[test]
    fn test_heap_order() {
        let mut heap = BinaryHeap::new();
        let entries = [
            (TaskPriority::Low, 0),
            (TaskPriority::Critical, 1),
            (TaskPriority::High, 2),
            (TaskPriority::Critical, 3),
        ];
        for (priority, seq) in entries {
            heap.push(QueuedTask {
                priority,
                seq,
                task: fixtures::task("espn", 2000 + seq as i32, priority),
            });
        }

        let order: Vec<u64> = std::iter::from_fn(|| heap.pop().map(|q| q.seq)).collect();
        assert_eq!(order, vec![1, 3, 2, 0]);
    }

    #[tokio::test]
    async fn test_all_tasks_succeed() {
        let worker = Arc::new(MockWorker::new("espn", "espn.example"));
        let orchestrator = TaskOrchestrator::new(config(2), registry()).with_worker(worker.clone());
        let queue = fixtures::queue(vec![
            fixtures::task("espn", 2019, TaskPriority::Medium),
            fixtures::task("espn", 2020, TaskPriority::High),
            fixtures::task("espn", 2021, TaskPriority::Low),
        ]);

        let summary = orchestrator.run(queue).await.unwrap();

        assert_eq!(summary.total, 3);
        assert_eq!(summary.succeeded, 3);
        assert_eq!(summary.attempts, 3);
        assert_eq!(worker.call_count().await, 3);
        assert!(summary.peak_concurrency <= 2);

        let status = orchestrator.status().await;
        assert!(!status.running);
        assert_eq!(status.last_run.unwrap().succeeded, 3);
    }

    #[tokio::test]
    async fn test_concurrency_bound() {
        let worker = Arc::new(MockWorker::new("espn", "espn.example"));
        worker.set_delay(Duration::from_millis(50)).await;
        let orchestrator = TaskOrchestrator::new(config(2), registry()).with_worker(worker.clone());
        let tasks = (0..6)
            .map(|i| fixtures::task("espn", 2010 + i, TaskPriority::Medium))
            .collect();

        let summary = orchestrator.run(fixtures::queue(tasks)).await.unwrap();

        assert_eq!(summary.succeeded, 6);
        assert_eq!(summary.peak_concurrency, 2);
        assert_eq!(worker.max_observed_concurrency().await, 2);
    }

    #[tokio::test]
    async fn test_priority_dispatch_order() {
        let worker = Arc::new(MockWorker::new("espn", "espn.example"));
        let orchestrator = TaskOrchestrator::new(config(1), registry()).with_worker(worker.clone());
        let queue = fixtures::queue(vec![
            fixtures::task("espn", 2015, TaskPriority::Low),
            fixtures::task("espn", 2016, TaskPriority::Critical),
            fixtures::task("espn", 2017, TaskPriority::Medium),
            fixtures::task("espn", 2018, TaskPriority::High),
            fixtures::task("espn", 2019, TaskPriority::Critical),
        ]);

        orchestrator.run(queue).await.unwrap();

        let seasons: Vec<i32> = worker.executed().await.iter().map(|t| t.season).collect();
        assert_eq!(seasons, vec![2016, 2019, 2018, 2017, 2015]);
    }

    #[tokio::test]
    async fn test_retry_then_success() {
        let worker = Arc::new(MockWorker::new("espn", "espn.example"));
        worker.fail_times(2).await;
        let orchestrator = TaskOrchestrator::new(config(1), registry()).with_worker(worker.clone());
        let queue = fixtures::queue(vec![fixtures::task("espn", 2019, TaskPriority::High)]);

        let summary = orchestrator.run(queue).await.unwrap();

        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.attempts, 3);
        assert_eq!(summary.tasks[0].attempts, 3);
        assert!(summary.tasks[0].last_error.is_none());
    }

    #[tokio::test]
    async fn test_permanent_failure_does_not_abort_run() {
        let failing = Arc::new(MockWorker::new("bref", "bref.example"));
        failing.fail_times(u32::MAX).await;
        let healthy = Arc::new(MockWorker::new("espn", "espn.example"));
        let orchestrator = TaskOrchestrator::new(config(2), registry())
            .with_worker(failing.clone())
            .with_worker(healthy.clone());
        let queue = fixtures::queue(vec![
            fixtures::task("bref", 2019, TaskPriority::Critical),
            fixtures::task("espn", 2019, TaskPriority::Low),
        ]);

        let summary = orchestrator.run(queue).await.unwrap();

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.succeeded, 1);
        let failed = summary
            .tasks
            .iter()
            .find(|t| t.source == "bref")
            .unwrap();
        assert_eq!(failed.status, TaskStatus::Failed);
        assert_eq!(failed.attempts, 3);
        assert!(failed.last_error.is_some());
    }

    #[tokio::test]
    async fn test_missing_worker_skips_task() {
        let orchestrator = TaskOrchestrator::new(config(2), registry());
        let queue = fixtures::queue(vec![fixtures::task("nba", 2019, TaskPriority::High)]);

        let summary = orchestrator.run(queue).await.unwrap();

        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.attempts, 0);
    }

    #[tokio::test]
    async fn test_dry_run_skips_everything() {
        let worker = Arc::new(MockWorker::new("espn", "espn.example"));
        let mut cfg = config(2);
        cfg.dry_run = true;
        let orchestrator = TaskOrchestrator::new(cfg, registry()).with_worker(worker.clone());
        let queue = fixtures::queue(vec![
            fixtures::task("espn", 2019, TaskPriority::High),
            fixtures::task("espn", 2020, TaskPriority::Low),
        ]);

        let summary = orchestrator.run(queue).await.unwrap();

        assert_eq!(summary.skipped, 2);
        assert_eq!(worker.call_count().await, 0);
    }

    #[tokio::test]
    async fn test_rate_limited_response_feeds_registry() {
        let worker = Arc::new(MockWorker::new("espn", "espn.example"));
        worker
            .push_outcome(WorkerOutcome::failed(Some(429), "throttled").with_header("Retry-After", "0"))
            .await;
        let registry = registry();
        let orchestrator =
            TaskOrchestrator::new(config(1), Arc::clone(&registry)).with_worker(worker.clone());
        let queue = fixtures::queue(vec![fixtures::task("espn", 2019, TaskPriority::High)]);

        let summary = orchestrator.run(queue).await.unwrap();

        assert_eq!(summary.succeeded, 1);
        let stats = registry.stats("espn.example").await.unwrap();
        assert_eq!(stats.total_requests, 2);
        assert_eq!(stats.successful_requests, 1);
    }

    #[tokio::test]
    async fn test_stop_abandons_in_flight_work() {
        let worker = Arc::new(MockWorker::new("espn", "espn.example"));
        worker.set_delay(Duration::from_secs(30)).await;
        let orchestrator = Arc::new(
            TaskOrchestrator::new(config(1), registry()).with_worker(worker.clone()),
        );
        let queue = fixtures::queue(vec![
            fixtures::task("espn", 2019, TaskPriority::High),
            fixtures::task("espn", 2020, TaskPriority::Low),
        ]);

        let runner = Arc::clone(&orchestrator);
        let handle = tokio::spawn(async move { runner.run(queue).await });

        // Wait for the first task to start.
        for _ in 0..100 {
            if worker.call_count().await > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        orchestrator.stop();

        let summary = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.succeeded, 0);
        assert!(!orchestrator.is_running());
    }

    #[tokio::test]
    async fn test_stop_while_idle_cancels_next_run_only() {
        let worker = Arc::new(MockWorker::new("espn", "espn.example"));
        let orchestrator =
            TaskOrchestrator::new(config(1), registry()).with_worker(worker.clone());

        orchestrator.stop();
        let cancelled = orchestrator
            .run(fixtures::queue(vec![fixtures::task(
                "espn",
                2019,
                TaskPriority::High,
            )]))
            .await
            .unwrap();
        assert_eq!(cancelled.skipped, 1);
        assert_eq!(worker.call_count().await, 0);

        let next = orchestrator
            .run(fixtures::queue(vec![fixtures::task(
                "espn",
                2020,
                TaskPriority::High,
            )]))
            .await
            .unwrap();
        assert_eq!(next.succeeded, 1);
    }

    #[tokio::test]
    async fn test_second_run_rejected_while_running() {
        let worker = Arc::new(MockWorker::new("espn", "espn.example"));
        worker.set_delay(Duration::from_millis(200)).await;
        let orchestrator = Arc::new(
            TaskOrchestrator::new(config(1), registry()).with_worker(worker.clone()),
        );

        let runner = Arc::clone(&orchestrator);
        let handle = tokio::spawn(async move {
            runner
                .run(fixtures::queue(vec![fixtures::task(
                    "espn",
                    2019,
                    TaskPriority::High,
                )]))
                .await
        });
        for _ in 0..100 {
            if orchestrator.is_running() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let second = orchestrator.run(fixtures::queue(Vec::new())).await;
        assert!(matches!(second, Err(OrchestratorError::AlreadyRunning)));
        assert!(handle.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_timeout_counts_as_failure() {
        let worker = Arc::new(MockWorker::new("espn", "espn.example"));
        worker.set_delay(Duration::from_secs(5)).await;
        let mut cfg = config(1);
        cfg.task_timeout_secs = 0;
        cfg.max_attempts = 1;
        let orchestrator = TaskOrchestrator::new(cfg, registry()).with_worker(worker.clone());
        let mut task = fixtures::task("espn", 2019, TaskPriority::High);
        task.max_attempts = 1;

        let summary = orchestrator.run(fixtures::queue(vec![task])).await.unwrap();

        assert_eq!(summary.failed, 1);
        assert!(summary.tasks[0]
            .last_error
            .as_deref()
            .unwrap()
            .contains("timed out"));
    }

    #[test]
    fn test_fast_rate_limits_are_valid() {
        let limits: RateLimitConfig = fixtures::fast_rate_limits();
        assert!(limits.min_rate <= limits.initial_rate && limits.initial_rate <= limits.max_rate);
    }
}
