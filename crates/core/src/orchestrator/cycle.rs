//! Reconciliation cycle driver.
//!
//! One cycle: inventory scan, reconcile, write the coverage report,
//! generate and persist the task queue, execute it. The daemon repeats
//! cycles on an interval until shutdown.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::coverage::{
    self, CoverageExpectation, CoverageSummary, InventoryProvider, Reconciler, SeasonPolicy,
};
use crate::metrics;
use crate::tasks::{generate_task_queue, TaskQueueConfig, TaskQueueStore, TaskQueueSummary};

use super::runner::TaskOrchestrator;
use super::types::{OrchestratorError, RunSummary};

/// Inputs of a cycle, resolved from [`Config`].
#[derive(Debug, Clone)]
pub struct CycleSettings {
    pub expectations_path: PathBuf,
    pub coverage_report_path: PathBuf,
    pub task_queue_path: PathBuf,
    pub season_start_month: u32,
    pub min_file_size_bytes: u64,
    pub interval: Duration,
    pub queue: TaskQueueConfig,
    /// Skip reconciliation and execute the existing queue file as is.
    pub test_mode: bool,
}

impl CycleSettings {
    pub fn from_config(config: &Config, test_mode: bool) -> Self {
        Self {
            expectations_path: config.paths.expectations.clone(),
            coverage_report_path: config.paths.coverage_report.clone(),
            task_queue_path: config.paths.task_queue.clone(),
            season_start_month: config.reconciliation.season_start_month,
            min_file_size_bytes: config.reconciliation.min_file_size_bytes,
            interval: Duration::from_secs(config.reconciliation.cycle_interval_secs),
            queue: config.task_queue_config(),
            test_mode,
        }
    }
}

/// Inventory totals of the last scan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InventoryTotals {
    pub total_objects: usize,
    pub total_size_bytes: u64,
}

/// Published after every cycle; read by the status surface.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CycleState {
    pub cycles_completed: u64,
    pub cycles_failed: u64,
    pub last_started_at: Option<DateTime<Utc>>,
    pub last_finished_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub coverage: Option<CoverageSummary>,
    pub inventory: Option<InventoryTotals>,
    pub queue: Option<TaskQueueSummary>,
    pub last_run: Option<RunSummary>,
}

/// Drives reconciliation cycles.
pub struct CycleRunner {
    settings: CycleSettings,
    inventory: Arc<dyn InventoryProvider>,
    orchestrator: Arc<TaskOrchestrator>,
    state: Arc<RwLock<CycleState>>,
    stopping: AtomicBool,
}

impl CycleRunner {
    pub fn new(
        settings: CycleSettings,
        inventory: Arc<dyn InventoryProvider>,
        orchestrator: Arc<TaskOrchestrator>,
    ) -> Self {
        Self {
            settings,
            inventory,
            orchestrator,
            state: Arc::new(RwLock::new(CycleState::default())),
            stopping: AtomicBool::new(false),
        }
    }

    pub fn settings(&self) -> &CycleSettings {
        &self.settings
    }

    pub fn orchestrator(&self) -> &Arc<TaskOrchestrator> {
        &self.orchestrator
    }

    /// Shared handle to the published cycle state.
    pub fn state_handle(&self) -> Arc<RwLock<CycleState>> {
        Arc::clone(&self.state)
    }

    pub async fn state(&self) -> CycleState {
        self.state.read().await.clone()
    }

    /// Stop the current cycle's run and any further cycles.
    pub fn stop(&self) {
        self.stopping.store(true, Ordering::SeqCst);
        self.orchestrator.stop();
    }

    /// Run one cycle. Errors are recorded in the published state.
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> Result<RunSummary, OrchestratorError> {
        self.state.write().await.last_started_at = Some(now);

        let result = self.cycle(now).await;
        self.orchestrator.registry().log_alerts().await;

        let mut state = self.state.write().await;
        state.last_finished_at = Some(Utc::now());
        match &result {
            Ok(summary) => {
                state.cycles_completed += 1;
                state.last_error = None;
                state.last_run = Some(summary.without_tasks());
                metrics::CYCLES_TOTAL.with_label_values(&["ok"]).inc();
            }
            Err(e) => {
                state.cycles_failed += 1;
                state.last_error = Some(e.to_string());
                metrics::CYCLES_TOTAL.with_label_values(&["error"]).inc();
                error!(error = %e, "Cycle failed");
            }
        }
        result
    }

    async fn cycle(&self, now: DateTime<Utc>) -> Result<RunSummary, OrchestratorError> {
        let store = TaskQueueStore::new(&self.settings.task_queue_path);

        let queue = if self.settings.test_mode {
            info!(path = %store.path().display(), "Test mode: executing existing task queue");
            store.load()?
        } else {
            let expectation = CoverageExpectation::load(&self.settings.expectations_path)?;
            let mut snapshot = self.inventory.scan().await?;
            let classified = coverage::classify(&mut snapshot, &expectation.compiled_patterns());
            info!(
                provider = self.inventory.name(),
                objects = snapshot.total_objects(),
                classified,
                "Inventory scanned"
            );

            let mut queue_config = self.settings.queue.clone();
            for (source, spec) in &expectation.sources {
                if let Some(minutes) = spec.avg_task_minutes {
                    queue_config
                        .source_task_minutes
                        .entry(source.clone())
                        .or_insert(minutes);
                }
            }

            let reconciler = Reconciler::new(
                expectation,
                SeasonPolicy::new(self.settings.season_start_month),
            )
            .with_min_file_size(self.settings.min_file_size_bytes);
            let report = reconciler.reconcile(&snapshot, now);
            coverage::write_report(&self.settings.coverage_report_path, &report)?;

            let queue = generate_task_queue(&report.gaps, &queue_config, now);
            store.write(&queue)?;

            let mut state = self.state.write().await;
            state.coverage = Some(report.summary.clone());
            state.inventory = Some(InventoryTotals {
                total_objects: snapshot.total_objects(),
                total_size_bytes: snapshot.total_size_bytes(),
            });
            queue
        };

        self.state.write().await.queue = Some(queue.summary());

        if self.stopping.load(Ordering::SeqCst) {
            warn!("Shutdown requested, not executing task queue");
            return Ok(RunSummary::from_tasks(now, Vec::new(), 0, 0));
        }
        self.orchestrator.run(queue).await
    }

    /// Run cycles every `interval` until `shutdown` fires.
    pub async fn run_forever(&self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            interval_secs = self.settings.interval.as_secs(),
            test_mode = self.settings.test_mode,
            "Cycle loop started"
        );

        loop {
            let cycle = self.run_cycle(Utc::now());
            tokio::pin!(cycle);

            let mut shutting_down = false;
            tokio::select! {
                _ = &mut cycle => {}
                _ = shutdown.recv() => {
                    info!("Shutdown during cycle, cancelling run");
                    self.stop();
                    shutting_down = true;
                    let _ = cycle.await;
                }
            }
            if shutting_down || self.stopping.load(Ordering::SeqCst) {
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.settings.interval) => {}
                _ = shutdown.recv() => {
                    self.stop();
                    break;
                }
            }
        }

        info!("Cycle loop stopped");
    }
}
