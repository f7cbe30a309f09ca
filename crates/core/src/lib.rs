pub mod approval;
pub mod config;
pub mod coverage;
pub mod metrics;
pub mod orchestrator;
pub mod persist;
pub mod process;
pub mod ratelimit;
pub mod supervisor;
pub mod tasks;
pub mod testing;

pub use approval::{
    ApprovalConfig, ApprovalError, ApprovalGate, ApprovalRequest, ApprovalStatus, ApprovalStore,
    GateDecision, MetricChange, Severity, SqliteApprovalStore,
};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use coverage::{
    CoverageError, CoverageExpectation, CoverageReport, CoverageSummary, Gap, InventoryProvider,
    InventorySnapshot, ManifestInventory, Reconciler, SeasonPolicy,
};
pub use orchestrator::{
    CrawlWorker, CycleRunner, CycleSettings, CycleState, OrchestratorConfig, OrchestratorError,
    OrchestratorStatus, RunSummary, TaskOrchestrator, WorkerOutcome,
};
pub use persist::PersistError;
pub use process::{
    ControllerConfig, LaunchSpec, MonitorStatus, ProcessController, ProcessError, ProcessStatus,
    StopOutcome,
};
pub use ratelimit::{RateLimitConfig, RateLimitError, RateLimitRegistry, RateLimiterStats};
pub use supervisor::{
    ComponentHealth, ComponentPhase, ManagedComponent, SpawnedComponent, Supervisor,
    SupervisorConfig,
};
pub use tasks::{
    generate_task_queue, Task, TaskPriority, TaskQueue, TaskQueueConfig, TaskQueueError,
    TaskQueueStore, TaskStatus,
};
