//! The foreground daemon behind `courtwatch run`.
//!
//! Two supervised components: the reconciliation cycle loop and the health
//! monitor. Both stop on SIGTERM or Ctrl-C through one broadcast channel.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use futures::FutureExt;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use courtwatch_core::{
    process::{is_pid_alive, PidFile},
    ApprovalGate, Config, CrawlWorker, CycleRunner, CycleSettings, ManagedComponent,
    ManifestInventory, RateLimitRegistry, SpawnedComponent, SqliteApprovalStore, Supervisor,
    TaskOrchestrator,
};

use crate::api::create_router;
use crate::cli::{Exit, RunArgs};
use crate::state::AppState;

/// How long components get to wind down after the shutdown broadcast.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Why the daemon stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    Interrupt,
    Terminate,
}

impl From<ShutdownReason> for Exit {
    fn from(reason: ShutdownReason) -> Self {
        match reason {
            ShutdownReason::Interrupt => Exit::Interrupted,
            ShutdownReason::Terminate => Exit::Success,
        }
    }
}

pub async fn run(
    config: Config,
    args: RunArgs,
    workers: Vec<Arc<dyn CrawlWorker>>,
) -> Result<Exit> {
    info!(
        dry_run = args.flags.dry_run,
        test_mode = args.flags.test_mode,
        once = args.once,
        "Starting courtwatch daemon"
    );

    let pid_file = PidFile::new(&config.paths.pid_file);
    claim_pid_file(&pid_file)?;

    let result = run_claimed(config, args, workers).await;

    release_pid_file(&pid_file);
    result
}

async fn run_claimed(
    config: Config,
    args: RunArgs,
    workers: Vec<Arc<dyn CrawlWorker>>,
) -> Result<Exit> {
    let registry = Arc::new(RateLimitRegistry::new(config.rate_limit.clone()));

    let mut orchestrator_config = config.orchestrator.clone();
    orchestrator_config.dry_run |= args.flags.dry_run;
    if workers.is_empty() && !orchestrator_config.dry_run {
        warn!("No crawl workers registered; every task will be skipped");
    }
    let orchestrator = Arc::new(
        workers
            .into_iter()
            .fold(
                TaskOrchestrator::new(orchestrator_config, Arc::clone(&registry)),
                |orchestrator, worker| orchestrator.with_worker(worker),
            ),
    );

    let inventory = Arc::new(ManifestInventory::new(&config.paths.inventory));
    let runner = Arc::new(CycleRunner::new(
        CycleSettings::from_config(&config, args.flags.test_mode),
        inventory,
        Arc::clone(&orchestrator),
    ));

    if args.once {
        return run_once(&runner).await;
    }

    let store = SqliteApprovalStore::new(&config.paths.approvals_db)
        .with_context(|| format!("Failed to open {:?}", config.paths.approvals_db))?;
    let gate = Arc::new(ApprovalGate::new(config.approval.clone(), Arc::new(store)));

    let addr = SocketAddr::new(config.server.host, config.server.port);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Health monitor listening on {}", addr);

    let supervisor = Supervisor::new(config.supervisor.clone());
    let state = Arc::new(AppState::new(
        config,
        runner.state_handle(),
        supervisor.health_handle(),
        registry,
        orchestrator,
        gate,
    ));

    let (shutdown_tx, _) = broadcast::channel::<()>(4);

    let cycle = Arc::new(spawn_cycle(Arc::clone(&runner), shutdown_tx.clone()));
    let monitor = Arc::new(spawn_monitor(state, listener, addr, shutdown_tx.clone()));

    let supervisor = Arc::new(
        supervisor
            .with_component(cycle.clone())
            .with_component(monitor.clone()),
    );
    let supervisor_task = Arc::clone(&supervisor).spawn(shutdown_tx.subscribe());

    let reason = shutdown_signal().await;
    info!(?reason, "Shutdown requested");

    runner.stop();
    let _ = shutdown_tx.send(());
    if let Err(e) = supervisor_task.await {
        warn!(error = %e, "Supervisor task ended abnormally");
    }

    for component in [&cycle, &monitor] {
        if !wait_until_dead(component, SHUTDOWN_GRACE).await {
            warn!(component = component.name(), "Component did not stop in time, aborting");
            component.abort().await;
        }
    }

    info!("courtwatch daemon stopped");
    Ok(reason.into())
}

/// One cycle, then exit. Task failures are reported but do not fail the run.
async fn run_once(runner: &CycleRunner) -> Result<Exit> {
    tokio::select! {
        result = runner.run_cycle(Utc::now()) => match result {
            Ok(summary) => {
                info!(
                    total = summary.total,
                    succeeded = summary.succeeded,
                    failed = summary.failed,
                    skipped = summary.skipped,
                    "Single cycle finished"
                );
                Ok(Exit::Success)
            }
            Err(e) => {
                error!(error = %e, "Single cycle failed");
                Ok(Exit::Failure)
            }
        },
        reason = shutdown_signal() => {
            runner.stop();
            info!(?reason, "Interrupted during single cycle");
            Ok(reason.into())
        }
    }
}

fn spawn_cycle(runner: Arc<CycleRunner>, shutdown: broadcast::Sender<()>) -> SpawnedComponent {
    SpawnedComponent::spawn("cycle", move || {
        let runner = Arc::clone(&runner);
        let rx = shutdown.subscribe();
        async move { runner.run_forever(rx).await }.boxed()
    })
}

/// The first spawn serves on the listener bound at startup; respawns bind
/// the address again.
fn spawn_monitor(
    state: Arc<AppState>,
    listener: TcpListener,
    addr: SocketAddr,
    shutdown: broadcast::Sender<()>,
) -> SpawnedComponent {
    let initial = Arc::new(Mutex::new(Some(listener)));

    SpawnedComponent::spawn("monitor", move || {
        let state = Arc::clone(&state);
        let initial = initial.lock().ok().and_then(|mut slot| slot.take());
        let mut rx = shutdown.subscribe();

        async move {
            let listener = match initial {
                Some(listener) => listener,
                None => match TcpListener::bind(addr).await {
                    Ok(listener) => listener,
                    Err(e) => {
                        error!(error = %e, %addr, "Failed to rebind health monitor");
                        return;
                    }
                },
            };

            let app = create_router(state);
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = rx.recv().await;
                })
                .await;
            if let Err(e) = result {
                error!(error = %e, "Health monitor stopped");
            }
        }
        .boxed()
    })
}

async fn wait_until_dead(component: &SpawnedComponent, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while component.is_alive().await {
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    true
}

/// Record our PID unless another live daemon already owns the file.
///
/// When launched by `courtwatch start` the file already holds our PID.
fn claim_pid_file(pid_file: &PidFile) -> Result<()> {
    let own = std::process::id();
    if let Some(pid) = pid_file.read() {
        if pid != own && is_pid_alive(pid) {
            anyhow::bail!("courtwatch is already running (PID {pid})");
        }
    }
    pid_file
        .write(own)
        .with_context(|| format!("Failed to write {:?}", pid_file.path()))
}

fn release_pid_file(pid_file: &PidFile) {
    if pid_file.read() == Some(std::process::id()) {
        if let Err(e) = pid_file.remove() {
            warn!(error = %e, "Failed to remove PID file");
        }
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
pub async fn shutdown_signal() -> ShutdownReason {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => ShutdownReason::Interrupt,
        _ = terminate => ShutdownReason::Terminate,
    }
}
