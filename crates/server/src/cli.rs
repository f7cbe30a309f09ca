//! Command line interface.
//!
//! `courtwatch run` is the daemon itself; every other command talks to a
//! running daemon through its PID file, log file and health monitor.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};

use courtwatch_core::{
    load_config, validate_config, Config, LaunchSpec, MonitorStatus, ProcessController,
    ProcessError, ProcessStatus, TaskPriority, TaskQueueStore,
};

use crate::daemon;

/// Adaptive crawl control plane for multi-source sports data collection.
#[derive(Debug, Parser)]
#[command(name = "courtwatch")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file.
    #[arg(
        long,
        short = 'c',
        env = "COURTWATCH_CONFIG",
        default_value = "courtwatch.toml",
        global = true
    )]
    pub config: PathBuf,

    /// Log output format.
    #[arg(
        long,
        env = "COURTWATCH_LOG_FORMAT",
        value_enum,
        default_value_t = LogFormat::Text,
        global = true
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the daemon in the background.
    Start(DaemonFlags),
    /// Stop the background daemon (SIGTERM, then SIGKILL).
    Stop,
    /// Stop the daemon if running, then start it.
    Restart(DaemonFlags),
    /// Show process state and the monitor's status document.
    Status,
    /// Check the monitor's health endpoint.
    Health,
    /// Show the daemon log.
    Logs(LogsArgs),
    /// Summarize the current task queue file.
    Tasks,
    /// Run the daemon in the foreground.
    Run(RunArgs),
}

impl Command {
    /// Commands that run or launch the daemon need a valid config file.
    pub fn needs_strict_config(&self) -> bool {
        matches!(self, Command::Run(_) | Command::Start(_) | Command::Restart(_))
    }

    pub fn is_daemon(&self) -> bool {
        matches!(self, Command::Run(_))
    }
}

#[derive(Debug, Clone, Copy, Default, Args)]
pub struct DaemonFlags {
    /// Log what workers would do without crawling.
    #[arg(long)]
    pub dry_run: bool,

    /// Skip reconciliation and execute the existing task queue file.
    #[arg(long)]
    pub test_mode: bool,
}

#[derive(Debug, Clone, Copy, Default, Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub flags: DaemonFlags,

    /// Run a single cycle and exit.
    #[arg(long)]
    pub once: bool,
}

#[derive(Debug, Clone, Copy, Args)]
pub struct LogsArgs {
    /// Number of lines to show.
    #[arg(long, short = 'n', default_value_t = 50)]
    pub tail: usize,

    /// Keep printing appended lines until Ctrl-C.
    #[arg(long, short = 'f')]
    pub follow: bool,
}

/// How a command ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    Success,
    Failure,
    /// Ctrl-C
    Interrupted,
}

impl Exit {
    pub fn code(self) -> u8 {
        match self {
            Exit::Success => 0,
            Exit::Failure => 1,
            Exit::Interrupted => 130,
        }
    }
}

impl From<Exit> for ExitCode {
    fn from(exit: Exit) -> Self {
        ExitCode::from(exit.code())
    }
}

/// Load the config file. Read-only commands fall back to defaults when the
/// file does not exist, so `status` works from any directory.
pub fn load(path: &Path, strict: bool) -> Result<Config> {
    if !strict && !path.exists() {
        return Ok(Config::default());
    }
    let config =
        load_config(path).with_context(|| format!("Failed to load config from {:?}", path))?;
    if strict {
        validate_config(&config).context("Invalid configuration")?;
    }
    Ok(config)
}

pub async fn execute(cli: Cli) -> Result<Exit> {
    let config = load(&cli.config, cli.command.needs_strict_config())?;
    let controller = controller(&config);

    match cli.command {
        Command::Start(flags) => start(&controller, launch_spec(&cli.config, flags)?).await,
        Command::Restart(flags) => restart(&controller, launch_spec(&cli.config, flags)?).await,
        Command::Stop => stop(&controller).await,
        Command::Status => status(&controller).await,
        Command::Health => health(&controller).await,
        Command::Logs(args) => logs(&controller, args).await,
        Command::Tasks => Ok(tasks(&config)),
        Command::Run(args) => daemon::run(config, args, Vec::new()).await,
    }
}

pub fn controller(config: &Config) -> ProcessController {
    ProcessController::new(
        config.controller.clone(),
        &config.paths.pid_file,
        &config.paths.log_file,
        config.monitor_url(),
    )
}

/// Re-invoke this binary as `run`, carrying over the config path and flags.
pub fn launch_spec(config_path: &Path, flags: DaemonFlags) -> Result<LaunchSpec> {
    let program = std::env::current_exe().context("Cannot locate the courtwatch binary")?;
    let config_path = std::path::absolute(config_path)
        .with_context(|| format!("Cannot resolve {:?}", config_path))?;

    let mut spec = LaunchSpec::new(program)
        .arg("--config")
        .arg(config_path.display().to_string())
        .arg("run");
    if flags.dry_run {
        spec = spec.arg("--dry-run");
    }
    if flags.test_mode {
        spec = spec.arg("--test-mode");
    }
    Ok(spec)
}

fn ok(message: impl AsRef<str>) {
    println!("✓ {}", message.as_ref());
}

fn fail(message: impl AsRef<str>) {
    println!("✗ {}", message.as_ref());
}

async fn start(controller: &ProcessController, spec: LaunchSpec) -> Result<Exit> {
    match controller.start(spec).await {
        Ok(pid) => {
            ok(format!("courtwatch started (PID {pid})"));
            println!("  log: {}", controller.log_file().display());
            Ok(Exit::Success)
        }
        Err(e @ (ProcessError::AlreadyRunning(_) | ProcessError::StartFailed(_))) => {
            fail(e.to_string());
            Ok(Exit::Failure)
        }
        Err(e) => Err(e.into()),
    }
}

async fn restart(controller: &ProcessController, spec: LaunchSpec) -> Result<Exit> {
    match controller.restart(spec).await {
        Ok(pid) => {
            ok(format!("courtwatch restarted (PID {pid})"));
            Ok(Exit::Success)
        }
        Err(ProcessError::StartFailed(message)) => {
            fail(format!("daemon failed to start: {message}"));
            Ok(Exit::Failure)
        }
        Err(e) => Err(e.into()),
    }
}

async fn stop(controller: &ProcessController) -> Result<Exit> {
    match controller.stop().await {
        Ok(outcome) if outcome.escalated => {
            ok(format!(
                "courtwatch stopped (PID {}, killed after ignoring SIGTERM)",
                outcome.pid
            ));
            Ok(Exit::Success)
        }
        Ok(outcome) => {
            ok(format!("courtwatch stopped (PID {})", outcome.pid));
            Ok(Exit::Success)
        }
        Err(ProcessError::NotRunning) => {
            fail("courtwatch is not running");
            Ok(Exit::Failure)
        }
        Err(e) => Err(e.into()),
    }
}

fn print_process(status: &ProcessStatus) {
    match status.pid {
        Some(pid) => ok(format!("courtwatch is running (PID {pid})")),
        None => fail("courtwatch is not running"),
    }
}

async fn status(controller: &ProcessController) -> Result<Exit> {
    let status = controller.status().await?;
    print_process(&status);
    if !status.running {
        return Ok(Exit::Failure);
    }

    match &status.monitor {
        MonitorStatus::Reachable(doc) => {
            ok("health monitor reachable");
            println!("{}", serde_json::to_string_pretty(doc)?);
            Ok(Exit::Success)
        }
        // Alive but not answering, e.g. still binding or wedged.
        MonitorStatus::Unreachable(reason) => {
            fail(format!("health monitor unreachable: {reason}"));
            Ok(Exit::Failure)
        }
    }
}

async fn health(controller: &ProcessController) -> Result<Exit> {
    let status = controller.health().await?;
    print_process(&status);

    match &status.monitor {
        MonitorStatus::Reachable(doc) => {
            let overall = doc["status"].as_str().unwrap_or("unknown");
            if let Some(components) = doc["components"].as_object() {
                for (name, component) in components {
                    let phase = component["status"].as_str().unwrap_or("unknown");
                    let line = match component["message"].as_str() {
                        Some(message) => format!("{name}: {phase} ({message})"),
                        None => format!("{name}: {phase}"),
                    };
                    if phase == "alive" {
                        ok(line);
                    } else {
                        fail(line);
                    }
                }
            }
            if overall == "healthy" {
                ok("healthy");
                Ok(Exit::Success)
            } else {
                fail(overall);
                Ok(Exit::Failure)
            }
        }
        MonitorStatus::Unreachable(reason) => {
            if status.running {
                fail(format!("health monitor unreachable: {reason}"));
            }
            Ok(Exit::Failure)
        }
    }
}

async fn logs(controller: &ProcessController, args: LogsArgs) -> Result<Exit> {
    let lines = match controller.tail_log(args.tail).await {
        Ok(lines) => lines,
        Err(ProcessError::Io { path, source })
            if source.kind() == std::io::ErrorKind::NotFound =>
        {
            fail(format!("no log file at {}", path.display()));
            return Ok(Exit::Failure);
        }
        Err(e) => return Err(e.into()),
    };

    let mut stdout = std::io::stdout();
    for line in &lines {
        writeln!(stdout, "{line}")?;
    }
    stdout.flush()?;

    if !args.follow {
        return Ok(Exit::Success);
    }

    controller
        .follow(&mut stdout, async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(Exit::Interrupted)
}

fn tasks(config: &Config) -> Exit {
    let store = TaskQueueStore::new(&config.paths.task_queue);
    let queue = match store.read() {
        Ok(Some(queue)) => queue,
        Ok(None) => {
            fail(format!("no task queue at {}", store.path().display()));
            return Exit::Failure;
        }
        Err(e) => {
            fail(e.to_string());
            return Exit::Failure;
        }
    };

    ok(format!(
        "{} tasks generated at {}",
        queue.total_tasks,
        queue.generated_at.to_rfc3339()
    ));
    for priority in TaskPriority::ALL {
        let count = queue.by_priority.get(priority.as_str()).copied().unwrap_or(0);
        println!("  {:<9}{count}", priority.as_str());
    }
    for (source, count) in &queue.by_source {
        println!("  {source}: {count}");
    }
    println!(
        "  estimated: {:.1} minutes",
        queue.estimated_total_minutes
    );
    Exit::Success
}
