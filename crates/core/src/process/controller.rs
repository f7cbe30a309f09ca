//! Start, stop and inspect the background daemon.

use std::fs::OpenOptions;
use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Instant;

use tracing::{debug, info, warn};

use super::config::ControllerConfig;
use super::log;
use super::pid::{is_pid_alive, send_signal, PidFile, Signal};
use super::types::{LaunchSpec, MonitorStatus, ProcessError, ProcessStatus, StopOutcome};

/// Controls the daemon through its PID file, signals and health monitor.
pub struct ProcessController {
    config: ControllerConfig,
    pid_file: PidFile,
    log_file: PathBuf,
    monitor_url: String,
    http: reqwest::Client,
}

impl ProcessController {
    pub fn new(
        config: ControllerConfig,
        pid_file: impl Into<PathBuf>,
        log_file: impl Into<PathBuf>,
        monitor_url: impl Into<String>,
    ) -> Self {
        Self {
            config,
            pid_file: PidFile::new(pid_file),
            log_file: log_file.into(),
            monitor_url: monitor_url.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub fn pid_file(&self) -> &PidFile {
        &self.pid_file
    }

    pub fn log_file(&self) -> &Path {
        &self.log_file
    }

    /// PID of the running daemon. A stale PID file is removed.
    pub fn running_pid(&self) -> Result<Option<u32>, ProcessError> {
        match self.pid_file.read() {
            Some(pid) if is_pid_alive(pid) => Ok(Some(pid)),
            Some(pid) => {
                warn!(pid, path = %self.pid_file.path().display(), "Removing stale PID file");
                self.pid_file.remove()?;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    /// Launch the daemon detached, output appended to the log file.
    pub async fn start(&self, launch: LaunchSpec) -> Result<u32, ProcessError> {
        if let Some(pid) = self.running_pid()? {
            return Err(ProcessError::AlreadyRunning(pid));
        }

        let log = self.open_log()?;
        let log_err = log.try_clone().map_err(|e| self.log_io(e))?;

        let mut command = Command::new(&launch.program);
        command
            .args(&launch.args)
            .envs(launch.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err));
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            // Own process group, so the terminal's Ctrl-C does not reach it.
            command.process_group(0);
        }

        let mut child = command
            .spawn()
            .map_err(|e| ProcessError::StartFailed(format!("{}: {e}", launch.program.display())))?;
        let pid = child.id();
        self.pid_file.write(pid)?;
        info!(pid, program = %launch.program.display(), "Daemon launched");

        tokio::time::sleep(self.config.start_grace()).await;

        match child.try_wait() {
            Ok(None) => Ok(pid),
            Ok(Some(status)) => {
                self.pid_file.remove()?;
                Err(ProcessError::StartFailed(format!("exited early with {status}")))
            }
            Err(e) => {
                self.pid_file.remove()?;
                Err(ProcessError::StartFailed(e.to_string()))
            }
        }
    }

    /// SIGTERM, wait up to the stop timeout, then SIGKILL.
    pub async fn stop(&self) -> Result<StopOutcome, ProcessError> {
        let pid = self.running_pid()?.ok_or(ProcessError::NotRunning)?;

        info!(pid, "Sending SIGTERM");
        send_signal(pid, Signal::Term)?;

        let mut escalated = false;
        if !self.wait_for_exit(pid, self.config.stop_timeout()).await {
            warn!(
                pid,
                timeout_secs = self.config.stop_timeout_secs,
                "Daemon ignored SIGTERM, sending SIGKILL"
            );
            send_signal(pid, Signal::Kill)?;
            escalated = true;
            self.wait_for_exit(pid, self.config.stop_timeout()).await;
        }

        self.pid_file.remove()?;
        Ok(StopOutcome { pid, escalated })
    }

    /// Stop if running, then start.
    pub async fn restart(&self, launch: LaunchSpec) -> Result<u32, ProcessError> {
        match self.stop().await {
            Ok(outcome) => debug!(pid = outcome.pid, "Stopped before restart"),
            Err(ProcessError::NotRunning) => {}
            Err(e) => return Err(e),
        }
        self.start(launch).await
    }

    /// Process state plus the monitor's `/status` document.
    pub async fn status(&self) -> Result<ProcessStatus, ProcessError> {
        self.probe("/status").await
    }

    /// Process state plus the monitor's `/health` document.
    pub async fn health(&self) -> Result<ProcessStatus, ProcessError> {
        self.probe("/health").await
    }

    pub async fn tail_log(&self, lines: usize) -> Result<Vec<String>, ProcessError> {
        log::tail_lines(&self.log_file, lines).await
    }

    /// Stream appended log output into `out` until `stop` resolves.
    pub async fn follow<W: Write>(
        &self,
        out: &mut W,
        stop: impl Future<Output = ()>,
    ) -> Result<(), ProcessError> {
        log::follow_file(&self.log_file, self.config.poll_interval(), out, stop).await
    }

    async fn probe(&self, endpoint: &str) -> Result<ProcessStatus, ProcessError> {
        let pid = self.running_pid()?;
        let monitor = match pid {
            Some(_) => self.query(endpoint).await,
            None => MonitorStatus::Unreachable("daemon is not running".to_string()),
        };
        Ok(ProcessStatus {
            running: pid.is_some(),
            pid,
            monitor,
        })
    }

    async fn query(&self, endpoint: &str) -> MonitorStatus {
        let url = format!("{}{}", self.monitor_url, endpoint);
        let response = match self
            .http
            .get(&url)
            .timeout(self.config.health_timeout())
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                debug!(url = %url, error = %e, "Health monitor unreachable");
                return MonitorStatus::Unreachable(e.to_string());
            }
        };
        match response.json::<serde_json::Value>().await {
            Ok(body) => MonitorStatus::Reachable(body),
            Err(e) => MonitorStatus::Unreachable(format!("invalid response from {url}: {e}")),
        }
    }

    async fn wait_for_exit(&self, pid: u32, timeout: std::time::Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if !is_pid_alive(pid) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(self.config.poll_interval()).await;
        }
    }

    fn open_log(&self) -> Result<std::fs::File, ProcessError> {
        if let Some(parent) = self.log_file.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| self.log_io(e))?;
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_file)
            .map_err(|e| self.log_io(e))
    }

    fn log_io(&self, source: std::io::Error) -> ProcessError {
        ProcessError::Io {
            path: self.log_file.clone(),
            source,
        }
    }
}
