//! Process controller types.

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::persist::PersistError;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("courtwatch is already running (PID {0})")]
    AlreadyRunning(u32),

    #[error("courtwatch is not running")]
    NotRunning,

    #[error("daemon failed to start: {0} (see the log file for details)")]
    StartFailed(String),

    #[error("failed to send {signal} to PID {pid}: {message}")]
    Signal {
        pid: u32,
        signal: &'static str,
        message: String,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Persist(#[from] PersistError),
}

/// Command line used to launch the daemon.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

impl LaunchSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

/// Result of a stop request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StopOutcome {
    pub pid: u32,
    /// SIGTERM was not honored in time and SIGKILL was sent.
    pub escalated: bool,
}

/// What the health monitor said, if anything.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum MonitorStatus {
    Reachable(serde_json::Value),
    Unreachable(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessStatus {
    pub running: bool,
    pub pid: Option<u32>,
    pub monitor: MonitorStatus,
}
