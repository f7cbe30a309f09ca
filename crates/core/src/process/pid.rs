//! PID file and signal helpers.

use std::path::{Path, PathBuf};
use std::process::Command;

use super::types::ProcessError;
use crate::persist;

/// The daemon's recorded PID.
#[derive(Debug, Clone)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Recorded PID. Missing, empty or garbled files read as `None`.
    pub fn read(&self) -> Option<u32> {
        std::fs::read_to_string(&self.path)
            .ok()?
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|pid| *pid > 0)
    }

    pub fn write(&self, pid: u32) -> Result<(), ProcessError> {
        persist::atomic_write(&self.path, format!("{pid}\n").as_bytes())?;
        Ok(())
    }

    /// Remove the file. Succeeds if it is already gone.
    pub fn remove(&self) -> Result<(), ProcessError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(ProcessError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Term,
    Kill,
}

impl Signal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Term => "SIGTERM",
            Signal::Kill => "SIGKILL",
        }
    }

    fn flag(&self) -> &'static str {
        match self {
            Signal::Term => "-TERM",
            Signal::Kill => "-KILL",
        }
    }
}

/// Whether a process with this PID exists (`kill -0`).
pub fn is_pid_alive(pid: u32) -> bool {
    #[cfg(unix)]
    {
        Command::new("kill")
            .args(["-0", &pid.to_string()])
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }
    #[cfg(not(unix))]
    {
        let _ = pid;
        false
    }
}

pub fn send_signal(pid: u32, signal: Signal) -> Result<(), ProcessError> {
    #[cfg(unix)]
    {
        let output = Command::new("kill")
            .args([signal.flag(), &pid.to_string()])
            .output()
            .map_err(|e| ProcessError::Signal {
                pid,
                signal: signal.as_str(),
                message: e.to_string(),
            })?;
        if !output.status.success() {
            return Err(ProcessError::Signal {
                pid,
                signal: signal.as_str(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
    #[cfg(not(unix))]
    {
        Err(ProcessError::Signal {
            pid,
            signal: signal.as_str(),
            message: format!("signals are not supported on this platform ({})", signal.flag()),
        })
    }
}
