//! Daemon process control: PID file, signals, monitor queries and logs.

mod config;
mod controller;
mod log;
mod pid;
mod types;

pub use config::ControllerConfig;
pub use controller::ProcessController;
pub use log::{follow_file, tail_lines};
pub use pid::{is_pid_alive, send_signal, PidFile, Signal};
pub use types::{LaunchSpec, MonitorStatus, ProcessError, ProcessStatus, StopOutcome};
