//! End-to-end tests against the `courtwatch` binary.

use std::net::TcpListener;
use std::path::Path;
use std::time::Duration;

use reqwest::Client;
use tempfile::TempDir;
use tokio::time::{sleep, timeout};

use courtwatch_core::process::{send_signal, PidFile, Signal};

/// Find an available port
fn get_available_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// A config keeping every file inside `dir`.
fn write_config(dir: &Path, port: u16) -> std::path::PathBuf {
    let d = dir.display();
    let content = format!(
        r#"
[server]
host = "127.0.0.1"
port = {port}

[paths]
pid_file = "{d}/courtwatch.pid"
log_file = "{d}/courtwatch.log"
task_queue = "{d}/task_queue.json"
coverage_report = "{d}/coverage_report.json"
expectations = "{d}/coverage_expectations.toml"
inventory = "{d}/inventory.json"
approvals_db = "{d}/approvals.db"
"#
    );
    let path = dir.join("courtwatch.toml");
    std::fs::write(&path, content).unwrap();
    path
}

fn courtwatch(config_path: &Path) -> tokio::process::Command {
    let mut command = tokio::process::Command::new(env!("CARGO_BIN_EXE_courtwatch"));
    command
        .arg("--config")
        .arg(config_path)
        .env("RUST_LOG", "error") // Quiet logs during tests
        .kill_on_drop(true);
    command
}

/// Wait for the health monitor to answer
async fn wait_for_server(port: u16, max_attempts: u32) -> bool {
    let client = Client::new();
    for _ in 0..max_attempts {
        if client
            .get(format!("http://127.0.0.1:{}/health", port))
            .send()
            .await
            .is_ok()
        {
            return true;
        }
        sleep(Duration::from_millis(50)).await;
    }
    false
}

#[tokio::test]
async fn test_run_serves_health_and_stops_on_sigterm() {
    let dir = TempDir::new().unwrap();
    let port = get_available_port();
    let config_path = write_config(dir.path(), port);

    let mut daemon = courtwatch(&config_path).arg("run").spawn().unwrap();
    assert!(
        wait_for_server(port, 100).await,
        "Daemon did not start in time"
    );

    let client = Client::new();
    let health: serde_json::Value = client
        .get(format!("http://127.0.0.1:{}/health", port))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(health["components"]["cycle"].is_object());
    assert!(health["components"]["monitor"].is_object());

    let pid = daemon.id().unwrap();
    let pid_file = PidFile::new(dir.path().join("courtwatch.pid"));
    assert_eq!(pid_file.read(), Some(pid));

    send_signal(pid, Signal::Term).unwrap();
    let status = timeout(Duration::from_secs(15), daemon.wait())
        .await
        .expect("Daemon did not stop after SIGTERM")
        .unwrap();

    assert!(status.success());
    assert_eq!(pid_file.read(), None);
}

#[tokio::test]
async fn test_missing_config_file_exits_with_error() {
    let output = timeout(
        Duration::from_secs(5),
        courtwatch(Path::new("/nonexistent/courtwatch.toml"))
            .arg("run")
            .output(),
    )
    .await
    .expect("Command timed out")
    .expect("Failed to execute command");

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stdout).contains("✗"));
}

#[tokio::test]
async fn test_invalid_config_exits_with_error() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("courtwatch.toml");
    std::fs::write(&config_path, "[reconciliation]\nseason_start_month = 13\n").unwrap();

    let output = courtwatch(&config_path).arg("run").output().await.unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stdout).contains("season_start_month"));
}

#[tokio::test]
async fn test_status_when_not_running() {
    let dir = TempDir::new().unwrap();
    let config_path = write_config(dir.path(), get_available_port());

    let output = courtwatch(&config_path).arg("status").output().await.unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stdout).contains("✗ courtwatch is not running"));
}

#[tokio::test]
async fn test_stop_when_not_running() {
    let dir = TempDir::new().unwrap();
    let config_path = write_config(dir.path(), get_available_port());

    let output = courtwatch(&config_path).arg("stop").output().await.unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stdout).contains("not running"));
}

#[tokio::test]
async fn test_tasks_without_queue() {
    let dir = TempDir::new().unwrap();
    let config_path = write_config(dir.path(), get_available_port());

    let output = courtwatch(&config_path).arg("tasks").output().await.unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stdout).contains("no task queue"));
}

#[tokio::test]
async fn test_status_fails_when_monitor_unreachable() {
    let dir = TempDir::new().unwrap();
    let config_path = write_config(dir.path(), get_available_port());

    // A live process that owns the PID file but serves nothing.
    let mut stand_in = tokio::process::Command::new("sleep")
        .arg("30")
        .kill_on_drop(true)
        .spawn()
        .unwrap();
    let pid_file = PidFile::new(dir.path().join("courtwatch.pid"));
    pid_file.write(stand_in.id().unwrap()).unwrap();

    let output = courtwatch(&config_path).arg("status").output().await.unwrap();

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(output.status.code(), Some(1));
    assert!(stdout.contains("✓ courtwatch is running"));
    assert!(stdout.contains("✗ health monitor unreachable"));

    stand_in.kill().await.unwrap();
}
