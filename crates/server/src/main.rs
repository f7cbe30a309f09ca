use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use courtwatch_server::cli::{self, Cli, LogFormat};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_format, cli.command.is_daemon());

    match cli::execute(cli).await {
        Ok(exit) => exit.into(),
        Err(e) => {
            println!("✗ {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// The daemon logs at info; client commands only surface warnings.
fn init_tracing(format: LogFormat, daemon: bool) {
    let default_filter = if daemon { "info,tower_http=debug" } else { "warn" };
    let json = format == LogFormat::Json;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(json.then(|| {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
        }))
        .with((!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .init();
}
