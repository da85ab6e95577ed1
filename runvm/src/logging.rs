//! Tracing subscriber setup for the client and the supervisor.

use crate::runtime::ContainerLayout;
use runvm_shared::{RunvmError, RunvmResult};
use std::fs::OpenOptions;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "warn";
const DAEMON_DEFAULT_FILTER: &str = "info";

fn filter_or(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Log to stderr, filtered by `RUST_LOG` (default `warn`).
pub fn init_cli_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter_or(DEFAULT_FILTER))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Log to `<state_dir>/daemon.log`; the supervisor's stdio is detached.
///
/// Keep the returned guard alive for the lifetime of the process, or
/// buffered lines are lost.
pub fn init_daemon_logging(layout: &ContainerLayout) -> RunvmResult<WorkerGuard> {
    layout.prepare()?;
    let log_path = layout.log_path();
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .map_err(|e| {
            RunvmError::Internal(format!("Failed to open {}: {}", log_path.display(), e))
        })?;
    let (writer, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_env_filter(filter_or(DAEMON_DEFAULT_FILTER))
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .map_err(|e| RunvmError::Internal(format!("Failed to install logger: {}", e)))?;

    Ok(guard)
}
