//! One pipeline task per start state.

mod await_session;
mod check_namespaces;
mod check_privilege;
mod connect;
mod ensure_daemon;
mod load_config;
mod send_start;
mod splice;

pub use await_session::AwaitSessionTask;
pub use check_namespaces::CheckNamespacesTask;
pub use check_privilege::CheckPrivilegeTask;
pub use connect::ConnectTask;
pub use ensure_daemon::EnsureDaemonTask;
pub use load_config::LoadConfigTask;
pub use send_start::SendStartTask;
pub use splice::SpliceTask;

use super::types::StartContext;
use runvm_shared::{RunvmError, RunvmResult};
use std::sync::Arc;
use tokio::sync::Mutex;

pub type StartCtx = Arc<Mutex<StartContext>>;

/// Log task entry and return the container name for structured fields.
pub(super) async fn task_start(ctx: &StartCtx, task_name: &str) -> String {
    let name = ctx.lock().await.container_name();
    tracing::debug!(container = %name, task = task_name, "Task starting");
    name
}

/// Missing output of an earlier task. Only reachable if the plan is wired
/// out of order.
pub(super) fn missing(what: &str, task_name: &str) -> RunvmError {
    RunvmError::Internal(format!("{} not available to task {}", what, task_name))
}

pub(super) fn require<T>(value: Option<T>, what: &str, task_name: &str) -> RunvmResult<T> {
    value.ok_or_else(|| missing(what, task_name))
}
