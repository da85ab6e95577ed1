//! Container supervisor (`runvm daemon`) and the client-side launcher that
//! starts it.

pub mod driver;
mod launcher;
mod marker;
mod supervisor;

pub use driver::{ContainerConsole, ContainerDriver, HostProcessDriver, driver_for};
pub use launcher::{DaemonLauncher, DetachedLauncher, ProcessLauncher, daemon_args};
pub use marker::{ExclusivityMarker, FlockMarker, MarkerGuard, MarkerState};
pub use supervisor::{DriverSelector, Supervisor};

use crate::runtime::ContainerLayout;
use runvm_shared::RunvmResult;

/// Leave the launching terminal's session so signals aimed at it do not
/// reach the supervisor.
pub fn detach_session() {
    match nix::unistd::setsid() {
        Ok(sid) => tracing::debug!(sid = sid.as_raw(), "Started new session"),
        Err(e) => tracing::warn!("setsid failed, staying in caller's session: {}", e),
    }
}

/// Run the supervisor for `layout` until its single session ends.
///
/// Returns 0 when another supervisor already owns the state directory.
pub async fn run_daemon(layout: ContainerLayout) -> RunvmResult<i32> {
    match Supervisor::bootstrap(layout, &FlockMarker)? {
        Some(supervisor) => supervisor.serve(&driver_for).await,
        None => Ok(0),
    }
}
