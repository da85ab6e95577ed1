//! `runvm start`: bring a container up and splice its console.
//!
//! ## Pipeline
//!
//! ```text
//! 1. LoadConfig        (merge config.json + runtime.json)
//! 2. CheckPrivilege    (effective uid must be root)
//! 3. CheckNamespaces   (namespace joins are declined, exit 0)
//! 4. EnsureDaemon      (fire-and-forget supervisor spawn)
//! 5. Connect           (bounded retry on the state socket)
//! 6. SendStart         (STARTCONTAINER with the merged spec)
//! 7. AwaitSession      (ACK, or ERROR from the supervisor)
//! 8. Splice            (console relay until EXIT)
//! ```
//!
//! The first failing task ends the run; [`RunvmError::exit_status`] maps
//! the failure to the process exit status.
//!
//! [`RunvmError::exit_status`]: runvm_shared::RunvmError::exit_status

mod tasks;
mod types;

pub use types::{Console, StartContext};

use crate::daemon::{DetachedLauncher, ProcessLauncher};
use crate::gate::{EffectiveUidGate, PrivilegeGate};
use crate::pipeline::{BoxedTask, Pipeline, PipelineExecutor};
use crate::spec::StartConfigInput;
use crate::transport::ConnectPolicy;
use runvm_shared::{RunvmError, RunvmResult};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

use tasks::{
    AwaitSessionTask, CheckNamespacesTask, CheckPrivilegeTask, ConnectTask, EnsureDaemonTask,
    LoadConfigTask, SendStartTask, SpliceTask, StartCtx,
};

fn start_plan() -> Pipeline<StartCtx> {
    let tasks: Vec<BoxedTask<StartCtx>> = vec![
        Box::new(LoadConfigTask),
        Box::new(CheckPrivilegeTask),
        Box::new(CheckNamespacesTask),
        Box::new(EnsureDaemonTask),
        Box::new(ConnectTask),
        Box::new(SendStartTask),
        Box::new(AwaitSessionTask),
        Box::new(SpliceTask),
    ];
    Pipeline::new(tasks)
}

/// Drives one `start` from loaded config to container exit.
pub struct StartOrchestrator {
    privilege: Arc<dyn PrivilegeGate>,
    launcher: Arc<dyn ProcessLauncher>,
    daemon_program: PathBuf,
    connect_policy: ConnectPolicy,
}

impl StartOrchestrator {
    /// Spawn supervisors by running `daemon_program daemon`.
    pub fn new(daemon_program: PathBuf) -> Self {
        Self {
            privilege: Arc::new(EffectiveUidGate),
            launcher: Arc::new(DetachedLauncher),
            daemon_program,
            connect_policy: ConnectPolicy::default(),
        }
    }

    /// Use this executable as the supervisor.
    pub fn for_current_exe() -> RunvmResult<Self> {
        let program = std::env::current_exe().map_err(|e| {
            RunvmError::DaemonSpawn(format!("Failed to locate own executable: {}", e))
        })?;
        Ok(Self::new(program))
    }

    pub fn with_privilege_gate(mut self, gate: Arc<dyn PrivilegeGate>) -> Self {
        self.privilege = gate;
        self
    }

    pub fn with_launcher(mut self, launcher: Arc<dyn ProcessLauncher>) -> Self {
        self.launcher = launcher;
        self
    }

    pub fn with_connect_policy(mut self, policy: ConnectPolicy) -> Self {
        self.connect_policy = policy;
        self
    }

    /// Run the start pipeline. `Ok` carries the container's exit status.
    pub async fn start(&self, input: StartConfigInput, console: Console) -> RunvmResult<i32> {
        let ctx: StartCtx = Arc::new(Mutex::new(StartContext {
            privilege: Arc::clone(&self.privilege),
            launcher: Arc::clone(&self.launcher),
            daemon_program: self.daemon_program.clone(),
            connect_policy: self.connect_policy,
            input: Some(input),
            console: Some(console),
            spec: None,
            layout: None,
            stream: None,
            exit_status: None,
        }));

        let metrics = PipelineExecutor::execute(start_plan(), Arc::clone(&ctx)).await?;
        metrics.log();

        ctx.lock()
            .await
            .exit_status
            .ok_or_else(|| RunvmError::Internal("splice finished without an exit status".into()))
    }
}
