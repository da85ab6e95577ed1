//! Task: request a supervisor for this container. Does not wait for it.

use super::{StartCtx, require, task_start};
use crate::daemon::DaemonLauncher;
use crate::pipeline::PipelineTask;
use async_trait::async_trait;
use runvm_shared::RunvmResult;

pub struct EnsureDaemonTask;

#[async_trait]
impl PipelineTask<StartCtx> for EnsureDaemonTask {
    async fn run(self: Box<Self>, ctx: StartCtx) -> RunvmResult<()> {
        let task_name = self.name();
        let container = task_start(&ctx, task_name).await;

        let ctx = ctx.lock().await;
        let spec = require(ctx.spec.as_ref(), "specification", task_name)?;
        let launcher = DaemonLauncher::new(ctx.launcher.as_ref(), ctx.daemon_program.clone());
        launcher.ensure_daemon(spec.identity.root(), spec.identity.name())?;

        tracing::info!(container = %container, "Supervisor requested");
        Ok(())
    }

    fn name(&self) -> &str {
        "ensure_daemon"
    }
}
