//! Task: relay the console until the container exits.

use super::{StartCtx, require, task_start};
use crate::pipeline::PipelineTask;
use crate::splice::Session;
use crate::splice::tty::RawModeGuard;
use async_trait::async_trait;
use runvm_shared::RunvmResult;

pub struct SpliceTask;

#[async_trait]
impl PipelineTask<StartCtx> for SpliceTask {
    async fn run(self: Box<Self>, ctx: StartCtx) -> RunvmResult<()> {
        let task_name = self.name();
        let container = task_start(&ctx, task_name).await;

        let (stream, console) = {
            let mut ctx = ctx.lock().await;
            (
                require(ctx.stream.take(), "connection", task_name)?,
                require(ctx.console.take(), "console", task_name)?,
            )
        };

        let _raw = if console.raw_mode {
            RawModeGuard::enable_if_terminal()?
        } else {
            None
        };

        let (reader, writer) = stream.into_split();
        let status = Session::new(reader, writer)
            .run_until(console.stdio, console.resize, console.interrupt)
            .await?;

        tracing::info!(container = %container, status, "Session ended");
        ctx.lock().await.exit_status = Some(status);
        Ok(())
    }

    fn name(&self) -> &str {
        "splice"
    }
}
