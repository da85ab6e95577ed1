//! Task: connect to the supervisor endpoint, retrying while it comes up.

use super::{StartCtx, require, task_start};
use crate::pipeline::PipelineTask;
use crate::transport;
use async_trait::async_trait;
use runvm_shared::RunvmResult;

pub struct ConnectTask;

#[async_trait]
impl PipelineTask<StartCtx> for ConnectTask {
    async fn run(self: Box<Self>, ctx: StartCtx) -> RunvmResult<()> {
        let task_name = self.name();
        let container = task_start(&ctx, task_name).await;

        let (socket_path, policy) = {
            let ctx = ctx.lock().await;
            let layout = require(ctx.layout.as_ref(), "state layout", task_name)?;
            (layout.socket_path(), ctx.connect_policy)
        };

        // Lock released while retrying
        let stream = transport::connect(&socket_path, policy).await?;
        tracing::debug!(container = %container, socket = %socket_path.display(), "Connected");

        ctx.lock().await.stream = Some(stream);
        Ok(())
    }

    fn name(&self) -> &str {
        "connect"
    }
}
