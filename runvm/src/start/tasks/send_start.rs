//! Task: send the merged specification as the start request.

use super::{StartCtx, require, task_start};
use crate::pipeline::PipelineTask;
use async_trait::async_trait;
use runvm_shared::{Frame, MessageCode, RunvmResult, write_frame};

pub struct SendStartTask;

#[async_trait]
impl PipelineTask<StartCtx> for SendStartTask {
    async fn run(self: Box<Self>, ctx: StartCtx) -> RunvmResult<()> {
        let task_name = self.name();
        task_start(&ctx, task_name).await;

        let mut ctx = ctx.lock().await;
        let body = require(ctx.spec.as_ref(), "specification", task_name)?.to_json()?;
        let stream = require(ctx.stream.as_mut(), "connection", task_name)?;

        write_frame(stream, &Frame::new(MessageCode::StartContainer, body)).await
    }

    fn name(&self) -> &str {
        "send_start"
    }
}
