//! Task: wait for the supervisor to accept or refuse the start request.

use super::{StartCtx, require, task_start};
use crate::pipeline::PipelineTask;
use async_trait::async_trait;
use runvm_shared::protocol::HEADER_LEN;
use runvm_shared::{FrameError, MessageCode, RunvmError, RunvmResult, read_frame};

pub struct AwaitSessionTask;

#[async_trait]
impl PipelineTask<StartCtx> for AwaitSessionTask {
    async fn run(self: Box<Self>, ctx: StartCtx) -> RunvmResult<()> {
        let task_name = self.name();
        let container = task_start(&ctx, task_name).await;

        let mut ctx = ctx.lock().await;
        let stream = require(ctx.stream.as_mut(), "connection", task_name)?;

        let reply = read_frame(stream).await?.ok_or(FrameError::ShortRead {
            expected: HEADER_LEN,
            received: 0,
        })?;

        match reply.message_code()? {
            MessageCode::Ack => {
                tracing::info!(container = %container, "Container started");
                Ok(())
            }
            MessageCode::Error => Err(RunvmError::ContainerStart(
                String::from_utf8_lossy(&reply.payload).into_owned(),
            )),
            other => Err(FrameError::Malformed(format!(
                "expected start reply, got {:?}",
                other
            ))
            .into()),
        }
    }

    fn name(&self) -> &str {
        "await_session"
    }
}
