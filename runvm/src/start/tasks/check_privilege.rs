//! Task: refuse to go further without the rights to manage VMs.

use super::{StartCtx, task_start};
use crate::pipeline::PipelineTask;
use async_trait::async_trait;
use runvm_shared::RunvmResult;

pub struct CheckPrivilegeTask;

#[async_trait]
impl PipelineTask<StartCtx> for CheckPrivilegeTask {
    async fn run(self: Box<Self>, ctx: StartCtx) -> RunvmResult<()> {
        task_start(&ctx, self.name()).await;
        let gate = ctx.lock().await.privilege.clone();
        gate.check()
    }

    fn name(&self) -> &str {
        "check_privilege"
    }
}
