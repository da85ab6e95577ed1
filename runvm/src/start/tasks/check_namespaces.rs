//! Task: decline namespace joins before any supervisor exists.

use super::{StartCtx, require, task_start};
use crate::gate::check_namespaces;
use crate::pipeline::PipelineTask;
use async_trait::async_trait;
use runvm_shared::RunvmResult;

pub struct CheckNamespacesTask;

#[async_trait]
impl PipelineTask<StartCtx> for CheckNamespacesTask {
    async fn run(self: Box<Self>, ctx: StartCtx) -> RunvmResult<()> {
        let task_name = self.name();
        task_start(&ctx, task_name).await;
        let ctx = ctx.lock().await;
        check_namespaces(require(ctx.spec.as_ref(), "specification", task_name)?)
    }

    fn name(&self) -> &str {
        "check_namespaces"
    }
}
