//! Task: load and merge `config.json` and `runtime.json`.

use super::{StartCtx, require, task_start};
use crate::pipeline::PipelineTask;
use crate::runtime::ContainerLayout;
use crate::spec::load_start_config;
use async_trait::async_trait;
use runvm_shared::RunvmResult;

pub struct LoadConfigTask;

#[async_trait]
impl PipelineTask<StartCtx> for LoadConfigTask {
    async fn run(self: Box<Self>, ctx: StartCtx) -> RunvmResult<()> {
        let task_name = self.name();
        task_start(&ctx, task_name).await;

        let mut ctx = ctx.lock().await;
        let input = require(ctx.input.take(), "start input", task_name)?;
        let spec = load_start_config(input)?;
        let layout = ContainerLayout::new(spec.identity.root(), spec.identity.name());

        tracing::debug!(
            container = %spec.identity.name(),
            bundle = %spec.identity.bundle_path().display(),
            driver = %spec.runtime_options.driver,
            "Loaded start configuration"
        );

        ctx.layout = Some(layout);
        ctx.spec = Some(spec);
        Ok(())
    }

    fn name(&self) -> &str {
        "load_config"
    }
}
