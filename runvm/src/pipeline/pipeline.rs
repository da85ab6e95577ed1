use super::metrics::{PipelineMetrics, TaskMetrics};
use super::task::BoxedTask;
use runvm_shared::RunvmResult;
use std::time::Instant;

pub struct Pipeline<Ctx> {
    tasks: Vec<BoxedTask<Ctx>>,
}

impl<Ctx> Pipeline<Ctx> {
    pub fn new(tasks: Vec<BoxedTask<Ctx>>) -> Self {
        Self { tasks }
    }

    pub fn task_names(&self) -> Vec<&str> {
        self.tasks.iter().map(|task| task.name()).collect()
    }
}

pub struct PipelineExecutor;

impl PipelineExecutor {
    /// Run every task in order. The first error aborts the run and is
    /// returned unchanged; tasks after it never start.
    pub async fn execute<Ctx>(pipeline: Pipeline<Ctx>, ctx: Ctx) -> RunvmResult<PipelineMetrics>
    where
        Ctx: Clone,
    {
        let total_start = Instant::now();
        let mut tasks = Vec::with_capacity(pipeline.tasks.len());

        for task in pipeline.tasks {
            let name = task.name().to_string();
            let task_start = Instant::now();
            if let Err(e) = task.run(ctx.clone()).await {
                tracing::debug!(
                    task = %name,
                    elapsed_ms = task_start.elapsed().as_millis() as u64,
                    "Task stopped the pipeline: {}",
                    e
                );
                return Err(e);
            }
            tasks.push(TaskMetrics {
                name,
                duration_ms: task_start.elapsed().as_millis(),
            });
        }

        Ok(PipelineMetrics {
            total_duration_ms: total_start.elapsed().as_millis(),
            tasks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::PipelineTask;
    use async_trait::async_trait;
    use runvm_shared::RunvmError;
    use std::sync::{Arc, Mutex};

    type Log = Arc<Mutex<Vec<String>>>;

    struct Step {
        name: &'static str,
        fail: bool,
    }

    #[async_trait]
    impl PipelineTask<Log> for Step {
        async fn run(self: Box<Self>, ctx: Log) -> RunvmResult<()> {
            ctx.lock().unwrap().push(self.name.to_string());
            if self.fail {
                return Err(RunvmError::NotImplemented(self.name.into()));
            }
            Ok(())
        }

        fn name(&self) -> &str {
            self.name
        }
    }

    fn step(name: &'static str, fail: bool) -> BoxedTask<Log> {
        Box::new(Step { name, fail })
    }

    #[tokio::test]
    async fn test_tasks_run_in_order() {
        let log: Log = Default::default();
        let pipeline = Pipeline::new(vec![step("a", false), step("b", false), step("c", false)]);
        assert_eq!(pipeline.task_names(), ["a", "b", "c"]);

        let metrics = PipelineExecutor::execute(pipeline, log.clone()).await.unwrap();
        assert_eq!(*log.lock().unwrap(), ["a", "b", "c"]);
        assert_eq!(metrics.tasks.len(), 3);
        assert!(metrics.task_duration_ms("b").is_some());
        assert!(metrics.task_duration_ms("missing").is_none());
    }

    #[tokio::test]
    async fn test_failure_short_circuits() {
        let log: Log = Default::default();
        let pipeline = Pipeline::new(vec![step("a", false), step("b", true), step("c", false)]);

        let err = PipelineExecutor::execute(pipeline, log.clone()).await.unwrap_err();
        assert!(matches!(err, RunvmError::NotImplemented(_)));
        assert_eq!(*log.lock().unwrap(), ["a", "b"]);
    }
}
