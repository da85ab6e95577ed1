//! Sequential task pipeline.
//!
//! ```text
//! Pipeline → Tasks (run in order, first failure stops the run)
//! ```
//!
//! Each task gets a clone of the shared context; use interior mutability
//! (`Arc<Mutex<_>>`) to pass results forward.

mod metrics;
#[allow(clippy::module_inception)]
mod pipeline;
mod task;

pub use metrics::{PipelineMetrics, TaskMetrics};
pub use pipeline::{Pipeline, PipelineExecutor};
pub use task::{BoxedTask, PipelineTask};
