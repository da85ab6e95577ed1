//! runvm: start control-plane for hypervisor-isolated containers.
//!
//! `runvm start` validates the container's spec files, makes sure a
//! per-container supervisor is running, hands it the merged specification
//! over a Unix socket, and then splices the container console onto the
//! caller's terminal until the container exits.
//!
//! The supervisor is the same binary in `daemon` mode (see [`daemon`]).

pub mod daemon;
pub mod gate;
pub mod logging;
pub mod pipeline;
pub mod runtime;
pub mod spec;
pub mod splice;
pub mod start;
pub mod transport;

pub use runtime::{ContainerLayout, RuntimeOptions};
pub use spec::{ContainerIdentity, MergedSpecification, StartConfigInput, load_start_config};
pub use start::{Console, StartOrchestrator};

pub use runvm_shared::{RunvmError, RunvmResult};
