//! Types shared between the `runvm` client and its per-container supervisor.
//!
//! - [`errors`]: the error taxonomy and its mapping to process exit statuses
//! - [`protocol`]: length-prefixed control frames exchanged over the state socket
//! - [`constants`]: well-known file names inside a container's state directory

pub mod constants;
pub mod errors;
pub mod protocol;

pub use errors::{FrameError, RunvmError, RunvmResult};
pub use protocol::{Frame, MessageCode, WindowSize, read_frame, write_frame};
