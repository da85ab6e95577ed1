//! Per-container state directory.
//!
//! ```text
//! <root>/<name>/
//! ├── runv.sock      supervisor endpoint
//! ├── daemon.lock    exclusivity marker (flock)
//! ├── daemon.pid     pid of the live supervisor
//! └── daemon.log     supervisor log
//! ```
//!
//! Every path is derived from `(root, name)` alone, so the client can find
//! the endpoint without talking to anyone first.

use runvm_shared::RunvmResult;
use runvm_shared::constants::{LOCK_NAME, LOG_NAME, PID_NAME, SOCKET_NAME};
use runvm_shared::errors::RunvmError;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerLayout {
    state_dir: PathBuf,
}

impl ContainerLayout {
    pub fn new(root: impl AsRef<Path>, name: &str) -> Self {
        Self {
            state_dir: root.as_ref().join(name),
        }
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    pub fn socket_path(&self) -> PathBuf {
        self.state_dir.join(SOCKET_NAME)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.state_dir.join(LOCK_NAME)
    }

    pub fn pid_path(&self) -> PathBuf {
        self.state_dir.join(PID_NAME)
    }

    pub fn log_path(&self) -> PathBuf {
        self.state_dir.join(LOG_NAME)
    }

    /// Create the state directory. Only the supervisor calls this.
    pub fn prepare(&self) -> RunvmResult<()> {
        std::fs::create_dir_all(&self.state_dir).map_err(|e| {
            RunvmError::Internal(format!(
                "Failed to create state directory {}: {}",
                self.state_dir.display(),
                e
            ))
        })
    }
}
