//! Error taxonomy for the start control-plane.

use std::path::PathBuf;

use crate::constants::GENERIC_FAILURE_STATUS;

/// Result alias used across runvm crates.
pub type RunvmResult<T> = Result<T, RunvmError>;

/// Framing failures detected while decoding a control frame.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FrameError {
    /// The stream ended before the declared number of bytes arrived.
    #[error("short read: expected {expected} bytes, received {received}")]
    ShortRead { expected: usize, received: usize },

    /// Header is inconsistent (oversized length, unknown code, bad payload shape).
    #[error("malformed frame: {0}")]
    Malformed(String),
}

#[derive(Debug, thiserror::Error)]
pub enum RunvmError {
    /// Identity missing, spec file missing, unreadable or malformed.
    #[error("config error: {0}")]
    Config(String),

    /// Caller lacks the rights needed to manage VMs and devices.
    #[error("insufficient privilege: {0}")]
    InsufficientPrivilege(String),

    /// Recognised but declined request. Exits with status 0.
    #[error("not implemented: {0}")]
    NotImplemented(String),

    /// The OS refused to create the supervisor process.
    #[error("failed to spawn daemon: {0}")]
    DaemonSpawn(String),

    /// Connect retries were exhausted.
    #[error("daemon unreachable at {} after {attempts} attempt(s): {reason}", path.display())]
    DaemonUnreachable {
        path: PathBuf,
        attempts: u32,
        reason: String,
    },

    /// Transport corruption. Never swallowed.
    #[error("protocol error: {0}")]
    Protocol(#[from] FrameError),

    /// Writing to the supervisor connection failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// The supervisor refused to start the container.
    #[error("container start failed: {0}")]
    ContainerStart(String),

    /// I/O failure while relaying the console.
    #[error("session error: {0}")]
    Session(String),

    /// Requested backend is not available in this build.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Container backend failure on the supervisor side.
    #[error("engine error: {0}")]
    Engine(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RunvmError {
    /// Process exit status for a start that terminated with this error.
    pub fn exit_status(&self) -> i32 {
        match self {
            RunvmError::NotImplemented(_) => 0,
            _ => GENERIC_FAILURE_STATUS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declined_feature_exits_zero() {
        let err = RunvmError::NotImplemented("joining namespaces".into());
        assert_eq!(err.exit_status(), 0);
    }

    #[test]
    fn test_fatal_errors_exit_generic_failure() {
        let errors = [
            RunvmError::Config("missing id".into()),
            RunvmError::InsufficientPrivilege("euid 1000".into()),
            RunvmError::DaemonSpawn("ENOENT".into()),
            RunvmError::Protocol(FrameError::Malformed("bad".into())),
            RunvmError::Session("broken pipe".into()),
        ];
        for err in errors {
            assert_eq!(err.exit_status(), -1, "{err}");
        }
    }

    #[test]
    fn test_unreachable_message_names_endpoint() {
        let err = RunvmError::DaemonUnreachable {
            path: PathBuf::from("/run/runvm/c1/runv.sock"),
            attempts: 3,
            reason: "connection refused".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("/run/runvm/c1/runv.sock"));
        assert!(msg.contains("3 attempt(s)"));
    }
}
