//! File names inside `<root>/<name>/`.

/// Supervisor's listening endpoint.
pub const SOCKET_NAME: &str = "runv.sock";

/// Exclusive lock file held by the live supervisor.
pub const LOCK_NAME: &str = "daemon.lock";

/// PID of the live supervisor, written after the lock is held.
pub const PID_NAME: &str = "daemon.pid";

/// Supervisor log file (its stdio is detached).
pub const LOG_NAME: &str = "daemon.log";

/// Exit status reported when no better status is known.
pub const GENERIC_FAILURE_STATUS: i32 = -1;
