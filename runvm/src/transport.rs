//! Client side of the supervisor endpoint.

use runvm_shared::{RunvmError, RunvmResult};
use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;
use tokio::net::UnixStream;

/// How long to keep knocking while a freshly spawned supervisor binds.
#[derive(Debug, Clone, Copy)]
pub struct ConnectPolicy {
    pub attempts: u32,
    pub interval: Duration,
    /// Bound on a single connect call.
    pub attempt_timeout: Duration,
}

impl Default for ConnectPolicy {
    fn default() -> Self {
        Self {
            attempts: 50,
            interval: Duration::from_millis(100),
            attempt_timeout: Duration::from_secs(1),
        }
    }
}

impl ConnectPolicy {
    /// A single attempt with no waiting.
    pub fn once() -> Self {
        Self {
            attempts: 1,
            interval: Duration::ZERO,
            ..Self::default()
        }
    }
}

/// Connect to the supervisor at `path`.
///
/// Only "not there yet" conditions (missing socket file, refused connection,
/// attempt timeout) are retried; anything else fails immediately.
pub async fn connect(path: &Path, policy: ConnectPolicy) -> RunvmResult<UnixStream> {
    let attempts = policy.attempts.max(1);
    let mut last_reason = String::new();

    for attempt in 1..=attempts {
        match tokio::time::timeout(policy.attempt_timeout, UnixStream::connect(path)).await {
            Ok(Ok(stream)) => {
                tracing::debug!(path = %path.display(), attempt, "Connected to supervisor");
                return Ok(stream);
            }
            Ok(Err(e)) if is_transient(&e) => {
                tracing::trace!(attempt, "Supervisor not ready: {}", e);
                last_reason = e.to_string();
            }
            Ok(Err(e)) => {
                return Err(RunvmError::DaemonUnreachable {
                    path: path.to_path_buf(),
                    attempts: attempt,
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                last_reason = format!("connect timed out after {:?}", policy.attempt_timeout);
            }
        }

        if attempt < attempts {
            tokio::time::sleep(policy.interval).await;
        }
    }

    Err(RunvmError::DaemonUnreachable {
        path: path.to_path_buf(),
        attempts,
        reason: last_reason,
    })
}

fn is_transient(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        ErrorKind::NotFound | ErrorKind::ConnectionRefused
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::net::UnixListener;

    fn fast(attempts: u32) -> ConnectPolicy {
        ConnectPolicy {
            attempts,
            interval: Duration::from_millis(10),
            attempt_timeout: Duration::from_millis(200),
        }
    }

    #[tokio::test]
    async fn test_missing_socket_exhausts_attempts() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("runv.sock");

        let err = connect(&path, fast(3)).await.unwrap_err();
        match err {
            RunvmError::DaemonUnreachable { attempts, path: p, .. } => {
                assert_eq!(attempts, 3);
                assert_eq!(p, path);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_connects_once_listener_appears() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("runv.sock");

        let bind_path = path.clone();
        let server = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            let listener = UnixListener::bind(&bind_path).unwrap();
            listener.accept().await.unwrap();
        });

        connect(&path, fast(100)).await.unwrap();
        server.await.unwrap();
    }
}
