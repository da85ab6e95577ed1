//! Cross-process exclusivity for the supervisor.

use nix::errno::Errno;
use nix::fcntl::{Flock, FlockArg};
use runvm_shared::{RunvmError, RunvmResult};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// Outcome of trying to become the one supervisor for a state directory.
pub enum MarkerState {
    /// We hold the marker until the guard is dropped.
    Held(MarkerGuard),
    /// Another live supervisor holds it.
    AlreadyHeld,
}

impl std::fmt::Debug for MarkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MarkerState::Held(guard) => f.debug_tuple("Held").field(&guard.path).finish(),
            MarkerState::AlreadyHeld => f.write_str("AlreadyHeld"),
        }
    }
}

/// Releases the marker on drop.
pub struct MarkerGuard {
    path: PathBuf,
    _held: Box<dyn Send + Sync>,
}

/// Atomic test-and-set over a filesystem path.
pub trait ExclusivityMarker: Send + Sync {
    fn acquire(&self, path: &Path) -> RunvmResult<MarkerState>;
}

/// Non-blocking exclusive `flock(2)` on a lock file.
///
/// The kernel drops the lock when the holder dies, so a crashed
/// supervisor never leaves a stale marker behind.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlockMarker;

impl ExclusivityMarker for FlockMarker {
    fn acquire(&self, path: &Path) -> RunvmResult<MarkerState> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)
            .map_err(|e| {
                RunvmError::Internal(format!(
                    "Failed to open lock file {}: {}",
                    path.display(),
                    e
                ))
            })?;

        match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
            Ok(lock) => Ok(MarkerState::Held(MarkerGuard {
                path: path.to_path_buf(),
                _held: Box::new(lock) as Box<Flock<File>>,
            })),
            Err((_, Errno::EWOULDBLOCK)) => Ok(MarkerState::AlreadyHeld),
            Err((_, errno)) => Err(RunvmError::Internal(format!(
                "Failed to lock {}: {}",
                path.display(),
                errno
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_second_acquire_sees_held_marker() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("daemon.lock");

        let first = FlockMarker.acquire(&path).unwrap();
        assert!(matches!(first, MarkerState::Held(_)));

        let second = FlockMarker.acquire(&path).unwrap();
        assert!(matches!(second, MarkerState::AlreadyHeld));

        drop(first);
        let third = FlockMarker.acquire(&path).unwrap();
        assert!(matches!(third, MarkerState::Held(_)));
    }

    #[test]
    fn test_concurrent_acquire_has_single_winner() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("daemon.lock");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let path = path.clone();
                std::thread::spawn(move || FlockMarker.acquire(&path).unwrap())
            })
            .collect();
        let states: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let held = states
            .iter()
            .filter(|s| matches!(s, MarkerState::Held(_)))
            .count();
        assert_eq!(held, 1);
    }

    #[test]
    fn test_missing_directory_is_error() {
        let err = FlockMarker
            .acquire(Path::new("/nonexistent/dir/daemon.lock"))
            .unwrap_err();
        assert!(matches!(err, RunvmError::Internal(_)));
    }
}
