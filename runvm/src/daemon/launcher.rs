//! Fire-and-forget spawn of the per-container supervisor.

use runvm_shared::{RunvmError, RunvmResult};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Creates detached processes. Injectable so start can be tested without
/// forking real supervisors.
pub trait ProcessLauncher: Send + Sync {
    /// Spawn `program` with `args` and return its pid without waiting for it
    /// to initialise.
    fn spawn_detached(&self, program: &Path, args: &[OsString]) -> RunvmResult<u32>;
}

/// Spawns a real OS process with null stdio.
///
/// The child is reaped on a background thread so a supervisor that exits
/// quietly (another instance already holds the marker) does not linger as a
/// zombie. The child detaches itself with `setsid` once it runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct DetachedLauncher;

impl ProcessLauncher for DetachedLauncher {
    fn spawn_detached(&self, program: &Path, args: &[OsString]) -> RunvmResult<u32> {
        let mut cmd = Command::new(program);
        cmd.args(args);

        // Pass RUST_LOG to the supervisor if set
        if let Ok(rust_log) = std::env::var("RUST_LOG") {
            cmd.env("RUST_LOG", rust_log);
        }

        // Null stdio: the supervisor outlives this terminal session and must
        // not hold the caller's pipes open.
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::null());

        let mut child = cmd.spawn().map_err(|e| {
            let err_msg = format!("Failed to spawn daemon at {}: {}", program.display(), e);
            tracing::error!("{}", err_msg);
            RunvmError::DaemonSpawn(err_msg)
        })?;

        let pid = child.id();
        std::thread::spawn(move || {
            if let Ok(status) = child.wait() {
                tracing::debug!(pid, %status, "Daemon launcher process exited");
            }
        });

        Ok(pid)
    }
}

/// Ensures a supervisor attempt is made for `(root, name)`.
///
/// Never waits for readiness and never enforces single-instance itself;
/// the supervisor's exclusivity marker does that. Callers connect with retry.
pub struct DaemonLauncher<'a> {
    launcher: &'a dyn ProcessLauncher,
    program: PathBuf,
}

impl<'a> DaemonLauncher<'a> {
    pub fn new(launcher: &'a dyn ProcessLauncher, program: PathBuf) -> Self {
        Self { launcher, program }
    }

    pub fn ensure_daemon(&self, root: &Path, name: &str) -> RunvmResult<()> {
        let args = daemon_args(root, name);
        let pid = self.launcher.spawn_detached(&self.program, &args)?;
        tracing::debug!(
            container = %name,
            root = %root.display(),
            pid,
            "Requested supervisor start"
        );
        Ok(())
    }
}

/// Bootstrap arguments understood by `runvm daemon`.
pub fn daemon_args(root: &Path, name: &str) -> Vec<OsString> {
    vec![
        "--root".into(),
        root.as_os_str().to_owned(),
        "--id".into(),
        name.into(),
        "daemon".into(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingLauncher {
        calls: Mutex<Vec<(PathBuf, Vec<OsString>)>>,
    }

    impl ProcessLauncher for RecordingLauncher {
        fn spawn_detached(&self, program: &Path, args: &[OsString]) -> RunvmResult<u32> {
            self.calls
                .lock()
                .unwrap()
                .push((program.to_path_buf(), args.to_vec()));
            Ok(4242)
        }
    }

    #[test]
    fn test_ensure_daemon_passes_bootstrap_args() {
        let recorder = RecordingLauncher::default();
        let launcher = DaemonLauncher::new(&recorder, PathBuf::from("/usr/bin/runvm"));
        launcher.ensure_daemon(Path::new("/run/runvm"), "c1").unwrap();

        let calls = recorder.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, PathBuf::from("/usr/bin/runvm"));
        let args: Vec<_> = calls[0].1.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(args, ["--root", "/run/runvm", "--id", "c1", "daemon"]);
    }

    #[test]
    fn test_second_call_never_errors() {
        let recorder = RecordingLauncher::default();
        let launcher = DaemonLauncher::new(&recorder, PathBuf::from("/usr/bin/runvm"));
        launcher.ensure_daemon(Path::new("/r"), "c1").unwrap();
        launcher.ensure_daemon(Path::new("/r"), "c1").unwrap();
        assert_eq!(recorder.calls.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_missing_executable_is_spawn_error() {
        let launcher = DaemonLauncher::new(&DetachedLauncher, PathBuf::from("/nonexistent/runvm"));
        let err = launcher.ensure_daemon(Path::new("/r"), "c1").unwrap_err();
        assert!(matches!(err, RunvmError::DaemonSpawn(_)));
    }

    #[test]
    fn test_detached_launcher_returns_without_waiting() {
        let start = std::time::Instant::now();
        let pid = DetachedLauncher
            .spawn_detached(Path::new("/bin/sleep"), &["5".into()])
            .unwrap();
        assert!(pid > 0);
        assert!(start.elapsed() < std::time::Duration::from_secs(2));
        let _ = nix::sys::signal::kill(
            nix::unistd::Pid::from_raw(pid as i32),
            nix::sys::signal::Signal::SIGKILL,
        );
    }
}
