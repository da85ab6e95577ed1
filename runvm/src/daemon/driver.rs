//! Container backends behind the supervisor.
//!
//! A driver turns a [`MergedSpecification`] into a running container and
//! hands back its console. The supervisor never cares how the container is
//! isolated; it only pumps bytes between the console and the client.

use crate::runtime::RuntimeOptions;
use crate::spec::MergedSpecification;
use runvm_shared::{RunvmError, RunvmResult, WindowSize};
use std::os::unix::process::ExitStatusExt;
use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::Command;
use tokio::sync::oneshot;

pub type ConsoleWriter = Box<dyn AsyncWrite + Send + Unpin>;
pub type ConsoleReader = Box<dyn AsyncRead + Send + Unpin>;

/// Console of a running container.
pub struct ContainerConsole {
    pub stdin: Option<ConsoleWriter>,
    pub stdout: Option<ConsoleReader>,
    pub stderr: Option<ConsoleReader>,
    /// Resolves with the container's exit status once it terminates.
    pub exit: oneshot::Receiver<i32>,
}

#[async_trait::async_trait]
pub trait ContainerDriver: Send + Sync {
    fn name(&self) -> &str;

    /// Start the container process and return its console.
    async fn start(&self, spec: &MergedSpecification) -> RunvmResult<ContainerConsole>;

    /// Apply a terminal resize. Backends without a pty ignore it.
    async fn resize(&self, size: WindowSize) -> RunvmResult<()> {
        tracing::debug!(driver = self.name(), ?size, "Ignoring resize");
        Ok(())
    }
}

/// Hypervisor backends accepted on the command line but not built here.
const HYPERVISOR_DRIVERS: &[&str] = &["kvm", "qemu", "xen", "vbox"];

/// Pick the backend named by `options.driver`.
pub fn driver_for(options: &RuntimeOptions) -> RunvmResult<Box<dyn ContainerDriver>> {
    match options.driver.as_str() {
        HostProcessDriver::NAME => Ok(Box::new(HostProcessDriver)),
        name if HYPERVISOR_DRIVERS.contains(&name) => Err(RunvmError::Unsupported(format!(
            "driver '{}' is not available in this build",
            name
        ))),
        name => Err(RunvmError::Unsupported(format!("unknown driver '{}'", name))),
    }
}

/// Map a wait status to a shell-style exit status.
pub fn exit_status_code(status: ExitStatus) -> i32 {
    match (status.code(), status.signal()) {
        (Some(code), _) => code,
        (None, Some(signal)) => 128 + signal,
        (None, None) => runvm_shared::constants::GENERIC_FAILURE_STATUS,
    }
}

/// Runs the OCI process directly on the host, in the bundle directory.
///
/// No isolation is applied. Useful for development and for exercising the
/// start path without a hypervisor.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostProcessDriver;

impl HostProcessDriver {
    pub const NAME: &'static str = "process";
}

#[async_trait::async_trait]
impl ContainerDriver for HostProcessDriver {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn start(&self, spec: &MergedSpecification) -> RunvmResult<ContainerConsole> {
        let process = spec
            .config
            .process()
            .as_ref()
            .ok_or_else(|| RunvmError::Engine("config has no process section".into()))?;
        let (program, args) = process
            .args()
            .as_deref()
            .and_then(|args| args.split_first())
            .ok_or_else(|| RunvmError::Engine("process.args is empty".into()))?;

        let mut cmd = Command::new(program);
        cmd.args(args)
            .current_dir(spec.identity.bundle_path())
            .env_clear()
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for entry in process.env().as_deref().unwrap_or_default() {
            if let Some((key, value)) = entry.split_once('=') {
                cmd.env(key, value);
            }
        }

        let mut child = cmd.spawn().map_err(|e| {
            RunvmError::ContainerStart(format!("Failed to execute {}: {}", program, e))
        })?;
        let pid = child.id();
        tracing::info!(
            container = %spec.identity.name(),
            pid = ?pid,
            program = %program,
            "Container process started"
        );

        let stdin = child.stdin.take().map(|s| Box::new(s) as ConsoleWriter);
        let stdout = child.stdout.take().map(|s| Box::new(s) as ConsoleReader);
        let stderr = child.stderr.take().map(|s| Box::new(s) as ConsoleReader);

        let (exit_tx, exit_rx) = oneshot::channel();
        tokio::spawn(async move {
            let status = match child.wait().await {
                Ok(status) => exit_status_code(status),
                Err(e) => {
                    tracing::error!("Failed to wait for container process: {}", e);
                    runvm_shared::constants::GENERIC_FAILURE_STATUS
                }
            };
            tracing::info!(pid = ?pid, status, "Container process exited");
            let _ = exit_tx.send(status);
        });

        Ok(ContainerConsole {
            stdin,
            stdout,
            stderr,
            exit: exit_rx,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::test_support::merged_running;
    use tempfile::TempDir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn options(driver: &str) -> RuntimeOptions {
        RuntimeOptions {
            driver: driver.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_driver_selection() {
        assert_eq!(driver_for(&options("process")).unwrap().name(), "process");
        for name in ["kvm", "qemu", "xen", "vbox", "bogus"] {
            assert!(matches!(
                driver_for(&options(name)),
                Err(RunvmError::Unsupported(_))
            ));
        }
    }

    #[test]
    fn test_exit_status_mapping() {
        assert_eq!(exit_status_code(ExitStatus::from_raw(3 << 8)), 3);
        // killed by SIGKILL
        assert_eq!(exit_status_code(ExitStatus::from_raw(9)), 137);
    }

    #[tokio::test]
    async fn test_host_process_console() {
        let temp = TempDir::new().unwrap();
        let spec = merged_running(
            "c1",
            temp.path(),
            temp.path(),
            &["/bin/sh", "-c", "read line; echo \"got $line\"; echo oops >&2; exit 5"],
        );

        let mut console = HostProcessDriver.start(&spec).await.unwrap();
        let mut stdin = console.stdin.take().unwrap();
        stdin.write_all(b"ping\n").await.unwrap();
        drop(stdin);

        let mut out = String::new();
        console.stdout.take().unwrap().read_to_string(&mut out).await.unwrap();
        let mut err = String::new();
        console.stderr.take().unwrap().read_to_string(&mut err).await.unwrap();

        assert_eq!(out, "got ping\n");
        assert_eq!(err, "oops\n");
        assert_eq!(console.exit.await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_missing_program_is_start_error() {
        let temp = TempDir::new().unwrap();
        let spec = merged_running("c1", temp.path(), temp.path(), &["/nonexistent/init"]);
        let err = HostProcessDriver.start(&spec).await.err().unwrap();
        assert!(matches!(err, RunvmError::ContainerStart(_)));
    }
}
