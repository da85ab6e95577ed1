//! State shared by the start pipeline tasks.

use crate::daemon::ProcessLauncher;
use crate::gate::PrivilegeGate;
use crate::runtime::ContainerLayout;
use crate::spec::{MergedSpecification, StartConfigInput};
use crate::splice::Stdio;
use crate::transport::ConnectPolicy;
use futures::future::BoxFuture;
use runvm_shared::WindowSize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::UnixStream;
use tokio::sync::mpsc;

/// The caller's side of the container console.
pub struct Console {
    pub stdio: Stdio,
    pub resize: Option<mpsc::Receiver<WindowSize>>,
    /// Ends the session early with its output as the exit status.
    pub interrupt: BoxFuture<'static, i32>,
    /// Put a terminal stdin in raw mode while splicing.
    pub raw_mode: bool,
}

impl Console {
    /// Plain streams: no resize events, never interrupted, no raw mode.
    pub fn new(stdio: Stdio) -> Self {
        Self {
            stdio,
            resize: None,
            interrupt: Box::pin(std::future::pending()),
            raw_mode: false,
        }
    }

    pub fn with_resize(mut self, resize: Option<mpsc::Receiver<WindowSize>>) -> Self {
        self.resize = resize;
        self
    }

    pub fn with_interrupt(mut self, interrupt: BoxFuture<'static, i32>) -> Self {
        self.interrupt = interrupt;
        self
    }

    pub fn with_raw_mode(mut self, raw_mode: bool) -> Self {
        self.raw_mode = raw_mode;
        self
    }
}

/// Inputs, collaborators, and per-task outputs of one start.
pub struct StartContext {
    // Collaborators
    pub privilege: Arc<dyn PrivilegeGate>,
    pub launcher: Arc<dyn ProcessLauncher>,
    pub daemon_program: PathBuf,
    pub connect_policy: ConnectPolicy,

    // Inputs, consumed by the task that needs them
    pub input: Option<StartConfigInput>,
    pub console: Option<Console>,

    // Task outputs
    pub spec: Option<MergedSpecification>,
    pub layout: Option<ContainerLayout>,
    pub stream: Option<UnixStream>,
    pub exit_status: Option<i32>,
}

impl StartContext {
    pub fn container_name(&self) -> String {
        self.spec
            .as_ref()
            .map(|spec| spec.identity.name().to_string())
            .or_else(|| self.input.as_ref().map(|input| input.name.clone()))
            .unwrap_or_default()
    }
}
