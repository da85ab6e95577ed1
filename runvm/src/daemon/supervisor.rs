//! Per-container supervisor: owns the endpoint and serves one session.

use super::driver::{ConsoleReader, ContainerDriver};
use super::marker::{ExclusivityMarker, MarkerGuard, MarkerState};
use crate::runtime::{ContainerLayout, RuntimeOptions};
use crate::spec::MergedSpecification;
use runvm_shared::constants::GENERIC_FAILURE_STATUS;
use runvm_shared::{Frame, MessageCode, RunvmError, RunvmResult, WindowSize, read_frame, write_frame};
use std::io::ErrorKind;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;

/// Chooses a backend for a start request.
pub type DriverSelector = dyn Fn(&RuntimeOptions) -> RunvmResult<Box<dyn ContainerDriver>> + Send + Sync;

const OUTPUT_CHUNK: usize = 16 * 1024;
const FRAME_QUEUE: usize = 64;
const REFUSAL_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// A bootstrapped supervisor holding the exclusivity marker and a bound
/// endpoint. Dropping it removes the endpoint and pid file.
pub struct Supervisor {
    layout: ContainerLayout,
    listener: UnixListener,
    _marker: MarkerGuard,
}

impl Supervisor {
    /// Claim the state directory and bind the endpoint.
    ///
    /// Returns `Ok(None)` when another supervisor already owns it; that is
    /// the normal outcome of a racing start and not an error.
    pub fn bootstrap(
        layout: ContainerLayout,
        marker: &dyn ExclusivityMarker,
    ) -> RunvmResult<Option<Self>> {
        layout.prepare()?;

        let guard = match marker.acquire(&layout.lock_path())? {
            MarkerState::Held(guard) => guard,
            MarkerState::AlreadyHeld => {
                tracing::info!(
                    state_dir = %layout.state_dir().display(),
                    "Supervisor already running, exiting"
                );
                return Ok(None);
            }
        };

        // Only the marker holder may touch the endpoint, so anything left
        // there belongs to a dead supervisor.
        let socket_path = layout.socket_path();
        match std::fs::remove_file(&socket_path) {
            Ok(()) => tracing::debug!(path = %socket_path.display(), "Removed stale socket"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                return Err(RunvmError::Internal(format!(
                    "Failed to remove stale socket {}: {}",
                    socket_path.display(),
                    e
                )));
            }
        }

        let listener = UnixListener::bind(&socket_path).map_err(|e| {
            RunvmError::Internal(format!(
                "Failed to bind {}: {}",
                socket_path.display(),
                e
            ))
        })?;

        std::fs::write(layout.pid_path(), std::process::id().to_string()).map_err(|e| {
            RunvmError::Internal(format!(
                "Failed to write {}: {}",
                layout.pid_path().display(),
                e
            ))
        })?;

        tracing::info!(socket = %socket_path.display(), "Supervisor listening");
        Ok(Some(Self {
            layout,
            listener,
            _marker: guard,
        }))
    }

    /// Accept one client and run its session to completion.
    ///
    /// Clients that connect while the session runs are refused with an
    /// `ERROR` reply so their start fails instead of waiting in the backlog.
    /// Returns the container's exit status.
    pub async fn serve(self, select: &DriverSelector) -> RunvmResult<i32> {
        let (stream, _) = self
            .listener
            .accept()
            .await
            .map_err(|e| RunvmError::Transport(format!("Failed to accept client: {}", e)))?;
        tracing::debug!("Client connected");

        let container = self
            .layout
            .state_dir()
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let status = tokio::select! {
            status = serve_session(stream, select) => status,
            _ = refuse_extra_clients(&self.listener, &container) => {
                Err(RunvmError::Internal("listener closed during session".into()))
            }
        };
        match &status {
            Ok(code) => tracing::info!(status = code, "Session finished"),
            Err(e) => tracing::error!("Session failed: {}", e),
        }
        status
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(self.layout.socket_path());
        let _ = std::fs::remove_file(self.layout.pid_path());
    }
}

async fn serve_session(stream: UnixStream, select: &DriverSelector) -> RunvmResult<i32> {
    let (mut reader, mut writer) = stream.into_split();

    let request = match read_frame(&mut reader).await? {
        Some(frame) if frame.message_code() == Ok(MessageCode::StartContainer) => frame,
        Some(frame) => {
            let msg = format!("expected start request, got code {}", frame.code);
            reply_error(&mut writer, &msg).await;
            return Err(RunvmError::Session(msg));
        }
        None => {
            return Err(RunvmError::Session(
                "client closed before sending a start request".into(),
            ));
        }
    };

    let started = async {
        let spec = MergedSpecification::from_json(&request.payload)?;
        let driver: Arc<dyn ContainerDriver> = Arc::from(select(&spec.runtime_options)?);
        tracing::info!(
            container = %spec.identity.name(),
            driver = driver.name(),
            "Starting container"
        );
        let console = driver.start(&spec).await?;
        Ok::<_, RunvmError>((driver, console))
    }
    .await;

    let (driver, mut console) = match started {
        Ok(started) => started,
        Err(e) => {
            reply_error(&mut writer, &e.to_string()).await;
            return Err(e);
        }
    };

    write_frame(&mut writer, &Frame::empty(MessageCode::Ack)).await?;

    let (tx, rx) = mpsc::channel::<Frame>(FRAME_QUEUE);
    let frame_writer = tokio::spawn(write_frames(writer, rx));

    let input = tokio::spawn(relay_input(reader, console.stdin.take(), driver));

    let stdout = console
        .stdout
        .take()
        .map(|out| tokio::spawn(pump_output(out, MessageCode::Stdout, tx.clone())));
    let stderr = console
        .stderr
        .take()
        .map(|err| tokio::spawn(pump_output(err, MessageCode::Stderr, tx.clone())));

    for pump in [stdout, stderr].into_iter().flatten() {
        if let Err(e) = pump.await {
            tracing::warn!("Output pump aborted: {}", e);
        }
    }

    let status = console.exit.await.unwrap_or(GENERIC_FAILURE_STATUS);
    if tx.send(Frame::exit(status)).await.is_err() {
        tracing::warn!("Client gone before exit status could be delivered");
    }
    drop(tx);

    if let Err(e) = frame_writer.await {
        tracing::warn!("Frame writer aborted: {}", e);
    }
    input.abort();

    Ok(status)
}

/// Answer every further client with `ERROR`. Returns only if accepting
/// fails.
async fn refuse_extra_clients(listener: &UnixListener, container: &str) {
    loop {
        let mut stream = match listener.accept().await {
            Ok((stream, _)) => stream,
            Err(e) => {
                tracing::error!("Failed to accept client: {}", e);
                return;
            }
        };
        let msg = format!("container {} is already running", container);
        tokio::spawn(async move {
            tracing::warn!("Refusing second client: {}", msg);
            // Consume the request first so the client's write never fails
            // against a closed socket.
            let _ = tokio::time::timeout(REFUSAL_READ_TIMEOUT, read_frame(&mut stream)).await;
            let frame = Frame::new(MessageCode::Error, msg.into_bytes());
            if let Err(e) = write_frame(&mut stream, &frame).await {
                tracing::debug!("Failed to refuse client: {}", e);
            }
            let _ = stream.shutdown().await;
        });
    }
}

async fn reply_error(writer: &mut OwnedWriteHalf, msg: &str) {
    let frame = Frame::new(MessageCode::Error, msg.as_bytes().to_vec());
    if let Err(e) = write_frame(writer, &frame).await {
        tracing::warn!("Failed to report error to client: {}", e);
    }
}

/// Single writer for the connection so frames never interleave.
async fn write_frames(mut writer: OwnedWriteHalf, mut rx: mpsc::Receiver<Frame>) {
    while let Some(frame) = rx.recv().await {
        if let Err(e) = write_frame(&mut writer, &frame).await {
            tracing::warn!("Client write failed: {}", e);
            return;
        }
    }
    let _ = writer.shutdown().await;
}

/// Forward console output as frames. Keeps draining after the client is
/// gone so the container never blocks on a full pipe.
async fn pump_output(mut source: ConsoleReader, code: MessageCode, tx: mpsc::Sender<Frame>) {
    let mut buf = vec![0u8; OUTPUT_CHUNK];
    let mut client_alive = true;
    loop {
        let n = match source.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(?code, "Console read failed: {}", e);
                break;
            }
        };
        if client_alive && tx.send(Frame::new(code, buf[..n].to_vec())).await.is_err() {
            client_alive = false;
        }
    }
    tracing::debug!(?code, "Console stream closed");
}

/// Apply client frames to the console. Client EOF closes container stdin.
async fn relay_input(
    mut reader: OwnedReadHalf,
    mut stdin: Option<super::driver::ConsoleWriter>,
    driver: Arc<dyn ContainerDriver>,
) {
    loop {
        let frame = match read_frame(&mut reader).await {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                tracing::debug!("Client closed input");
                break;
            }
            Err(e) => {
                tracing::warn!("Client input failed: {}", e);
                break;
            }
        };

        match frame.message_code() {
            Ok(MessageCode::Stdin) => {
                let Some(sink) = stdin.as_mut() else {
                    continue;
                };
                let written = async {
                    sink.write_all(&frame.payload).await?;
                    sink.flush().await
                }
                .await;
                if let Err(e) = written {
                    tracing::debug!("Container stdin closed: {}", e);
                    stdin = None;
                }
            }
            Ok(MessageCode::WinSize) => match WindowSize::from_bytes(&frame.payload) {
                Ok(size) => {
                    if let Err(e) = driver.resize(size).await {
                        tracing::warn!("Resize failed: {}", e);
                    }
                }
                Err(e) => tracing::warn!("Bad resize frame: {}", e),
            },
            Ok(other) => tracing::warn!(?other, "Ignoring out-of-place frame"),
            Err(e) => {
                tracing::warn!("Client sent a bad frame: {}", e);
                break;
            }
        }
    }

    if let Some(mut sink) = stdin {
        let _ = sink.shutdown().await;
    }
}
