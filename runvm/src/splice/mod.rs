//! Console splicing between the caller's stdio and a supervisor session.
//!
//! Two directions run concurrently once the supervisor has acknowledged the
//! start request:
//!
//! - input: caller stdin becomes `STDIN` frames, terminal resizes become
//!   `WINSIZE` frames. On stdin EOF the connection's write half is shut
//!   down so the container sees EOF while output keeps flowing.
//! - output: `STDOUT`/`STDERR` frames are written to the caller's streams
//!   until the `EXIT` frame carries the container's status.

#[cfg(test)]
pub(crate) mod test_support;
pub mod tty;

use runvm_shared::constants::GENERIC_FAILURE_STATUS;
use runvm_shared::{Frame, MessageCode, RunvmError, RunvmResult, WindowSize, read_frame, write_frame};
use std::future::Future;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const INPUT_CHUNK: usize = 16 * 1024;

pub type InputStream = Box<dyn AsyncRead + Send + Unpin>;
pub type OutputStream = Box<dyn AsyncWrite + Send + Unpin>;

/// The caller side of the console.
pub struct Stdio {
    pub stdin: InputStream,
    pub stdout: OutputStream,
    pub stderr: OutputStream,
}

impl Stdio {
    /// This process's own stdin, stdout and stderr.
    pub fn inherit() -> Self {
        Self {
            stdin: Box::new(tokio::io::stdin()),
            stdout: Box::new(tokio::io::stdout()),
            stderr: Box::new(tokio::io::stderr()),
        }
    }
}

impl std::fmt::Debug for Stdio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stdio").finish_non_exhaustive()
    }
}

/// An acknowledged supervisor connection, split into halves.
pub struct Session<R, W> {
    reader: R,
    writer: W,
}

impl<R, W> Session<R, W>
where
    R: AsyncRead + Send + Unpin + 'static,
    W: AsyncWrite + Send + Unpin + 'static,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    /// Relay until the supervisor reports the container's exit status.
    ///
    /// A connection that ends without `EXIT` yields the generic failure
    /// status. Transport corruption is returned as an error.
    pub async fn run(
        self,
        stdio: Stdio,
        resize: Option<mpsc::Receiver<WindowSize>>,
    ) -> RunvmResult<i32> {
        let Session { mut reader, writer } = self;
        let Stdio {
            stdin,
            mut stdout,
            mut stderr,
        } = stdio;

        // Aborted on every exit path, including cancellation by `run_until`,
        // so the connection closes with the session.
        let _input = AbortOnDrop(tokio::spawn(pump_input(stdin, writer, resize)));
        relay_output(&mut reader, &mut stdout, &mut stderr).await
    }

    /// Like [`Session::run`], but stop early with the status produced by
    /// `interrupt` if it completes first.
    pub async fn run_until<F>(
        self,
        stdio: Stdio,
        resize: Option<mpsc::Receiver<WindowSize>>,
        interrupt: F,
    ) -> RunvmResult<i32>
    where
        F: Future<Output = i32>,
    {
        tokio::select! {
            status = self.run(stdio, resize) => status,
            status = interrupt => {
                tracing::debug!(status, "Session interrupted");
                Ok(status)
            }
        }
    }
}

struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

async fn pump_input<W>(
    mut stdin: InputStream,
    mut writer: W,
    mut resize: Option<mpsc::Receiver<WindowSize>>,
) where
    W: AsyncWrite + Send + Unpin,
{
    let mut buf = vec![0u8; INPUT_CHUNK];
    let result: RunvmResult<()> = async {
        loop {
            let next_size = async {
                match resize.as_mut() {
                    Some(rx) => rx.recv().await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                read = stdin.read(&mut buf) => {
                    let n = read.map_err(|e| RunvmError::Session(format!("stdin read failed: {}", e)))?;
                    if n == 0 {
                        break;
                    }
                    write_frame(&mut writer, &Frame::new(MessageCode::Stdin, buf[..n].to_vec())).await?;
                }
                size = next_size => match size {
                    Some(size) => write_frame(&mut writer, &Frame::window_size(size)).await?,
                    None => resize = None,
                },
            }
        }
        Ok(())
    }
    .await;

    if let Err(e) = result {
        tracing::debug!("Input relay stopped: {}", e);
    }

    // Half-close: the supervisor reads this as console EOF.
    if let Err(e) = writer.shutdown().await {
        tracing::debug!("Failed to shut down write half: {}", e);
    }
}

async fn relay_output<R>(
    reader: &mut R,
    stdout: &mut OutputStream,
    stderr: &mut OutputStream,
) -> RunvmResult<i32>
where
    R: AsyncRead + Unpin,
{
    loop {
        let Some(frame) = read_frame(reader).await? else {
            tracing::warn!("Supervisor closed the session without an exit status");
            return Ok(GENERIC_FAILURE_STATUS);
        };

        match frame.message_code()? {
            MessageCode::Stdout => forward(stdout, &frame.payload, "stdout").await?,
            MessageCode::Stderr => forward(stderr, &frame.payload, "stderr").await?,
            MessageCode::Exit => {
                let status = frame.exit_status()?;
                tracing::debug!(status, "Container exited");
                return Ok(status);
            }
            other => tracing::warn!(?other, "Ignoring out-of-place frame"),
        }
    }
}

async fn forward(sink: &mut OutputStream, data: &[u8], stream: &str) -> RunvmResult<()> {
    sink.write_all(data)
        .await
        .map_err(|e| RunvmError::Session(format!("{} write failed: {}", stream, e)))?;
    sink.flush()
        .await
        .map_err(|e| RunvmError::Session(format!("{} flush failed: {}", stream, e)))
}
