//! Frame encoding and decoding.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::{MessageCode, WindowSize};
use crate::errors::{FrameError, RunvmError, RunvmResult};

/// `code` + `length`, both `u32` big-endian.
pub const HEADER_LEN: usize = 8;

/// Largest payload a peer may declare. Anything above is treated as corruption.
pub const MAX_PAYLOAD_LEN: u32 = 64 * 1024 * 1024;

/// One control frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub code: u32,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(code: MessageCode, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            code: code.as_u32(),
            payload: payload.into(),
        }
    }

    pub fn empty(code: MessageCode) -> Self {
        Self::new(code, Vec::new())
    }

    pub fn exit(status: i32) -> Self {
        Self::new(MessageCode::Exit, status.to_be_bytes().to_vec())
    }

    pub fn window_size(size: WindowSize) -> Self {
        Self::new(MessageCode::WinSize, size.to_bytes().to_vec())
    }

    /// Typed code, or `Malformed` for codes outside the known set.
    pub fn message_code(&self) -> Result<MessageCode, FrameError> {
        MessageCode::try_from(self.code)
    }

    /// Decode the payload of an `Exit` frame.
    pub fn exit_status(&self) -> Result<i32, FrameError> {
        let bytes: [u8; 4] = self.payload.as_slice().try_into().map_err(|_| {
            FrameError::Malformed(format!(
                "exit payload must be 4 bytes, got {}",
                self.payload.len()
            ))
        })?;
        Ok(i32::from_be_bytes(bytes))
    }

    pub fn encode(&self) -> RunvmResult<Vec<u8>> {
        encode(self.code, &self.payload)
    }
}

/// Serialize one frame: exactly `HEADER_LEN + payload.len()` bytes.
pub fn encode(code: u32, payload: &[u8]) -> RunvmResult<Vec<u8>> {
    let len = u32::try_from(payload.len())
        .ok()
        .filter(|len| *len <= MAX_PAYLOAD_LEN)
        .ok_or_else(|| {
            FrameError::Malformed(format!(
                "payload of {} bytes exceeds limit of {} bytes",
                payload.len(),
                MAX_PAYLOAD_LEN
            ))
        })?;

    let mut buf = Vec::with_capacity(HEADER_LEN + payload.len());
    buf.extend_from_slice(&code.to_be_bytes());
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(payload);
    Ok(buf)
}

/// Read until `buf` is full or the stream ends. Returns bytes read.
async fn fill<R>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// Read one frame.
///
/// Returns `Ok(None)` when the stream ends cleanly on a frame boundary.
/// A stream that ends inside a header or payload yields `ShortRead`; a
/// partially filled payload is never returned.
pub async fn read_frame<R>(reader: &mut R) -> RunvmResult<Option<Frame>>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut header = [0u8; HEADER_LEN];
    let received = fill(reader, &mut header).await?;
    if received == 0 {
        return Ok(None);
    }
    if received < HEADER_LEN {
        return Err(FrameError::ShortRead {
            expected: HEADER_LEN,
            received,
        }
        .into());
    }

    let code = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
    let len = u32::from_be_bytes([header[4], header[5], header[6], header[7]]);
    if len > MAX_PAYLOAD_LEN {
        return Err(FrameError::Malformed(format!(
            "declared length {len} exceeds limit of {MAX_PAYLOAD_LEN} bytes"
        ))
        .into());
    }

    let expected = len as usize;
    let mut payload = vec![0u8; expected];
    let received = fill(reader, &mut payload).await?;
    if received < expected {
        return Err(FrameError::ShortRead { expected, received }.into());
    }

    tracing::trace!(code, len, "read frame");
    Ok(Some(Frame { code, payload }))
}

/// Write one frame and flush. No partial write is ever reported as success.
pub async fn write_frame<W>(writer: &mut W, frame: &Frame) -> RunvmResult<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let bytes = frame.encode()?;
    writer
        .write_all(&bytes)
        .await
        .map_err(|e| RunvmError::Transport(format!("failed to write frame {}: {}", frame.code, e)))?;
    writer
        .flush()
        .await
        .map_err(|e| RunvmError::Transport(format!("failed to flush frame {}: {}", frame.code, e)))?;
    tracing::trace!(code = frame.code, len = frame.payload.len(), "wrote frame");
    Ok(())
}
