//! Control protocol between `runvm start` and the container supervisor.
//!
//! # Wire format
//!
//! ```text
//! +----------------+------------------+---------------------+
//! | code (u32, BE) | length (u32, BE) | payload (length B)  |
//! +----------------+------------------+---------------------+
//! ```
//!
//! The payload is opaque to the framing layer, so no payload content can
//! desynchronize the stream.
//!
//! # Session flow
//!
//! ```text
//! client                                   supervisor
//!   | STARTCONTAINER {merged spec JSON}        |
//!   |----------------------------------------->|
//!   |                              ACK | ERROR |
//!   |<-----------------------------------------|
//!   | STDIN / WINSIZE ...       STDOUT/STDERR  |
//!   |<========================================>|
//!   | (write half shut down on stdin EOF)      |
//!   |                           EXIT {i32 BE}  |
//!   |<-----------------------------------------|
//! ```

mod codec;

pub use codec::{Frame, HEADER_LEN, MAX_PAYLOAD_LEN, encode, read_frame, write_frame};

use crate::errors::FrameError;

/// Frame codes understood by both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum MessageCode {
    /// Client asks the supervisor to start the container.
    StartContainer = 1,
    /// Container init is running; console traffic follows.
    Ack = 2,
    /// Supervisor refused the request; payload is a UTF-8 message.
    Error = 3,
    Stdin = 16,
    Stdout = 17,
    Stderr = 18,
    /// Terminal resize; payload is `rows, cols` as `u16` BE.
    WinSize = 19,
    /// Final frame of a session; payload is the exit status as `i32` BE.
    Exit = 20,
}

impl MessageCode {
    pub fn as_u32(self) -> u32 {
        self as u32
    }
}

impl TryFrom<u32> for MessageCode {
    type Error = FrameError;

    fn try_from(value: u32) -> Result<Self, FrameError> {
        Ok(match value {
            1 => MessageCode::StartContainer,
            2 => MessageCode::Ack,
            3 => MessageCode::Error,
            16 => MessageCode::Stdin,
            17 => MessageCode::Stdout,
            18 => MessageCode::Stderr,
            19 => MessageCode::WinSize,
            20 => MessageCode::Exit,
            other => {
                return Err(FrameError::Malformed(format!(
                    "unknown message code {other}"
                )));
            }
        })
    }
}

/// Terminal dimensions carried by a `WinSize` frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSize {
    pub rows: u16,
    pub cols: u16,
}

impl WindowSize {
    pub fn to_bytes(self) -> [u8; 4] {
        let [r0, r1] = self.rows.to_be_bytes();
        let [c0, c1] = self.cols.to_be_bytes();
        [r0, r1, c0, c1]
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FrameError> {
        match bytes {
            [r0, r1, c0, c1] => Ok(Self {
                rows: u16::from_be_bytes([*r0, *r1]),
                cols: u16::from_be_bytes([*c0, *c1]),
            }),
            _ => Err(FrameError::Malformed(format!(
                "window size payload must be 4 bytes, got {}",
                bytes.len()
            ))),
        }
    }
}
