//! Local terminal handling: raw mode, window size, and interrupt signals.

use nix::sys::termios::{SetArg, Termios, cfmakeraw, tcgetattr, tcsetattr};
use runvm_shared::{RunvmError, RunvmResult, WindowSize};
use std::io::IsTerminal;
use nix::sys::signal::Signal;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::mpsc;

/// Puts stdin in raw mode and restores the saved attributes on drop.
pub struct RawModeGuard {
    original: Termios,
}

impl RawModeGuard {
    /// Enable raw mode if stdin is a terminal. Returns `None` otherwise.
    pub fn enable_if_terminal() -> RunvmResult<Option<Self>> {
        if !std::io::stdin().is_terminal() {
            return Ok(None);
        }

        let original = tcgetattr(std::io::stdin())
            .map_err(|e| RunvmError::Session(format!("tcgetattr failed: {}", e)))?;
        let mut raw = original.clone();
        cfmakeraw(&mut raw);
        tcsetattr(std::io::stdin(), SetArg::TCSANOW, &raw)
            .map_err(|e| RunvmError::Session(format!("tcsetattr failed: {}", e)))?;

        tracing::debug!("Terminal switched to raw mode");
        Ok(Some(Self { original }))
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Err(e) = tcsetattr(std::io::stdin(), SetArg::TCSANOW, &self.original) {
            tracing::warn!("Failed to restore terminal attributes: {}", e);
        }
    }
}

/// Current size of the controlling terminal, if there is one.
pub fn current_size() -> Option<WindowSize> {
    term_size::dimensions().map(|(cols, rows)| WindowSize {
        rows: u16::try_from(rows).unwrap_or(u16::MAX),
        cols: u16::try_from(cols).unwrap_or(u16::MAX),
    })
}

/// Stream of window sizes: the current one first, then one per `SIGWINCH`.
///
/// Returns `None` when stdout is not a terminal.
pub fn watch_resize() -> RunvmResult<Option<mpsc::Receiver<WindowSize>>> {
    if !std::io::stdout().is_terminal() {
        return Ok(None);
    }

    let mut winch = signal(SignalKind::window_change())?;
    let (tx, rx) = mpsc::channel(8);
    if let Some(size) = current_size() {
        let _ = tx.try_send(size);
    }

    tokio::spawn(async move {
        while winch.recv().await.is_some() {
            let Some(size) = current_size() else {
                continue;
            };
            if tx.send(size).await.is_err() {
                break;
            }
        }
    });

    Ok(Some(rx))
}

/// Resolves with `128 + signo` on the first SIGINT or SIGTERM.
pub async fn interrupted() -> i32 {
    let (Ok(mut int), Ok(mut term)) = (
        signal(SignalKind::interrupt()),
        signal(SignalKind::terminate()),
    ) else {
        tracing::warn!("Failed to install signal handlers");
        return std::future::pending().await;
    };

    let number = tokio::select! {
        _ = int.recv() => signo(Signal::SIGINT),
        _ = term.recv() => signo(Signal::SIGTERM),
    };
    tracing::debug!(signo = number, "Interrupted");
    128 + number
}

fn signo(sig: Signal) -> i32 {
    sig as i32
}
