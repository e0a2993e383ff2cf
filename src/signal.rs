// src/signal.rs

//! Bridge from SIGINT / SIGTERM to the orchestrator's teardown path.
//!
//! Instead of the default "die immediately" action, each signal is turned
//! into an [`Interrupt`] message on a channel the orchestrator owns. Tests
//! hand the orchestrator their own receiver and send interrupts directly.

use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::errors::Result;

/// An external stop request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interrupt {
    /// Signal name, e.g. `"SIGINT"`.
    pub signal: String,
}

impl Interrupt {
    pub fn new(signal: impl Into<String>) -> Self {
        Self {
            signal: signal.into(),
        }
    }
}

/// Channel pair carrying interrupts into the orchestrator.
pub fn channel() -> (mpsc::Sender<Interrupt>, mpsc::Receiver<Interrupt>) {
    mpsc::channel(4)
}

/// Process-wide SIGINT/SIGTERM listener. One per run.
///
/// Dropping the bridge stops forwarding.
#[derive(Debug)]
pub struct SignalBridge {
    task: JoinHandle<()>,
}

impl SignalBridge {
    /// Start listening and forward every signal to `tx`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn install(tx: mpsc::Sender<Interrupt>) -> Result<Self> {
        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        let task = tokio::spawn(async move {
            loop {
                let name = tokio::select! {
                    Some(()) = sigint.recv() => "SIGINT",
                    Some(()) = sigterm.recv() => "SIGTERM",
                    else => break,
                };

                info!(signal = name, "received signal; requesting teardown");
                if tx.send(Interrupt::new(name)).await.is_err() {
                    warn!(signal = name, "orchestrator no longer listening for signals");
                    break;
                }
            }
        });

        Ok(Self { task })
    }
}

impl Drop for SignalBridge {
    fn drop(&mut self) {
        self.task.abort();
    }
}
