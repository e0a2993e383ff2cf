// src/exec/backend.rs

//! Pluggable process backend abstraction.
//!
//! The orchestrator talks to a [`ProcessSpawner`] and the [`ProcessHandle`]s
//! it returns instead of `tokio::process` directly. Production uses
//! [`OsSpawner`]; tests can provide a spawner whose handles never touch the
//! OS and simply replay scripted exit codes.

use std::future::Future;
use std::pin::Pin;

use crate::batch::Command;
use crate::errors::Result;

use super::output::OutputMux;
use super::process::OsProcess;

/// Result of a non-blocking status check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitState {
    Running,
    Exited(i32),
}

impl ExitState {
    pub fn code(self) -> Option<i32> {
        match self {
            ExitState::Running => None,
            ExitState::Exited(code) => Some(code),
        }
    }
}

/// Capabilities the orchestrator needs from one launched process.
pub trait ProcessHandle: Send {
    /// OS process id, if the process has one.
    fn pid(&self) -> Option<u32>;

    /// 1-based position of this process within the whole run.
    fn slot(&self) -> usize;

    /// Non-blocking status check. Safe to call repeatedly.
    fn poll(&mut self) -> Result<ExitState>;

    /// Whether teardown still has something to stop. Defaults to "has not
    /// exited yet"; backends whose output can outlive the process widen it.
    fn is_active(&mut self) -> Result<bool> {
        Ok(self.poll()? == ExitState::Running)
    }

    /// Ask the process to stop. No-op once it is no longer active.
    fn terminate(&mut self) -> Result<()>;

    /// Force the process to stop. No-op once it is no longer active.
    fn kill(&mut self) -> Result<()>;

    /// Wait for exit *and* for all of the process's output to be written.
    fn wait(&mut self) -> Pin<Box<dyn Future<Output = Result<i32>> + Send + '_>>;
}

/// Factory for [`ProcessHandle`]s.
pub trait ProcessSpawner: Send {
    type Handle: ProcessHandle;

    /// Launch `command` in `slot`. `prefixed` says whether its output lines
    /// carry a pid prefix and slot colour.
    fn spawn(&mut self, command: &Command, slot: usize, prefixed: bool) -> Result<Self::Handle>;
}

/// Spawner that launches real OS processes writing through an [`OutputMux`].
#[derive(Debug, Clone)]
pub struct OsSpawner {
    output: OutputMux,
}

impl OsSpawner {
    pub fn new(output: OutputMux) -> Self {
        Self { output }
    }
}

impl ProcessSpawner for OsSpawner {
    type Handle = OsProcess;

    fn spawn(&mut self, command: &Command, slot: usize, prefixed: bool) -> Result<OsProcess> {
        OsProcess::spawn(command, slot, prefixed, self.output.clone())
    }
}
