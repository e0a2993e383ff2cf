// src/engine/mod.rs

//! Orchestration engine for xbatch.
//!
//! The batch state machine is split in two, the same way for every run:
//! - [`core`] is the pure, synchronous [`BatchCore`]: schedule cursor,
//!   fail-fast policy, exit code.
//! - [`runtime`] is the async [`Orchestrator`] shell that spawns, polls,
//!   sleeps, listens for interrupts and tears processes down on the core's
//!   behalf.

use std::time::Duration;

pub mod core;
pub mod runtime;

pub use self::core::{BatchCore, DEFAULT_FAILURE_CODE};
pub use self::runtime::Orchestrator;

/// Where the orchestrator currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Scheduling,
    Launching { batch: usize },
    Polling { batch: usize },
    /// Last batch has exited; flushing its output before a successful exit.
    Draining { batch: usize },
    Teardown,
    Finished,
}

/// Inputs to the core, produced by the shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreEvent {
    Start,
    /// Every process of `batch` was spawned.
    Launched { batch: usize },
    SpawnFailed { slot: usize, error: String },
    /// One poll over `batch`: `(slot, exit_code)` for every exited process,
    /// in slot order, out of `total` processes.
    Polled {
        batch: usize,
        exits: Vec<(usize, i32)>,
        total: usize,
    },
    /// Every process of `batch` was waited and its output flushed.
    Drained { batch: usize },
    Interrupted { signal: String },
    /// Unexpected IO failure while supervising processes.
    Fault { error: String },
    TornDown,
}

/// Instructions from the core to the shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreCommand {
    /// Pause between batches. Interruptible.
    Sleep(Duration),
    /// Spawn `size` processes in slots `first_slot..first_slot + size`.
    Launch {
        batch: usize,
        size: usize,
        first_slot: usize,
    },
    /// Poll every process in `batch` after waiting `delay`.
    Poll { batch: usize, delay: Duration },
    /// Wait every process in `batch`, flushing output.
    Drain { batch: usize },
    /// Terminate, wait the grace period, kill, then wait everything launched.
    Teardown { code: i32 },
    Exit { code: i32 },
}

/// Commands returned by one [`BatchCore::step`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoreStep {
    pub commands: Vec<CoreCommand>,
}

impl CoreStep {
    pub fn single(command: CoreCommand) -> Self {
        Self {
            commands: vec![command],
        }
    }
}

/// Aggregate failure state of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub any_failed: bool,
    /// First non-zero exit code observed.
    pub failing_code: Option<i32>,
}

impl BatchOutcome {
    pub fn record_failure(&mut self, code: i32) {
        self.any_failed = true;
        self.failing_code.get_or_insert(code);
    }
}

/// What a finished run looked like.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Code the xbatch process should exit with.
    pub exit_code: i32,
    /// Processes actually spawned.
    pub spawned: usize,
    pub batches_launched: usize,
    pub outcome: BatchOutcome,
    pub interrupted_by: Option<String>,
    /// Spawn or supervision error that ended the run.
    pub error: Option<String>,
}

impl RunReport {
    /// Human-readable reason for a non-zero exit, if there is one worth
    /// printing on stderr.
    pub fn message(&self) -> Option<String> {
        if let Some(err) = &self.error {
            return Some(err.clone());
        }
        self.interrupted_by
            .as_ref()
            .map(|signal| format!("exit with: {signal}"))
    }
}
