// src/engine/runtime.rs

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tracing::{debug, info, warn};

use crate::batch::{BatchSpec, Command, RunOptions};
use crate::errors::{Result, XbatchError};
use crate::exec::{ProcessHandle, ProcessSpawner};
use crate::signal::Interrupt;

use super::core::BatchCore;
use super::{CoreCommand, CoreEvent, RunReport};

/// Drives [`BatchCore`] against a [`ProcessSpawner`].
///
/// This is the IO shell around the core: it owns every launched handle,
/// performs the sleeps, polls and waits the core asks for, and turns
/// interrupts into [`CoreEvent::Interrupted`]. Only this struct ever touches
/// the handle list.
pub struct Orchestrator<S: ProcessSpawner> {
    core: BatchCore,
    command: Command,
    prefixed: bool,
    grace_period: Duration,
    spawner: S,
    interrupts: mpsc::Receiver<Interrupt>,
    /// Handles per launched batch, kept until the run ends.
    batches: Vec<Vec<S::Handle>>,
}

impl<S: ProcessSpawner> fmt::Debug for Orchestrator<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("core", &self.core)
            .field("command", &self.command)
            .finish_non_exhaustive()
    }
}

impl<S: ProcessSpawner> Orchestrator<S> {
    /// Build an orchestrator. `interrupts` is the teardown trigger: whoever
    /// holds the sender (normally a [`crate::signal::SignalBridge`]) can stop
    /// the run.
    pub fn new(
        spec: BatchSpec,
        options: RunOptions,
        spawner: S,
        interrupts: mpsc::Receiver<Interrupt>,
    ) -> Self {
        Self {
            core: BatchCore::new(&spec, &options),
            prefixed: spec.prefixed(),
            command: spec.command,
            grace_period: options.grace_period,
            spawner,
            interrupts,
            batches: Vec::new(),
        }
    }

    /// Run every batch to completion or teardown.
    ///
    /// Child failures, spawn failures and interrupts are reported through
    /// the returned [`RunReport`], not as errors.
    pub async fn run(mut self) -> Result<RunReport> {
        info!(
            cmd = %self.command,
            batches = self.core.schedule().len(),
            "batch run started"
        );

        let mut pending: VecDeque<CoreCommand> = self.core.step(CoreEvent::Start).commands.into();

        while let Some(command) = pending.pop_front() {
            if let CoreCommand::Exit { code } = command {
                return Ok(self.report(code));
            }

            if let Some(event) = self.execute(command).await {
                // A new event supersedes whatever was still queued (e.g. a
                // launch after an interrupted sleep).
                pending.clear();
                pending.extend(self.core.step(event).commands);
            }
        }

        Err(XbatchError::Other(anyhow::anyhow!(
            "orchestrator stalled in phase {:?}",
            self.core.phase()
        )))
    }

    async fn execute(&mut self, command: CoreCommand) -> Option<CoreEvent> {
        match command {
            CoreCommand::Sleep(duration) => self.sleep_interruptible(duration).await,
            CoreCommand::Launch {
                batch,
                size,
                first_slot,
            } => Some(self.launch(batch, size, first_slot)),
            CoreCommand::Poll { batch, delay } => {
                if let Some(event) = self.sleep_interruptible(delay).await {
                    return Some(event);
                }
                Some(self.poll(batch))
            }
            CoreCommand::Drain { batch } => Some(self.drain(batch).await),
            CoreCommand::Teardown { code } => {
                self.teardown(code).await;
                Some(CoreEvent::TornDown)
            }
            CoreCommand::Exit { .. } => None,
        }
    }

    async fn sleep_interruptible(&mut self, duration: Duration) -> Option<CoreEvent> {
        if duration.is_zero() {
            return self.pending_interrupt();
        }

        tokio::select! {
            _ = tokio::time::sleep(duration) => None,
            Some(interrupt) = self.interrupts.recv() => Some(CoreEvent::Interrupted {
                signal: interrupt.signal,
            }),
        }
    }

    fn pending_interrupt(&mut self) -> Option<CoreEvent> {
        match self.interrupts.try_recv() {
            Ok(interrupt) => Some(CoreEvent::Interrupted {
                signal: interrupt.signal,
            }),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    fn launch(&mut self, batch: usize, size: usize, first_slot: usize) -> CoreEvent {
        info!(batch, size, first_slot, "launching batch");
        self.batches.push(Vec::new());

        for slot in first_slot..first_slot + size {
            if let Some(event) = self.pending_interrupt() {
                return event;
            }

            match self.spawner.spawn(&self.command, slot, self.prefixed) {
                Ok(handle) => self.batches[batch].push(handle),
                Err(err) => {
                    return CoreEvent::SpawnFailed {
                        slot,
                        error: err.to_string(),
                    };
                }
            }
        }

        CoreEvent::Launched { batch }
    }

    fn poll(&mut self, batch: usize) -> CoreEvent {
        let handles = &mut self.batches[batch];
        let total = handles.len();
        let mut exits = Vec::with_capacity(total);

        for handle in handles.iter_mut() {
            match handle.poll() {
                Ok(state) => {
                    if let Some(code) = state.code() {
                        exits.push((handle.slot(), code));
                    }
                }
                Err(err) => {
                    return CoreEvent::Fault {
                        error: format!("polling process in slot {}: {err}", handle.slot()),
                    };
                }
            }
        }

        debug!(batch, exited = exits.len(), total, "polled batch");
        CoreEvent::Polled { batch, exits, total }
    }

    /// Wait every handle of `batch`. Waits may block on output held open by
    /// forked descendants, so an interrupt ends the drain early.
    async fn drain(&mut self, batch: usize) -> CoreEvent {
        let interrupts = &mut self.interrupts;
        for handle in self.batches[batch].iter_mut() {
            let slot = handle.slot();
            tokio::select! {
                result = handle.wait() => {
                    if let Err(err) = result {
                        return CoreEvent::Fault {
                            error: format!("waiting for process in slot {slot}: {err}"),
                        };
                    }
                }
                Some(interrupt) = interrupts.recv() => {
                    info!(batch, slot, signal = %interrupt.signal, "interrupted while draining");
                    return CoreEvent::Interrupted {
                        signal: interrupt.signal,
                    };
                }
            }
        }

        if let Some(event) = self.pending_interrupt() {
            return event;
        }
        info!(batch, "batch finished");
        CoreEvent::Drained { batch }
    }

    /// Terminate, grace period, kill, wait. Covers every batch launched so
    /// far. Every step tolerates handles that already exited.
    async fn teardown(&mut self, code: i32) {
        let running = self.for_each_running(|h| h.terminate(), "terminate");
        info!(code, running, "teardown: sent terminate");

        if running > 0 {
            tokio::time::sleep(self.grace_period).await;
            let killed = self.for_each_running(|h| h.kill(), "kill");
            if killed > 0 {
                info!(killed, "teardown: killed processes that ignored terminate");
            }
        }

        for handle in self.batches.iter_mut().flatten() {
            if let Err(err) = handle.wait().await {
                warn!(slot = handle.slot(), error = %err, "teardown: wait failed");
            }
        }
        info!("teardown complete");
    }

    /// Apply `action` to every handle still active; returns how many there
    /// were.
    fn for_each_running<F>(&mut self, mut action: F, what: &str) -> usize
    where
        F: FnMut(&mut S::Handle) -> Result<()>,
    {
        let mut count = 0;
        for handle in self.batches.iter_mut().flatten() {
            match handle.is_active() {
                Ok(true) => {
                    count += 1;
                    if let Err(err) = action(handle) {
                        warn!(slot = handle.slot(), error = %err, "teardown: {what} failed");
                    }
                }
                Ok(false) => {}
                Err(err) => {
                    warn!(slot = handle.slot(), error = %err, "teardown: status check failed");
                }
            }
        }
        count
    }

    fn report(&self, exit_code: i32) -> RunReport {
        let spawned = self.batches.iter().map(Vec::len).sum();
        let report = RunReport {
            exit_code,
            spawned,
            batches_launched: self.batches.len(),
            outcome: self.core.outcome(),
            interrupted_by: self.core.interrupted_by().map(str::to_string),
            error: self.core.fatal_error().map(str::to_string),
        };
        info!(
            exit_code,
            spawned,
            batches = report.batches_launched,
            any_failed = report.outcome.any_failed,
            "batch run finished"
        );
        report
    }
}
