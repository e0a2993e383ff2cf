// src/engine/core.rs

//! Pure batch state machine.
//!
//! [`BatchCore`] consumes [`CoreEvent`]s and answers with [`CoreCommand`]s
//! for the async shell (`engine::runtime::Orchestrator`) to execute. It owns
//! the schedule cursor, the fail-fast policy and the exit code; it never
//! touches processes, channels or the clock, so every transition can be
//! tested synchronously.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::batch::{BatchSpec, RunOptions, Schedule};

use super::{BatchOutcome, CoreCommand, CoreEvent, CoreStep, Phase};

/// Exit code used when a run is torn down without a child failure code.
pub const DEFAULT_FAILURE_CODE: i32 = 1;

#[derive(Debug)]
pub struct BatchCore {
    schedule: Schedule,
    interval: Duration,
    poll_interval: Duration,
    fail_fast: bool,
    phase: Phase,
    /// Index of the next batch to launch.
    next_batch: usize,
    outcome: BatchOutcome,
    exit_code: Option<i32>,
    interrupted_by: Option<String>,
    fatal_error: Option<String>,
}

impl BatchCore {
    pub fn new(spec: &BatchSpec, options: &RunOptions) -> Self {
        Self {
            schedule: Schedule::compute(spec.total_count, spec.step, spec.remainder),
            interval: spec.interval,
            poll_interval: options.poll_interval,
            fail_fast: spec.fail_fast,
            phase: Phase::Idle,
            next_batch: 0,
            outcome: BatchOutcome::default(),
            exit_code: None,
            interrupted_by: None,
            fatal_error: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn outcome(&self) -> BatchOutcome {
        self.outcome
    }

    /// Exit code decided so far (set once teardown or success is reached).
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    pub fn interrupted_by(&self) -> Option<&str> {
        self.interrupted_by.as_deref()
    }

    pub fn fatal_error(&self) -> Option<&str> {
        self.fatal_error.as_deref()
    }

    /// Handle one event and return what the shell should do next.
    pub fn step(&mut self, event: CoreEvent) -> CoreStep {
        debug!(phase = ?self.phase, ?event, "core step");

        match (self.phase, event) {
            (Phase::Teardown, CoreEvent::TornDown) => self.finish_teardown(),
            (Phase::Teardown | Phase::Finished, other) => {
                debug!(event = ?other, "ignoring event after teardown started");
                CoreStep::default()
            }

            (_, CoreEvent::Interrupted { signal }) => {
                warn!(signal = %signal, "interrupted; tearing down");
                let code = self.outcome.failing_code.unwrap_or(DEFAULT_FAILURE_CODE);
                self.interrupted_by = Some(signal);
                self.begin_teardown(code)
            }
            (_, CoreEvent::SpawnFailed { slot, error }) => {
                warn!(slot, error = %error, "spawn failed; tearing down");
                self.fatal_error = Some(error);
                self.begin_teardown(DEFAULT_FAILURE_CODE)
            }
            (_, CoreEvent::Fault { error }) => {
                warn!(error = %error, "fatal error; tearing down");
                self.fatal_error = Some(error);
                self.begin_teardown(DEFAULT_FAILURE_CODE)
            }

            (Phase::Idle, CoreEvent::Start) => {
                self.phase = Phase::Scheduling;
                self.advance()
            }
            (Phase::Launching { batch }, CoreEvent::Launched { batch: launched })
                if batch == launched =>
            {
                self.phase = Phase::Polling { batch };
                CoreStep::single(CoreCommand::Poll {
                    batch,
                    delay: Duration::ZERO,
                })
            }
            (Phase::Polling { batch }, CoreEvent::Polled { batch: polled, exits, total })
                if batch == polled =>
            {
                self.on_polled(batch, &exits, total)
            }
            (Phase::Polling { batch } | Phase::Draining { batch }, CoreEvent::Drained { batch: drained })
                if batch == drained =>
            {
                if matches!(self.phase, Phase::Draining { .. }) {
                    self.finish_success()
                } else {
                    self.phase = Phase::Scheduling;
                    self.advance()
                }
            }

            (phase, other) => {
                warn!(?phase, event = ?other, "event does not apply to current phase; ignoring");
                CoreStep::default()
            }
        }
    }

    /// Move to the next scheduled batch, or finish when none remain.
    fn advance(&mut self) -> CoreStep {
        let Some(size) = self.schedule.batch(self.next_batch) else {
            return self.finish_success();
        };

        let batch = self.next_batch;
        self.next_batch += 1;

        let mut commands = Vec::with_capacity(2);
        if batch > 0 && !self.interval.is_zero() {
            commands.push(CoreCommand::Sleep(self.interval));
        }
        commands.push(CoreCommand::Launch {
            batch,
            size,
            first_slot: self.schedule.first_slot(batch),
        });

        info!(batch, size, of = self.schedule.len(), "scheduling batch");
        self.phase = Phase::Launching { batch };
        CoreStep { commands }
    }

    fn on_polled(&mut self, batch: usize, exits: &[(usize, i32)], total: usize) -> CoreStep {
        if self.fail_fast {
            if let Some(&(slot, code)) = exits.iter().find(|(_, code)| *code != 0) {
                warn!(batch, slot, exit_code = code, "process failed; fail-fast teardown");
                self.outcome.record_failure(code);
                return self.begin_teardown(code);
            }
        }

        if exits.len() < total {
            return CoreStep::single(CoreCommand::Poll {
                batch,
                delay: self.poll_interval,
            });
        }

        // Whole batch exited; without fail-fast, failures are only recorded.
        for &(slot, code) in exits.iter().filter(|(_, code)| *code != 0) {
            warn!(batch, slot, exit_code = code, "process failed");
            self.outcome.record_failure(code);
        }

        self.phase = if self.next_batch >= self.schedule.len() {
            Phase::Draining { batch }
        } else {
            Phase::Polling { batch }
        };
        CoreStep::single(CoreCommand::Drain { batch })
    }

    fn begin_teardown(&mut self, code: i32) -> CoreStep {
        self.phase = Phase::Teardown;
        self.exit_code = Some(code);
        CoreStep::single(CoreCommand::Teardown { code })
    }

    fn finish_teardown(&mut self) -> CoreStep {
        let code = self.exit_code.unwrap_or(DEFAULT_FAILURE_CODE);
        self.phase = Phase::Finished;
        CoreStep::single(CoreCommand::Exit { code })
    }

    fn finish_success(&mut self) -> CoreStep {
        if self.outcome.any_failed {
            warn!(
                failing_code = ?self.outcome.failing_code,
                "some processes failed; fail-fast is off so the run still succeeds"
            );
        }
        self.phase = Phase::Finished;
        self.exit_code = Some(0);
        CoreStep::single(CoreCommand::Exit { code: 0 })
    }
}
