use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use xbatch::batch::Command;
use xbatch::errors::{Result, XbatchError};
use tokio::sync::mpsc;
use xbatch::exec::{ExitState, OutputMux, ProcessHandle, ProcessSpawner};
use xbatch::signal::Interrupt;

/// Exit code a fake reports after `terminate()` (128 + SIGTERM).
pub const TERMINATED_CODE: i32 = 143;
/// Exit code a fake reports after `kill()` (128 + SIGKILL).
pub const KILLED_CODE: i32 = 137;

/// How a fake process behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeScript {
    /// Report `Running` for `after_polls` polls, then exit with `code`.
    Exit { code: i32, after_polls: usize },
    /// Run until terminated or killed.
    Hang,
    /// Ignore `terminate()`; only `kill()` stops it.
    IgnoreTerm,
}

impl FakeScript {
    pub fn succeed() -> Self {
        FakeScript::Exit {
            code: 0,
            after_polls: 1,
        }
    }

    pub fn fail(code: i32) -> Self {
        FakeScript::Exit {
            code,
            after_polls: 1,
        }
    }
}

/// Something the orchestrator did to a fake process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeEvent {
    Spawned(usize),
    /// `terminate()` reached a running process.
    Terminated(usize),
    /// `kill()` reached a running process.
    Killed(usize),
    Waited(usize),
}

/// Shared, ordered record of [`FakeEvent`]s.
#[derive(Debug, Clone, Default)]
pub struct FakeLog {
    events: Arc<Mutex<Vec<FakeEvent>>>,
}

impl FakeLog {
    fn push(&self, event: FakeEvent) {
        self.events.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<FakeEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn spawned(&self) -> Vec<usize> {
        self.slots(|e| matches!(e, FakeEvent::Spawned(_)))
    }

    pub fn terminated(&self) -> Vec<usize> {
        self.slots(|e| matches!(e, FakeEvent::Terminated(_)))
    }

    pub fn killed(&self) -> Vec<usize> {
        self.slots(|e| matches!(e, FakeEvent::Killed(_)))
    }

    pub fn waited(&self) -> Vec<usize> {
        self.slots(|e| matches!(e, FakeEvent::Waited(_)))
    }

    fn slots(&self, pred: impl Fn(&FakeEvent) -> bool) -> Vec<usize> {
        self.events()
            .into_iter()
            .filter(|e| pred(e))
            .map(|e| match e {
                FakeEvent::Spawned(s)
                | FakeEvent::Terminated(s)
                | FakeEvent::Killed(s)
                | FakeEvent::Waited(s) => s,
            })
            .collect()
    }
}

/// A spawner whose processes never touch the OS.
///
/// Every slot follows the default script unless overridden with
/// [`FakeSpawner::with_slot`].
pub struct FakeSpawner {
    default: FakeScript,
    overrides: HashMap<usize, FakeScript>,
    fail_at: Option<usize>,
    output: Option<OutputMux>,
    interrupt_at: Option<(usize, mpsc::Sender<Interrupt>)>,
    log: FakeLog,
}

impl FakeSpawner {
    pub fn new() -> Self {
        Self {
            default: FakeScript::succeed(),
            overrides: HashMap::new(),
            fail_at: None,
            output: None,
            interrupt_at: None,
            log: FakeLog::default(),
        }
    }

    pub fn with_default(mut self, script: FakeScript) -> Self {
        self.default = script;
        self
    }

    pub fn with_slot(mut self, slot: usize, script: FakeScript) -> Self {
        self.overrides.insert(slot, script);
        self
    }

    /// Make `spawn` fail for `slot` as if the executable were missing.
    pub fn fail_spawn_at(mut self, slot: usize) -> Self {
        self.fail_at = Some(slot);
        self
    }

    /// Write a `started` line through `output` for every spawn.
    pub fn with_output(mut self, output: OutputMux) -> Self {
        self.output = Some(output);
        self
    }

    /// Send a SIGINT interrupt on `tx` while spawning `slot`, as if it arrived
    /// mid-launch. The slot itself is still spawned.
    pub fn interrupt_at(mut self, slot: usize, tx: mpsc::Sender<Interrupt>) -> Self {
        self.interrupt_at = Some((slot, tx));
        self
    }

    pub fn log(&self) -> FakeLog {
        self.log.clone()
    }
}

impl Default for FakeSpawner {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessSpawner for FakeSpawner {
    type Handle = FakeProcess;

    fn spawn(&mut self, command: &Command, slot: usize, prefixed: bool) -> Result<FakeProcess> {
        if self.fail_at == Some(slot) {
            return Err(XbatchError::Spawn {
                program: command.program().to_string(),
                source: io::Error::new(io::ErrorKind::NotFound, "No such file or directory"),
            });
        }

        let process = FakeProcess {
            slot,
            script: self.overrides.get(&slot).copied().unwrap_or(self.default),
            polls: 0,
            exit_code: None,
            log: self.log.clone(),
        };

        if let Some(output) = &self.output {
            let (marker, prefix) = if prefixed {
                (slot, process.pid())
            } else {
                (0, None)
            };
            output.emit(marker, "started\n", prefix)?;
        }

        if let Some((_, tx)) = self.interrupt_at.as_ref().filter(|(at, _)| *at == slot) {
            tx.try_send(Interrupt::new("SIGINT"))
                .expect("interrupt channel has room");
        }

        self.log.push(FakeEvent::Spawned(slot));
        Ok(process)
    }
}

#[derive(Debug)]
pub struct FakeProcess {
    slot: usize,
    script: FakeScript,
    polls: usize,
    exit_code: Option<i32>,
    log: FakeLog,
}

impl ProcessHandle for FakeProcess {
    fn pid(&self) -> Option<u32> {
        Some(10_000 + self.slot as u32)
    }

    fn slot(&self) -> usize {
        self.slot
    }

    fn poll(&mut self) -> Result<ExitState> {
        if let Some(code) = self.exit_code {
            return Ok(ExitState::Exited(code));
        }
        if let FakeScript::Exit { code, after_polls } = self.script {
            if self.polls >= after_polls {
                self.exit_code = Some(code);
                return Ok(ExitState::Exited(code));
            }
        }
        self.polls += 1;
        Ok(ExitState::Running)
    }

    fn terminate(&mut self) -> Result<()> {
        if self.exit_code.is_some() {
            return Ok(());
        }
        self.log.push(FakeEvent::Terminated(self.slot));
        if self.script != FakeScript::IgnoreTerm {
            self.exit_code = Some(TERMINATED_CODE);
        }
        Ok(())
    }

    fn kill(&mut self) -> Result<()> {
        if self.exit_code.is_some() {
            return Ok(());
        }
        self.log.push(FakeEvent::Killed(self.slot));
        self.exit_code = Some(KILLED_CODE);
        Ok(())
    }

    fn wait(&mut self) -> Pin<Box<dyn Future<Output = Result<i32>> + Send + '_>> {
        Box::pin(async move {
            loop {
                if let ExitState::Exited(code) = self.poll()? {
                    self.log.push(FakeEvent::Waited(self.slot));
                    return Ok(code);
                }
                if !matches!(self.script, FakeScript::Exit { .. }) {
                    // Blocks like a real process that nobody stopped.
                    std::future::pending::<()>().await;
                }
                tokio::task::yield_now().await;
            }
        })
    }
}
