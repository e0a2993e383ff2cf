// src/batch/spec.rs

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::types::RemainderOrder;

/// Program plus arguments, shared read-only by every process in a run.
///
/// Cloning is cheap; all clones point at the same argument vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    argv: Arc<[String]>,
}

impl Command {
    /// Build a command from an argument vector. Returns `None` if `argv` is
    /// empty or the program name is blank.
    pub fn new(argv: Vec<String>) -> Option<Self> {
        match argv.first() {
            Some(program) if !program.trim().is_empty() => Some(Self { argv: argv.into() }),
            _ => None,
        }
    }

    pub fn program(&self) -> &str {
        &self.argv[0]
    }

    pub fn args(&self) -> &[String] {
        &self.argv[1..]
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = shlex::try_join(self.argv.iter().map(String::as_str))
            .unwrap_or_else(|_| self.argv.join(" "));
        f.write_str(&joined)
    }
}

/// Everything the orchestrator needs to know about one invocation.
///
/// Created once from validated input and never mutated.
#[derive(Debug, Clone)]
pub struct BatchSpec {
    pub command: Command,
    /// Total number of processes to run, always >= 1.
    pub total_count: usize,
    /// Number of stepped batches, always >= 1.
    pub step: usize,
    /// Pause between consecutive batches.
    pub interval: Duration,
    /// Tear everything down as soon as one process exits non-zero.
    pub fail_fast: bool,
    pub remainder: RemainderOrder,
}

impl BatchSpec {
    /// Whether output lines get a pid prefix and a coloured marker.
    ///
    /// A run with a single process prints exactly what a plain run would.
    pub fn prefixed(&self) -> bool {
        self.total_count > 1
    }
}

/// Timing knobs for the polling loop and teardown.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// Sleep between two polls of the running batch.
    pub poll_interval: Duration,
    /// Time between `terminate()` and `kill()` during teardown.
    pub grace_period: Duration,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(20),
            grace_period: Duration::from_millis(10),
        }
    }
}
