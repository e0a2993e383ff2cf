use std::time::Duration;

use xbatch::batch::{BatchSpec, Command, RunOptions};
use xbatch::types::RemainderOrder;

/// Builder for `BatchSpec` to simplify test setup.
///
/// Defaults: `count = 2`, `step = 1`, no interval, fail-fast on, command
/// `true`.
pub struct BatchSpecBuilder {
    spec: BatchSpec,
}

impl BatchSpecBuilder {
    pub fn new() -> Self {
        Self {
            spec: BatchSpec {
                command: Command::new(vec!["true".to_string()]).expect("non-empty command"),
                total_count: 2,
                step: 1,
                interval: Duration::ZERO,
                fail_fast: true,
                remainder: RemainderOrder::First,
            },
        }
    }

    pub fn command(mut self, argv: &[&str]) -> Self {
        let argv = argv.iter().map(|s| s.to_string()).collect();
        self.spec.command = Command::new(argv).expect("non-empty command");
        self
    }

    /// `sh -c <script>`.
    pub fn shell(self, script: &str) -> Self {
        self.command(&["sh", "-c", script])
    }

    pub fn count(mut self, count: usize) -> Self {
        self.spec.total_count = count;
        self
    }

    pub fn step(mut self, step: usize) -> Self {
        self.spec.step = step;
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.spec.interval = interval;
        self
    }

    pub fn fail_fast(mut self, val: bool) -> Self {
        self.spec.fail_fast = val;
        self
    }

    pub fn remainder(mut self, order: RemainderOrder) -> Self {
        self.spec.remainder = order;
        self
    }

    pub fn build(self) -> BatchSpec {
        self.spec
    }
}

impl Default for BatchSpecBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Fast timings so tests don't sit in sleeps.
pub fn fast_options() -> RunOptions {
    RunOptions {
        poll_interval: Duration::from_millis(5),
        grace_period: Duration::from_millis(20),
    }
}
