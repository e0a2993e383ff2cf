// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::types::{ColorMode, RemainderOrder};

const EXAMPLES: &str = "\
Examples:
    xbatch echo hello world
    xbatch -c 5 \"sh -c 'echo hello; sleep 1; echo world'\"
    xbatch -c 7 -s 3 -- sh -c 'echo hello; sleep 1; echo world'";

/// Command-line arguments for `xbatch`.
///
/// Options left unset fall back to the `--config` file, then to built-in
/// defaults (see [`crate::config`]).
#[derive(Debug, Clone, Parser)]
#[command(
    name = "xbatch",
    version,
    about = "Execute a program multiple times in parallel.",
    long_about = None,
    after_help = EXAMPLES
)]
pub struct CliArgs {
    /// Total number of processes to run. [default: 2]
    #[arg(short, long, value_name = "N", allow_negative_numbers = true)]
    pub count: Option<i64>,

    /// Run in this many steps, each with count/step processes in parallel
    /// (plus one extra step for the remainder). [default: 1]
    #[arg(short, long, value_name = "N", allow_negative_numbers = true)]
    pub step: Option<i64>,

    /// Seconds to sleep between steps. [default: 1]
    #[arg(short, long, value_name = "SECS", allow_negative_numbers = true)]
    pub interval: Option<f64>,

    /// Stop everything as soon as one process exits non-zero. [default]
    #[arg(short = 'e', long, visible_alias = "err-exit", overrides_with = "no_fail_fast")]
    pub fail_fast: bool,

    /// Let every process run to completion regardless of failures.
    #[arg(long, overrides_with = "fail_fast")]
    pub no_fail_fast: bool,

    /// Whether the remainder step runs before or after the full steps.
    #[arg(long, value_enum, value_name = "ORDER")]
    pub remainder: Option<RemainderOrder>,

    /// Milliseconds between two status polls of a running step.
    #[arg(long, value_name = "MS")]
    pub poll_interval_ms: Option<u64>,

    /// Milliseconds between terminate and kill during teardown.
    #[arg(long, value_name = "MS")]
    pub grace_period_ms: Option<u64>,

    /// Colour the per-process markers.
    #[arg(long, value_enum, value_name = "WHEN")]
    pub color: Option<ColorMode>,

    /// Optional TOML file with defaults for the options above.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `XBATCH_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Print the resolved schedule without running anything.
    #[arg(long)]
    pub dry_run: bool,

    /// The program and its arguments. A single argument is split like a
    /// shell would split it.
    #[arg(value_name = "CMD", trailing_var_arg = true, allow_hyphen_values = true)]
    pub cmd: Vec<String>,
}

impl CliArgs {
    /// Fail-fast setting given on the command line, if any.
    pub fn fail_fast_override(&self) -> Option<bool> {
        if self.no_fail_fast {
            Some(false)
        } else if self.fail_fast {
            Some(true)
        } else {
            None
        }
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
