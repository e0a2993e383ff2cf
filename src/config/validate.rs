// src/config/validate.rs

//! Merge command line and config file into a validated [`Settings`].

use std::time::Duration;

use crate::batch::{BatchSpec, Command, RunOptions};
use crate::cli::CliArgs;
use crate::config::model::{CommandLine, ConfigFile};
use crate::errors::{Result, XbatchError};
use crate::types::ColorMode;

pub const DEFAULT_COUNT: i64 = 2;
pub const DEFAULT_STEP: i64 = 1;
pub const DEFAULT_INTERVAL_SECS: f64 = 1.0;

/// Everything needed to start a run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub spec: BatchSpec,
    pub options: RunOptions,
    pub color: ColorMode,
}

/// Resolve every option as: command line, then `file`, then default.
pub fn resolve(args: &CliArgs, file: Option<&ConfigFile>) -> Result<Settings> {
    let empty = ConfigFile::default();
    let file = file.unwrap_or(&empty);

    let count = args.count.or(file.batch.count).unwrap_or(DEFAULT_COUNT);
    if count < 1 {
        return Err(XbatchError::Validation(
            "count must be greater than 0".to_string(),
        ));
    }

    let command = resolve_command(args, file)?;

    let step = args.step.or(file.batch.step).unwrap_or(DEFAULT_STEP);
    if step < 1 {
        return Err(XbatchError::Validation(
            "step must be greater than 0".to_string(),
        ));
    }

    let interval = args
        .interval
        .or(file.batch.interval)
        .unwrap_or(DEFAULT_INTERVAL_SECS);
    let interval = Duration::try_from_secs_f64(interval).map_err(|_| {
        XbatchError::Validation(format!(
            "interval must be a non-negative number of seconds (got {interval})"
        ))
    })?;

    let spec = BatchSpec {
        command,
        total_count: count as usize,
        step: step as usize,
        interval,
        fail_fast: args
            .fail_fast_override()
            .or(file.batch.fail_fast)
            .unwrap_or(true),
        remainder: args.remainder.or(file.batch.remainder).unwrap_or_default(),
    };

    let defaults = RunOptions::default();
    let options = RunOptions {
        poll_interval: args
            .poll_interval_ms
            .or(file.process.poll_interval_ms)
            .map(Duration::from_millis)
            .unwrap_or(defaults.poll_interval),
        grace_period: args
            .grace_period_ms
            .or(file.process.grace_period_ms)
            .map(Duration::from_millis)
            .unwrap_or(defaults.grace_period),
    };
    if options.poll_interval.is_zero() {
        return Err(XbatchError::Validation(
            "poll interval must be at least 1ms".to_string(),
        ));
    }

    Ok(Settings {
        spec,
        options,
        color: args.color.or(file.output.color).unwrap_or_default(),
    })
}

fn resolve_command(args: &CliArgs, file: &ConfigFile) -> Result<Command> {
    let argv = if !args.cmd.is_empty() {
        split_command(&args.cmd)?
    } else {
        match &file.batch.cmd {
            Some(CommandLine::Line(line)) => split_command(std::slice::from_ref(line))?,
            Some(CommandLine::Argv(argv)) => argv.clone(),
            None => Vec::new(),
        }
    };

    Command::new(argv).ok_or_else(|| {
        XbatchError::Validation("[CMD]... is required, see usage for details".to_string())
    })
}

/// A single argument is split with shell quoting rules; several arguments
/// are taken literally.
pub fn split_command(args: &[String]) -> Result<Vec<String>> {
    match args {
        [single] => shlex::split(single).ok_or_else(|| {
            XbatchError::Validation(format!("cannot split command (unbalanced quotes?): {single}"))
        }),
        many => Ok(many.to_vec()),
    }
}
