// src/lib.rs

pub mod batch;
pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod signal;
pub mod types;

use anyhow::Result;
use tracing::debug;

use crate::cli::CliArgs;
use crate::config::{Settings, load_from_path, resolve};
use crate::engine::Orchestrator;
use crate::exec::{OsSpawner, OutputMux};
use crate::signal::SignalBridge;

/// High-level entry point used by `main.rs`. Returns the exit code for the
/// xbatch process.
///
/// This wires together:
/// - config loading and validation
/// - the output multiplexer and OS process spawner
/// - SIGINT / SIGTERM forwarding
/// - the batch orchestrator
pub async fn run(args: CliArgs) -> Result<i32> {
    let file = match &args.config {
        Some(path) => Some(load_from_path(path)?),
        None => None,
    };
    let settings = resolve(&args, file.as_ref())?;

    if args.dry_run {
        print_dry_run(&settings);
        return Ok(0);
    }

    let output = OutputMux::stdout(settings.color.enabled());
    let spawner = OsSpawner::new(output);

    let (interrupt_tx, interrupt_rx) = signal::channel();
    let _bridge = SignalBridge::install(interrupt_tx)?;

    let orchestrator = Orchestrator::new(settings.spec, settings.options, spawner, interrupt_rx);
    let report = orchestrator.run().await?;

    if let Some(message) = report.message() {
        eprintln!("xbatch: {message}");
    }

    Ok(report.exit_code)
}

/// Dry-run output: the resolved command, options and batch schedule.
fn print_dry_run(settings: &Settings) {
    let spec = &settings.spec;
    let schedule = batch::Schedule::compute(spec.total_count, spec.step, spec.remainder);

    println!("xbatch dry-run");
    println!("  cmd: {}", spec.command);
    println!("  count = {}", spec.total_count);
    println!("  step = {}", spec.step);
    println!("  interval = {:?}", spec.interval);
    println!("  fail_fast = {}", spec.fail_fast);
    println!("  remainder = {:?}", spec.remainder);
    println!("  poll_interval = {:?}", settings.options.poll_interval);
    println!("  grace_period = {:?}", settings.options.grace_period);
    println!();

    println!("batches ({}):", schedule.len());
    for (index, size) in schedule.sizes().enumerate() {
        let first = schedule.first_slot(index);
        println!("  - #{index}: {size} process(es), slots {first}..={}", first + size - 1);
    }

    debug!("dry-run complete (no execution)");
}
