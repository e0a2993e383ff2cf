use std::error::Error;
use std::time::Duration;

use tokio::time::Instant;

use xbatch::engine::{Orchestrator, RunReport};
use xbatch::exec::OutputMux;
use xbatch::signal::{self, Interrupt};
use xbatch_test_utils::buffer::SharedBuffer;
use xbatch_test_utils::builders::{BatchSpecBuilder, fast_options};
use xbatch_test_utils::fake_process::{FakeEvent, FakeScript, FakeSpawner};
use xbatch_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

async fn run_with(spawner: FakeSpawner, builder: BatchSpecBuilder) -> xbatch::errors::Result<RunReport> {
    let (_tx, rx) = signal::channel();
    Orchestrator::new(builder.build(), fast_options(), spawner, rx)
        .run()
        .await
}

#[tokio::test]
async fn single_batch_of_five_succeeds() -> TestResult {
    init_tracing();

    let spawner = FakeSpawner::new();
    let log = spawner.log();

    let report = with_timeout(run_with(spawner, BatchSpecBuilder::new().count(5).step(1))).await?;

    assert_eq!(report.exit_code, 0);
    assert_eq!(report.spawned, 5);
    assert_eq!(report.batches_launched, 1);
    assert_eq!(log.spawned(), vec![1, 2, 3, 4, 5]);
    assert!(log.terminated().is_empty());
    assert!(!report.outcome.any_failed);
    assert_eq!(report.message(), None);

    Ok(())
}

#[tokio::test]
async fn seven_in_three_steps_launches_remainder_then_pairs() -> TestResult {
    init_tracing();

    let spawner = FakeSpawner::new();
    let log = spawner.log();

    let report = with_timeout(run_with(spawner, BatchSpecBuilder::new().count(7).step(3))).await?;

    assert_eq!(report.exit_code, 0);
    assert_eq!(report.spawned, 7);
    assert_eq!(report.batches_launched, 4);

    // Every process of a batch is waited before the next batch spawns.
    let events = log.events();
    let spawn_positions: Vec<usize> = events
        .iter()
        .enumerate()
        .filter(|(_, e)| matches!(e, FakeEvent::Spawned(_)))
        .map(|(i, _)| i)
        .collect();
    let waited_1 = events
        .iter()
        .position(|e| *e == FakeEvent::Waited(1))
        .ok_or("slot 1 never waited")?;
    assert!(waited_1 < spawn_positions[1]);
    let waited_3 = events
        .iter()
        .position(|e| *e == FakeEvent::Waited(3))
        .ok_or("slot 3 never waited")?;
    assert!(waited_3 < spawn_positions[3]);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn interval_is_slept_between_batches_only() -> TestResult {
    init_tracing();

    let started = Instant::now();
    let report = run_with(
        FakeSpawner::new(),
        BatchSpecBuilder::new()
            .count(7)
            .step(3)
            .interval(Duration::from_secs(10)),
    )
    .await?;

    assert_eq!(report.exit_code, 0);
    // Four batches, three gaps.
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(30), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_secs(40), "elapsed {elapsed:?}");

    Ok(())
}

#[tokio::test]
async fn fail_fast_terminates_siblings_and_propagates_code() -> TestResult {
    init_tracing();

    let spawner = FakeSpawner::new()
        .with_default(FakeScript::Hang)
        .with_slot(2, FakeScript::fail(7));
    let log = spawner.log();

    let report = with_timeout(run_with(
        spawner,
        BatchSpecBuilder::new().count(3).step(1).fail_fast(true),
    ))
    .await?;

    assert_eq!(report.exit_code, 7);
    assert_eq!(log.terminated(), vec![1, 3]);
    assert!(log.killed().is_empty());
    assert_eq!(report.outcome.failing_code, Some(7));

    let mut waited = log.waited();
    waited.sort_unstable();
    waited.dedup();
    assert_eq!(waited, vec![1, 2, 3]);

    Ok(())
}

#[tokio::test]
async fn fail_fast_launches_no_further_batches() -> TestResult {
    init_tracing();

    let spawner = FakeSpawner::new().with_slot(3, FakeScript::fail(4));
    let log = spawner.log();

    let report = with_timeout(run_with(
        spawner,
        BatchSpecBuilder::new().count(6).step(3),
    ))
    .await?;

    assert_eq!(report.exit_code, 4);
    assert_eq!(report.batches_launched, 2);
    assert_eq!(log.spawned(), vec![1, 2, 3, 4]);

    Ok(())
}

#[tokio::test]
async fn without_fail_fast_every_process_runs_and_exit_is_zero() -> TestResult {
    init_tracing();

    let spawner = FakeSpawner::new()
        .with_slot(1, FakeScript::fail(3))
        .with_slot(4, FakeScript::Exit {
            code: 9,
            after_polls: 4,
        });
    let log = spawner.log();

    let report = with_timeout(run_with(
        spawner,
        BatchSpecBuilder::new().count(6).step(2).fail_fast(false),
    ))
    .await?;

    assert_eq!(report.exit_code, 0);
    assert_eq!(report.spawned, 6);
    assert!(report.outcome.any_failed);
    assert_eq!(report.outcome.failing_code, Some(3));
    assert!(log.terminated().is_empty());

    Ok(())
}

#[tokio::test]
async fn spawn_failure_tears_down_started_siblings() -> TestResult {
    init_tracing();

    let spawner = FakeSpawner::new()
        .with_default(FakeScript::Hang)
        .fail_spawn_at(3);
    let log = spawner.log();

    let report = with_timeout(run_with(spawner, BatchSpecBuilder::new().count(4))).await?;

    assert_eq!(report.exit_code, 1);
    assert_eq!(report.spawned, 2);
    assert_eq!(log.spawned(), vec![1, 2]);
    assert_eq!(log.terminated(), vec![1, 2]);
    let message = report.message().ok_or("expected an error message")?;
    assert!(message.contains("failed to spawn 'true'"), "{message}");

    Ok(())
}

#[tokio::test]
async fn interrupt_while_polling_terminates_then_kills() -> TestResult {
    init_tracing();

    let spawner = FakeSpawner::new()
        .with_default(FakeScript::Hang)
        .with_slot(2, FakeScript::IgnoreTerm)
        .with_slot(3, FakeScript::succeed());
    let log = spawner.log();

    let (tx, rx) = signal::channel();
    let spec = BatchSpecBuilder::new().count(3).build();
    let run = tokio::spawn(Orchestrator::new(spec, fast_options(), spawner, rx).run());

    // Let the batch start polling before interrupting it.
    while log.spawned().len() < 3 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    tokio::time::sleep(Duration::from_millis(20)).await;
    tx.send(Interrupt::new("SIGINT")).await?;

    let report = with_timeout(run).await??;

    assert_ne!(report.exit_code, 0);
    assert_eq!(report.exit_code, 1);
    assert_eq!(report.interrupted_by.as_deref(), Some("SIGINT"));
    assert_eq!(report.message().as_deref(), Some("exit with: SIGINT"));
    assert_eq!(log.terminated(), vec![1, 2]);
    assert_eq!(log.killed(), vec![2]);

    Ok(())
}

#[tokio::test]
async fn interrupt_during_interval_prevents_next_batch() -> TestResult {
    init_tracing();

    let spawner = FakeSpawner::new();
    let log = spawner.log();

    let (tx, rx) = signal::channel();
    let spec = BatchSpecBuilder::new()
        .count(4)
        .step(2)
        .interval(Duration::from_secs(60))
        .build();
    let run = tokio::spawn(Orchestrator::new(spec, fast_options(), spawner, rx).run());

    while log.waited().len() < 2 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    tx.send(Interrupt::new("SIGTERM")).await?;

    let report = with_timeout(run).await??;

    assert_eq!(report.exit_code, 1);
    assert_eq!(report.batches_launched, 1);
    assert_eq!(log.spawned(), vec![1, 2]);

    Ok(())
}

#[tokio::test]
async fn single_process_output_is_unprefixed() -> TestResult {
    init_tracing();

    let buffer = SharedBuffer::new();
    let spawner = FakeSpawner::new().with_output(OutputMux::new(buffer.clone(), false));
    let report = with_timeout(run_with(spawner, BatchSpecBuilder::new().count(1))).await?;
    assert_eq!(report.exit_code, 0);
    assert_eq!(buffer.contents(), "started\n");

    let buffer = SharedBuffer::new();
    let spawner = FakeSpawner::new().with_output(OutputMux::new(buffer.clone(), false));
    with_timeout(run_with(spawner, BatchSpecBuilder::new().count(2))).await?;
    assert_eq!(buffer.lines(), vec!["10001: started", "10002: started"]);

    Ok(())
}

#[tokio::test]
async fn interrupt_between_spawns_stops_the_launch() -> TestResult {
    init_tracing();

    let (tx, rx) = signal::channel();
    let spawner = FakeSpawner::new()
        .with_default(FakeScript::Hang)
        .interrupt_at(3, tx.clone());
    let log = spawner.log();

    let spec = BatchSpecBuilder::new().count(5).build();
    let report = with_timeout(Orchestrator::new(spec, fast_options(), spawner, rx).run()).await?;

    assert_eq!(log.spawned(), vec![1, 2, 3]);
    assert_eq!(log.terminated(), vec![1, 2, 3]);
    assert!(log.killed().is_empty());
    assert_eq!(report.exit_code, 1);
    assert_eq!(report.spawned, 3);
    assert_eq!(report.interrupted_by.as_deref(), Some("SIGINT"));

    Ok(())
}
