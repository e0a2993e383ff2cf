use std::error::Error;
use std::io::Write;
use std::time::Duration;

use clap::Parser;
use tempfile::NamedTempFile;
use tracing::Level;

use xbatch::cli::{CliArgs, LogLevel};
use xbatch::config::{CommandLine, load_from_path, resolve};
use xbatch::errors::XbatchError;
use xbatch::logging::resolve_level;
use xbatch::types::{ColorMode, RemainderOrder};

type TestResult = Result<(), Box<dyn Error>>;

fn args(argv: &[&str]) -> CliArgs {
    CliArgs::try_parse_from(std::iter::once("xbatch").chain(argv.iter().copied()))
        .expect("valid command line")
}

#[test]
fn defaults_apply_when_nothing_is_given() -> TestResult {
    let settings = resolve(&args(&["echo", "hello", "world"]), None)?;

    assert_eq!(settings.spec.command.argv(), &["echo", "hello", "world"]);
    assert_eq!(settings.spec.total_count, 2);
    assert_eq!(settings.spec.step, 1);
    assert_eq!(settings.spec.interval, Duration::from_secs(1));
    assert!(settings.spec.fail_fast);
    assert_eq!(settings.spec.remainder, RemainderOrder::First);
    assert_eq!(settings.options.poll_interval, Duration::from_millis(20));
    assert_eq!(settings.options.grace_period, Duration::from_millis(10));
    assert_eq!(settings.color, ColorMode::Auto);
    Ok(())
}

#[test]
fn single_argument_is_shell_split() -> TestResult {
    let settings = resolve(&args(&["-c", "5", "sh -c 'echo hello; sleep 1; echo world'"]), None)?;

    assert_eq!(
        settings.spec.command.argv(),
        &["sh", "-c", "echo hello; sleep 1; echo world"]
    );
    assert_eq!(settings.spec.total_count, 5);
    Ok(())
}

#[test]
fn arguments_after_double_dash_are_literal() -> TestResult {
    let settings = resolve(
        &args(&["-c", "7", "-s", "3", "--", "sh", "-c", "echo hello; echo world"]),
        None,
    )?;

    assert_eq!(settings.spec.command.program(), "sh");
    assert_eq!(settings.spec.command.args(), &["-c", "echo hello; echo world"]);
    assert_eq!(settings.spec.step, 3);
    Ok(())
}

#[test]
fn fail_fast_flags_last_one_wins() -> TestResult {
    let settings = resolve(&args(&["--no-fail-fast", "true"]), None)?;
    assert!(!settings.spec.fail_fast);

    let settings = resolve(&args(&["--no-fail-fast", "--fail-fast", "true"]), None)?;
    assert!(settings.spec.fail_fast);

    let settings = resolve(&args(&["--err-exit", "true"]), None)?;
    assert!(settings.spec.fail_fast);
    Ok(())
}

#[test]
fn zero_or_negative_count_is_a_validation_error() {
    for count in ["0", "-3"] {
        match resolve(&args(&["-c", count, "true"]), None) {
            Err(XbatchError::Validation(msg)) => assert_eq!(msg, "count must be greater than 0"),
            other => panic!("Expected Validation error, got: {:?}", other),
        }
    }
}

#[test]
fn missing_command_is_a_validation_error() {
    match resolve(&args(&["-c", "3"]), None) {
        Err(XbatchError::Validation(msg)) => assert!(msg.contains("[CMD]... is required")),
        other => panic!("Expected Validation error, got: {:?}", other),
    }
}

#[test]
fn unbalanced_quotes_are_a_validation_error() {
    let result = resolve(&args(&["sh -c 'echo"]), None);
    assert!(matches!(result, Err(XbatchError::Validation(_))));
}

#[test]
fn bad_step_and_interval_are_rejected() {
    assert!(matches!(
        resolve(&args(&["-s", "0", "true"]), None),
        Err(XbatchError::Validation(_))
    ));
    assert!(matches!(
        resolve(&args(&["-i", "-1.5", "true"]), None),
        Err(XbatchError::Validation(_))
    ));
}

#[test]
fn config_file_supplies_defaults_and_cli_overrides_them() -> TestResult {
    let mut file = NamedTempFile::new()?;
    write!(
        file,
        r#"
[batch]
cmd = "sh -c 'echo from-file'"
count = 6
step = 2
interval = 0.25
fail_fast = false
remainder = "last"

[process]
poll_interval_ms = 50
grace_period_ms = 200

[output]
color = "never"
"#
    )?;

    let cfg = load_from_path(file.path())?;
    assert_eq!(
        cfg.batch.cmd,
        Some(CommandLine::Line("sh -c 'echo from-file'".to_string()))
    );

    let settings = resolve(&args(&[]), Some(&cfg))?;
    assert_eq!(settings.spec.command.argv(), &["sh", "-c", "echo from-file"]);
    assert_eq!(settings.spec.total_count, 6);
    assert_eq!(settings.spec.step, 2);
    assert_eq!(settings.spec.interval, Duration::from_millis(250));
    assert!(!settings.spec.fail_fast);
    assert_eq!(settings.spec.remainder, RemainderOrder::Last);
    assert_eq!(settings.options.poll_interval, Duration::from_millis(50));
    assert_eq!(settings.options.grace_period, Duration::from_millis(200));
    assert_eq!(settings.color, ColorMode::Never);

    let settings = resolve(&args(&["-c", "3", "--fail-fast", "echo", "cli"]), Some(&cfg))?;
    assert_eq!(settings.spec.command.argv(), &["echo", "cli"]);
    assert_eq!(settings.spec.total_count, 3);
    assert!(settings.spec.fail_fast);
    assert_eq!(settings.spec.step, 2);
    Ok(())
}

#[test]
fn config_file_accepts_argv_commands() -> TestResult {
    let mut file = NamedTempFile::new()?;
    write!(file, "[batch]\ncmd = [\"echo\", \"a b\"]\n")?;

    let cfg = load_from_path(file.path())?;
    let settings = resolve(&args(&[]), Some(&cfg))?;
    assert_eq!(settings.spec.command.argv(), &["echo", "a b"]);
    Ok(())
}

#[test]
fn unknown_config_keys_are_rejected() -> TestResult {
    let mut file = NamedTempFile::new()?;
    write!(file, "[batch]\ncounts = 3\n")?;

    match load_from_path(file.path()) {
        Err(XbatchError::Toml(_)) => Ok(()),
        other => panic!("Expected Toml error, got: {:?}", other),
    }
}

#[test]
fn remainder_order_comes_from_the_command_line() -> TestResult {
    let settings = resolve(&args(&["--remainder", "last", "-c", "7", "-s", "3", "true"]), None)?;
    assert_eq!(settings.spec.remainder, RemainderOrder::Last);

    assert!(CliArgs::try_parse_from(["xbatch", "--remainder", "middle", "true"]).is_err());
    Ok(())
}

#[test]
fn log_level_priority() {
    assert_eq!(resolve_level(Some(LogLevel::Debug), Some("error")), Level::DEBUG);
    assert_eq!(resolve_level(None, Some("info")), Level::INFO);
    assert_eq!(resolve_level(None, Some("nonsense")), Level::WARN);
    assert_eq!(resolve_level(None, None), Level::WARN);
}

#[test]
fn missing_config_file_is_a_config_error() -> TestResult {
    let dir = tempfile::tempdir()?;

    match load_from_path(dir.path().join("absent.toml")) {
        Err(XbatchError::Config(msg)) => assert!(msg.contains("absent.toml"), "{msg}"),
        other => panic!("Expected Config error, got: {:?}", other),
    }
    Ok(())
}
