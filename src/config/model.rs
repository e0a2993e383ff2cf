// src/config/model.rs

use serde::Deserialize;

use crate::types::{ColorMode, RemainderOrder};

/// Optional defaults as read from a TOML file.
///
/// ```toml
/// [batch]
/// cmd = "sh -c 'echo hello; sleep 1'"
/// count = 6
/// step = 2
/// interval = 0.5
/// fail_fast = false
/// remainder = "last"
///
/// [process]
/// poll_interval_ms = 20
/// grace_period_ms = 100
///
/// [output]
/// color = "never"
/// ```
///
/// Every key is optional; command-line flags win over file values.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub batch: BatchSection,

    #[serde(default)]
    pub process: ProcessSection,

    #[serde(default)]
    pub output: OutputSection,
}

/// `[batch]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BatchSection {
    /// Used when no command is given on the command line.
    pub cmd: Option<CommandLine>,
    pub count: Option<i64>,
    pub step: Option<i64>,
    pub interval: Option<f64>,
    pub fail_fast: Option<bool>,
    pub remainder: Option<RemainderOrder>,
}

/// `[process]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProcessSection {
    pub poll_interval_ms: Option<u64>,
    pub grace_period_ms: Option<u64>,
}

/// `[output]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputSection {
    pub color: Option<ColorMode>,
}

/// A command given either as one shell-style string or as an argv array.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum CommandLine {
    Line(String),
    Argv(Vec<String>),
}
