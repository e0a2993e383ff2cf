// src/types.rs

use clap::ValueEnum;
use serde::Deserialize;

/// Where the remainder batch (`count % step` processes) goes in the schedule.
///
/// - `First`: run the remainder before the stepped batches (default).
/// - `Last`: run the stepped batches first and the remainder at the end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RemainderOrder {
    First,
    Last,
}

impl Default for RemainderOrder {
    fn default() -> Self {
        RemainderOrder::First
    }
}

/// Whether child output gets coloured markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    /// Colour only when stdout is a terminal and `NO_COLOR` is unset.
    Auto,
    Always,
    Never,
}

impl Default for ColorMode {
    fn default() -> Self {
        ColorMode::Auto
    }
}

impl ColorMode {
    /// Resolve the mode against the current environment.
    pub fn enabled(self) -> bool {
        use std::io::IsTerminal;

        match self {
            ColorMode::Always => true,
            ColorMode::Never => false,
            ColorMode::Auto => {
                std::env::var_os("NO_COLOR").is_none() && std::io::stdout().is_terminal()
            }
        }
    }
}
