// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`backend`] defines the [`ProcessHandle`] / [`ProcessSpawner`] seam the
//!   orchestrator drives, plus the production [`OsSpawner`].
//! - [`process`] wraps one `tokio::process::Child` and its output reader.
//! - [`output`] serialises lines from many processes onto one sink.

pub mod backend;
pub mod output;
pub mod process;

pub use backend::{ExitState, OsSpawner, ProcessHandle, ProcessSpawner};
pub use output::OutputMux;
pub use process::OsProcess;
