// src/config/mod.rs

//! Configuration loading and validation for xbatch.
//!
//! Responsibilities:
//! - Define the optional TOML-backed defaults (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Merge it with the command line and validate the result (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::load_from_path;
pub use model::{BatchSection, CommandLine, ConfigFile, OutputSection, ProcessSection};
pub use validate::{Settings, resolve, split_command};
