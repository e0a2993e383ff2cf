// src/config/loader.rs

use std::fs;
use std::path::Path;

use crate::config::model::ConfigFile;
use crate::errors::{Result, XbatchError};

/// Load a configuration file from a given path.
///
/// This only performs TOML deserialization; values are checked when they are
/// merged with the command line in [`crate::config::resolve`].
pub fn load_from_path(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|e| {
        XbatchError::Config(format!("cannot read config file {}: {e}", path.display()))
    })?;

    let config: ConfigFile = toml::from_str(&contents)?;

    Ok(config)
}
