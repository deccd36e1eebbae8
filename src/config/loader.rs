// src/config/loader.rs

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{BuilddagError, Result};

/// Read and deserialize a config file, without semantic checks.
///
/// A missing file is reported as a configuration error naming the path;
/// other IO failures pass through as [`BuilddagError::IoError`].
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(BuilddagError::ConfigError(format!(
                "config file {:?} not found (pass --config PATH)",
                path
            )));
        }
        Err(e) => return Err(e.into()),
    };
    debug!(path = ?path, bytes = contents.len(), "read config file");
    load_from_str(&contents)
}

pub fn load_from_str(contents: &str) -> Result<RawConfigFile> {
    Ok(toml::from_str(contents)?)
}

/// Read, deserialize and validate a config file.
///
/// Validation rejects:
/// - unknown or self `after` references and dependency cycles,
/// - invalid globs, durations and naming templates,
/// - output patterns declared by more than one task.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    ConfigFile::try_from(load_from_path(path)?)
}

/// `Builddag.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Builddag.toml")
}
