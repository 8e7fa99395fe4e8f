//! Host-level settings for the extension.
//!
//! Mirrors the flat key space of an editor settings file. Only the
//! interpreter path is consulted here; unknown keys are carried along
//! untouched.

use serde_json::Value;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Settings key overriding the interpreter used to launch the server.
pub const PYTHONPATH_KEY: &str = "ffi_navigator.pythonpath";

/// Interpreter used when no override is configured.
pub const DEFAULT_INTERPRETER: &str = "python";

/// Errors from reading a settings file.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid settings JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("settings root must be a JSON object")]
    NotAnObject,
}

/// Flat key/value view of the host configuration.
#[derive(Debug, Clone, Default)]
pub struct HostSettings {
    values: HashMap<String, Value>,
}

impl HostSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses settings from a JSON object string.
    pub fn from_json_str(raw: &str) -> Result<Self, SettingsError> {
        let value: Value = serde_json::from_str(raw)?;
        match value {
            Value::Object(map) => Ok(Self {
                values: map.into_iter().collect(),
            }),
            _ => Err(SettingsError::NotAnObject),
        }
    }

    /// Loads settings from a JSON file.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let raw = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    /// Sets a value, replacing any previous one.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    /// Returns the string value for `key`, if present and a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    /// Resolves the interpreter command: the configured override wins over
    /// the default.
    pub fn interpreter(&self) -> &str {
        match self.values.get(PYTHONPATH_KEY) {
            Some(Value::String(path)) => path,
            Some(other) => {
                log::warn!(
                    "{} is not a string ({}), using {}",
                    PYTHONPATH_KEY,
                    other,
                    DEFAULT_INTERPRETER
                );
                DEFAULT_INTERPRETER
            }
            None => DEFAULT_INTERPRETER,
        }
    }
}
