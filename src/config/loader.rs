// src/config/loader.rs

use std::fs;
use std::path::Path;

use crate::config::model::{RawScriptConfig, ScriptConfig};
use crate::errors::Result;

/// Load a script configuration file and return the raw `RawScriptConfig`.
///
/// This only performs TOML deserialization; durations are not checked
/// here. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawScriptConfig> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawScriptConfig = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a script configuration and validate it.
///
/// A missing `path` (`None`) yields the defaults.
pub fn load_and_validate(path: Option<&Path>) -> Result<ScriptConfig> {
    match path {
        Some(path) => {
            let raw = load_from_path(path)?;
            let mut config = ScriptConfig::try_from(raw)?;
            config.path = Some(std::path::absolute(path)?);
            Ok(config)
        }
        None => Ok(ScriptConfig::default()),
    }
}
