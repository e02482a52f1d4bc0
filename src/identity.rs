// src/identity.rs

//! Static per-invocation inputs: which script runs, where its directories
//! are, and which (already validated) arguments it got.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::errors::{ChoreError, Result};

/// Who is being run. Read-only once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptIdentity {
    pub namespace: String,
    /// File name of the script (what scripts see as `CHORE_CALLER`).
    pub executable: String,
    /// Absolute path of the script.
    pub path: PathBuf,
    pub data_path: PathBuf,
    pub cache_path: PathBuf,
    pub state_path: PathBuf,
    pub runtime_path: PathBuf,
}

impl ScriptIdentity {
    /// Build an identity with XDG-style directories:
    /// `<base>/chore/<namespace>/<executable>` for data, cache and state,
    /// and `<runtime>/chore/<namespace>` for runtime files.
    ///
    /// `lookup` resolves environment variables; `main` passes the real
    /// process environment, tests pass a map.
    pub fn with_default_layout<F>(namespace: &str, path: &Path, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = std::path::absolute(path)?;
        let executable = path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .ok_or_else(|| {
                ChoreError::ConfigError(format!("script path {path:?} has no file name"))
            })?;

        let home = lookup("HOME").map(PathBuf::from).unwrap_or_else(std::env::temp_dir);
        let base = |var: &str, fallback: &[&str]| -> PathBuf {
            lookup(var)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| fallback.iter().fold(home.clone(), |acc, p| acc.join(p)))
        };
        let scoped = |root: PathBuf| root.join("chore").join(namespace).join(&executable);

        let runtime_root = lookup("XDG_RUNTIME_DIR")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(std::env::temp_dir);

        Ok(Self {
            namespace: namespace.to_string(),
            data_path: scoped(base("XDG_DATA_HOME", &[".local", "share"])),
            cache_path: scoped(base("XDG_CACHE_HOME", &[".cache"])),
            state_path: scoped(base("XDG_STATE_HOME", &[".local", "state"])),
            runtime_path: runtime_root.join("chore").join(namespace),
            executable,
            path,
        })
    }
}

/// Already validated script arguments.
///
/// Maps are ordered so that anything derived from them (checksums, the
/// recursion command line) is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedArguments {
    pub parameters: BTreeMap<String, Vec<String>>,
    pub flags: BTreeMap<String, bool>,
    pub positional: Vec<String>,
}

impl ParsedArguments {
    /// Parse a `name=value` parameter; repeated names accumulate values.
    pub fn add_parameter(&mut self, raw: &str) -> Result<()> {
        let (name, value) = raw.split_once('=').ok_or_else(|| {
            ChoreError::ConfigError(format!("parameter {raw:?} must look like name=value"))
        })?;
        let name = name.trim();
        if name.is_empty() {
            return Err(ChoreError::ConfigError(format!(
                "parameter {raw:?} has an empty name"
            )));
        }
        self.parameters
            .entry(name.to_string())
            .or_default()
            .push(value.to_string());
        Ok(())
    }

    /// Parse a `name` or `name=<bool>` flag.
    pub fn add_flag(&mut self, raw: &str) -> Result<()> {
        let (name, value) = match raw.split_once('=') {
            Some((name, value)) => {
                let value = match value.trim().to_lowercase().as_str() {
                    "true" | "yes" | "1" => true,
                    "false" | "no" | "0" => false,
                    other => {
                        return Err(ChoreError::ConfigError(format!(
                            "flag {name:?} has a non-boolean value {other:?}"
                        )));
                    }
                };
                (name.trim(), value)
            }
            None => (raw.trim(), true),
        };
        if name.is_empty() {
            return Err(ChoreError::ConfigError("flag with an empty name".to_string()));
        }
        self.flags.insert(name.to_string(), value);
        Ok(())
    }
}
