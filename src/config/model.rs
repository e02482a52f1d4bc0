// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::supervise::ShutdownPolicy;
use crate::types::GitAccessMode;

/// Per-script configuration as read from a TOML file.
///
/// ```toml
/// network = true
/// git = "always"
/// timeout = "30s"
///
/// [sources]
/// machine_id = false
///
/// [shutdown]
/// grace = "5s"
/// poll = "50ms"
/// ```
///
/// Every section is optional; an empty file is a valid config.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawScriptConfig {
    /// Opt-in for the geo-IP lookups.
    #[serde(default)]
    pub network: bool,

    /// Git access mode.
    #[serde(default)]
    pub git: GitAccessMode,

    /// Optional overall deadline for the whole invocation (e.g. `"30s"`).
    #[serde(default)]
    pub timeout: Option<String>,

    #[serde(default)]
    pub sources: SourcesSection,

    #[serde(default)]
    pub shutdown: ShutdownSection,
}

/// `[sources]` section: each context source can be switched off on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourcesSection {
    pub time: bool,
    pub ids: bool,
    pub machine_id: bool,
    pub os: bool,
    pub hostname: bool,
    pub user: bool,
    pub recursion: bool,
    pub arguments: bool,
    pub temp_dir: bool,
}

impl Default for SourcesSection {
    fn default() -> Self {
        Self {
            time: true,
            ids: true,
            machine_id: true,
            os: true,
            hostname: true,
            user: true,
            recursion: true,
            arguments: true,
            temp_dir: true,
        }
    }
}

/// `[shutdown]` section, kept as strings until validation.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShutdownSection {
    #[serde(default = "default_grace")]
    pub grace: String,

    #[serde(default = "default_poll")]
    pub poll: String,
}

fn default_grace() -> String {
    "5s".to_string()
}

fn default_poll() -> String {
    "50ms".to_string()
}

impl Default for ShutdownSection {
    fn default() -> Self {
        Self {
            grace: default_grace(),
            poll: default_poll(),
        }
    }
}

/// Validated configuration handed to the rest of the crate.
///
/// Only constructible through `TryFrom<RawScriptConfig>` (see
/// [`crate::config::validate`]) or [`ScriptConfig::default`].
#[derive(Debug, Clone)]
pub struct ScriptConfig {
    pub network: bool,
    pub git: GitAccessMode,
    pub timeout: Option<Duration>,
    pub sources: SourcesSection,
    pub shutdown: ShutdownPolicy,
    /// Absolute path of the file this config was loaded from, if any.
    pub path: Option<PathBuf>,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            network: false,
            git: GitAccessMode::default(),
            timeout: None,
            sources: SourcesSection::default(),
            shutdown: ShutdownPolicy::default(),
            path: None,
        }
    }
}
