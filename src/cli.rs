// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `chore`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "chore",
    version,
    about = "Run a script with a context-rich environment and supervise it.",
    long_about = None
)]
pub struct CliArgs {
    /// Namespace the script belongs to; scopes its data/cache/state dirs.
    #[arg(short, long, value_name = "NAME", default_value = "default")]
    pub namespace: String,

    /// Script parameter, `name=value`. Repeat to pass several values.
    #[arg(short = 'p', long = "param", value_name = "NAME=VALUE")]
    pub params: Vec<String>,

    /// Script flag, `name` or `name=<bool>`.
    #[arg(short = 'f', long = "flag", value_name = "NAME[=BOOL]")]
    pub flags: Vec<String>,

    /// Path to a TOML script config. Defaults apply when omitted.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `CHORE_LOG` or `warn` is used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Print the collected environment instead of running the script.
    #[arg(long)]
    pub print_env: bool,

    /// Script to run.
    #[arg(value_name = "SCRIPT")]
    pub script: PathBuf,

    /// Positional arguments for the script.
    #[arg(value_name = "ARGS", trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
