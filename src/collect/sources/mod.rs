// src/collect/sources/mod.rs

//! Built-in source tasks.
//!
//! Each file holds one family of facts. All of them follow the
//! [`SourceTask`](crate::collect::SourceTask) contract: check the parent
//! environment first, respect cancellation, report failures instead of
//! panicking.

pub mod arguments;
pub mod git;
pub mod hostname;
pub mod ids;
pub mod machine;
pub mod network;
pub mod os;
pub mod recursion;
pub mod temp_dir;
pub mod time;
pub mod user;

use std::ffi::OsStr;
use std::process::Stdio;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tokio::process::Command;

use crate::collect::task::{SourceTask, TaskContext};
use crate::config::ScriptConfig;

pub use arguments::ArgumentsSource;
pub use git::GitSource;
pub use hostname::HostnameSource;
pub use ids::IdsSource;
pub use machine::MachineIdSource;
pub use network::{Ipv4GeoSource, Ipv6Source};
pub use os::OsSource;
pub use recursion::RecursionSource;
pub use temp_dir::TempDirSource;
pub use time::TimeSource;
pub use user::UserSource;

/// The built-in sources enabled by `config`.
pub fn default_sources(config: &ScriptConfig) -> Vec<Arc<dyn SourceTask>> {
    let toggles = &config.sources;
    let mut tasks: Vec<Arc<dyn SourceTask>> = Vec::new();

    if toggles.time {
        tasks.push(Arc::new(TimeSource));
    }
    if toggles.ids {
        tasks.push(Arc::new(IdsSource));
    }
    if toggles.machine_id {
        tasks.push(Arc::new(MachineIdSource));
    }
    if toggles.os {
        tasks.push(Arc::new(OsSource));
    }
    tasks.push(Arc::new(GitSource::new(config.git)));
    if toggles.hostname {
        tasks.push(Arc::new(HostnameSource));
    }
    if toggles.user {
        tasks.push(Arc::new(UserSource));
    }
    if toggles.recursion {
        tasks.push(Arc::new(RecursionSource::new(config.path.clone())));
    }
    if toggles.arguments {
        tasks.push(Arc::new(ArgumentsSource));
    }
    if toggles.temp_dir {
        tasks.push(Arc::new(TempDirSource));
    }
    if config.network {
        tasks.push(Arc::new(Ipv4GeoSource::default()));
        tasks.push(Arc::new(Ipv6Source::default()));
    }

    tasks
}

/// Run a helper command and return its trimmed stdout.
///
/// The process is killed if the scope ends first. A non-zero exit status
/// is an error.
pub(crate) async fn command_output<I, S>(ctx: &TaskContext, program: &str, args: I) -> Result<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    let child = cmd
        .spawn()
        .with_context(|| format!("spawning helper command '{program}'"))?;

    let output = match ctx.until_cancelled(child.wait_with_output()).await {
        Some(output) => output.with_context(|| format!("waiting for helper command '{program}'"))?,
        None => bail!("cancelled while running '{program}'"),
    };

    if !output.status.success() {
        bail!("'{program}' exited with {}", output.status);
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
