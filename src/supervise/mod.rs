// src/supervise/mod.rs

//! Child process supervision.
//!
//! [`ProcessSupervisor`] spawns the script and runs two sidecars next to
//! it: a [`SignalRelay`] forwarding relayable signals, and a
//! [`GracefulShutdown`] that escalates interrupt-then-kill once the scope
//! ends. The child is reaped only after both sidecars have stopped, so no
//! signal can reach a recycled pid.

pub mod platform;
pub mod probe;
pub mod process;
pub mod relay;
pub mod shutdown;

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::errors::Result;

pub use probe::ChildProbe;
pub use process::ProcessSupervisor;
pub use relay::SignalRelay;
pub use shutdown::{GracefulShutdown, ShutdownPolicy};

/// How a supervised child ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionResult {
    /// Exit status, or `128 + n` when killed by signal `n`.
    pub exit_code: i32,
    pub user_time: Duration,
    pub system_time: Duration,
    /// Wall time from spawn to exit.
    pub elapsed: Duration,
}

impl ExecutionResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Standard streams handed to the child.
///
/// Piped streams are only reachable through [`ProcessSupervisor`]'s
/// `take_*` methods; [`supervise`] closes them when it starts waiting.
#[derive(Debug)]
pub struct ChildStdio {
    pub stdin: Stdio,
    pub stdout: Stdio,
    pub stderr: Stdio,
}

impl ChildStdio {
    /// Share this process's stdin, stdout and stderr.
    pub fn inherit() -> Self {
        Self {
            stdin: Stdio::inherit(),
            stdout: Stdio::inherit(),
            stderr: Stdio::inherit(),
        }
    }
}

impl Default for ChildStdio {
    fn default() -> Self {
        Self::inherit()
    }
}

/// Run `path` with `args` and `environ` until it exits.
///
/// Ending `scope` while the child runs triggers graceful shutdown; the call
/// still returns the child's result once it is gone.
pub async fn supervise(
    scope: &CancellationToken,
    path: &Path,
    args: &[String],
    environ: Vec<String>,
    stdio: ChildStdio,
    policy: ShutdownPolicy,
) -> Result<ExecutionResult> {
    let mut supervisor = ProcessSupervisor::new(path, args.to_vec(), environ)
        .with_stdio(stdio)
        .with_shutdown_policy(policy);

    supervisor.start(scope)?;
    let pid = supervisor.pid();
    let result = supervisor.wait().await?;

    info!(
        pid,
        exit_code = result.exit_code,
        user_time = ?result.user_time,
        system_time = ?result.system_time,
        elapsed = ?result.elapsed,
        "child exited"
    );
    Ok(result)
}
