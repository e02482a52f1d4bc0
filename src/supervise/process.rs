// src/supervise/process.rs

use std::io;
use std::path::{Path, PathBuf};
use std::process::{ChildStderr, ChildStdin, ChildStdout, Command};
use std::time::Duration;

use nix::unistd::Pid;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::{ChoreError, Result};
use crate::supervise::probe::ChildProbe;
use crate::supervise::relay::SignalRelay;
use crate::supervise::shutdown::{GracefulShutdown, ShutdownPolicy};
use crate::supervise::{ChildStdio, ExecutionResult};

/// Owns one child process from spawn to reap.
#[derive(Debug)]
pub struct ProcessSupervisor {
    path: PathBuf,
    args: Vec<String>,
    environ: Vec<String>,
    stdio: Option<ChildStdio>,
    policy: ShutdownPolicy,
    running: Option<Running>,
}

#[derive(Debug)]
struct Running {
    probe: ChildProbe,
    started: Instant,
    waiter: JoinHandle<io::Result<Instant>>,
    sidecar_scope: CancellationToken,
    sidecars: JoinSet<()>,
    stdin: Option<ChildStdin>,
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
}

impl ProcessSupervisor {
    /// `environ` holds `NAME=VALUE` lines and becomes the child's whole
    /// environment.
    pub fn new(path: impl AsRef<Path>, args: Vec<String>, environ: Vec<String>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            args,
            environ,
            stdio: Some(ChildStdio::inherit()),
            policy: ShutdownPolicy::default(),
            running: None,
        }
    }

    pub fn with_stdio(mut self, stdio: ChildStdio) -> Self {
        self.stdio = Some(stdio);
        self
    }

    pub fn with_shutdown_policy(mut self, policy: ShutdownPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// OS pid of the child, 0 before start.
    pub fn pid(&self) -> u32 {
        self.running
            .as_ref()
            .map(|r| r.probe.pid().as_raw().unsigned_abs())
            .unwrap_or(0)
    }

    /// Write end of the child's stdin, if it was set up with `Stdio::piped()`.
    /// Left untaken, it is closed when `wait` starts.
    pub fn take_stdin(&mut self) -> Option<ChildStdin> {
        self.running.as_mut()?.stdin.take()
    }

    /// Read end of the child's stdout, if it was set up with `Stdio::piped()`.
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.running.as_mut()?.stdout.take()
    }

    /// Read end of the child's stderr, if it was set up with `Stdio::piped()`.
    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.running.as_mut()?.stderr.take()
    }

    /// Spawn the child and its two sidecars.
    ///
    /// The sidecars run against a child of `scope`: ending `scope` starts
    /// graceful shutdown, while the supervisor can stop its sidecars on its
    /// own without touching the caller's scope. Must be called inside a
    /// Tokio runtime.
    pub fn start(&mut self, scope: &CancellationToken) -> Result<()> {
        if self.running.is_some() {
            return Err(ChoreError::AlreadyStarted);
        }
        let stdio = self.stdio.take().ok_or(ChoreError::AlreadyStarted)?;

        let mut cmd = Command::new(&self.path);
        cmd.args(&self.args)
            .env_clear()
            .envs(self.environ.iter().filter_map(|line| line.split_once('=')))
            .stdin(stdio.stdin)
            .stdout(stdio.stdout)
            .stderr(stdio.stderr);

        let mut child = cmd.spawn().map_err(|source| ChoreError::SpawnError {
            path: self.path.clone(),
            source,
        })?;
        let started = Instant::now();

        let raw_pid = i32::try_from(child.id()).map_err(|_| {
            ChoreError::Other(anyhow::anyhow!("pid {} out of range", child.id()))
        })?;
        // The std handle is never waited on; reaping is done by pid below.
        let (stdin, stdout, stderr) = (child.stdin.take(), child.stdout.take(), child.stderr.take());
        drop(child);

        let pid = Pid::from_raw(raw_pid);
        let probe = ChildProbe::new(pid);
        info!(pid = raw_pid, path = ?self.path, "child started");

        let waiter = {
            let probe = probe.clone();
            tokio::task::spawn_blocking(move || {
                let res = wait_for_exit(pid);
                let exited_at = Instant::now();
                probe.mark_exited();
                res.map(|()| exited_at)
            })
        };

        let sidecar_scope = scope.child_token();
        let mut sidecars = JoinSet::new();
        sidecars.spawn(SignalRelay::register(probe.clone()).run(sidecar_scope.clone()));
        sidecars.spawn(GracefulShutdown::new(probe.clone(), self.policy).run(sidecar_scope.clone()));

        self.running = Some(Running {
            probe,
            started,
            waiter,
            sidecar_scope,
            sidecars,
            stdin,
            stdout,
            stderr,
        });
        Ok(())
    }

    /// Block until the child exits, stop both sidecars, reap the child and
    /// report how it went. A non-zero exit is a result, not an error.
    pub async fn wait(&mut self) -> Result<ExecutionResult> {
        let Running {
            probe,
            started,
            waiter,
            sidecar_scope,
            mut sidecars,
            stdin,
            stdout: _stdout,
            stderr: _stderr,
        } = self.running.take().ok_or(ChoreError::NotStarted)?;
        drop(stdin);

        let exited = waiter.await;

        sidecar_scope.cancel();
        while let Some(joined) = sidecars.join_next().await {
            if let Err(err) = joined {
                warn!(error = %err, "supervisor sidecar failed");
            }
        }

        let exited_at = exited.map_err(|err| ChoreError::Other(err.into()))??;

        let pid = probe.pid();
        let (status, usage) = tokio::task::spawn_blocking(move || reap(pid))
            .await
            .map_err(|err| ChoreError::Other(err.into()))??;

        let result = ExecutionResult {
            exit_code: exit_code(status),
            user_time: timeval_duration(usage.ru_utime),
            system_time: timeval_duration(usage.ru_stime),
            elapsed: exited_at.saturating_duration_since(started),
        };
        debug!(pid = %pid, ?result, "child reaped");
        Ok(result)
    }
}

/// Block until `pid` has exited, leaving it unreaped.
fn wait_for_exit(pid: Pid) -> io::Result<()> {
    loop {
        // SAFETY: siginfo_t is plain data; waitid only writes into it.
        let mut info: libc::siginfo_t = unsafe { std::mem::zeroed() };
        // SAFETY: `info` is a valid, writable siginfo_t.
        let rc = unsafe {
            libc::waitid(
                libc::P_PID,
                pid.as_raw() as libc::id_t,
                &mut info,
                libc::WEXITED | libc::WNOWAIT,
            )
        };
        if rc == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

/// Reap an exited child, returning its wait status and resource usage.
fn reap(pid: Pid) -> io::Result<(libc::c_int, libc::rusage)> {
    let mut status: libc::c_int = 0;
    // SAFETY: rusage is plain data; wait4 only writes into it.
    let mut usage: libc::rusage = unsafe { std::mem::zeroed() };
    loop {
        // SAFETY: both out-pointers are valid for writes.
        let rc = unsafe { libc::wait4(pid.as_raw(), &mut status, 0, &mut usage) };
        if rc == pid.as_raw() {
            return Ok((status, usage));
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

/// Exit code for a wait status; death by signal `n` maps to `128 + n`.
pub(crate) fn exit_code(status: libc::c_int) -> i32 {
    if libc::WIFEXITED(status) {
        libc::WEXITSTATUS(status)
    } else if libc::WIFSIGNALED(status) {
        128 + libc::WTERMSIG(status)
    } else {
        // Stopped/continued are never reported without WUNTRACED/WCONTINUED.
        128
    }
}

fn timeval_duration(tv: libc::timeval) -> Duration {
    let secs = u64::try_from(tv.tv_sec).unwrap_or(0);
    let micros = u32::try_from(tv.tv_usec).unwrap_or(0);
    Duration::from_secs(secs) + Duration::from_micros(u64::from(micros))
}
