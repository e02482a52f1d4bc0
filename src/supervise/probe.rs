// src/supervise/probe.rs

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tracing::{debug, warn};

/// Shared view of the child used by both sidecars.
///
/// `exited` is flipped by the waiter as soon as the OS reports the exit.
/// The pid stays a zombie (and therefore cannot be reused) until the
/// supervisor reaps it after both sidecars are stopped.
#[derive(Debug, Clone)]
pub struct ChildProbe {
    pid: Pid,
    exited: Arc<AtomicBool>,
}

impl ChildProbe {
    pub fn new(pid: Pid) -> Self {
        Self {
            pid,
            exited: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub(crate) fn mark_exited(&self) {
        self.exited.store(true, Ordering::Release);
    }

    /// Liveness probe: the exit flag first, then signal 0.
    pub fn is_alive(&self) -> bool {
        if self.exited.load(Ordering::Acquire) {
            return false;
        }
        match signal::kill(self.pid, None) {
            Ok(()) => true,
            // Exists but belongs to someone else; still alive.
            Err(Errno::EPERM) => true,
            Err(_) => false,
        }
    }

    /// Send `sig` if the child is alive. A child that disappears in between
    /// counts as already dead. Returns whether the signal was delivered.
    pub fn signal(&self, sig: Signal) -> bool {
        if !self.is_alive() {
            return false;
        }
        match signal::kill(self.pid, sig) {
            Ok(()) => true,
            Err(Errno::ESRCH) => {
                debug!(pid = %self.pid, signal = ?sig, "child already gone");
                false
            }
            Err(err) => {
                warn!(pid = %self.pid, signal = ?sig, error = %err, "failed to signal child");
                false
            }
        }
    }
}
