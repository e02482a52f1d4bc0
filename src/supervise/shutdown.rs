// src/supervise/shutdown.rs

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::supervise::platform;
use crate::supervise::probe::ChildProbe;

/// Interrupt-then-kill escalation timings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownPolicy {
    /// How long the child gets to exit after the interrupt.
    pub grace: Duration,
    /// Liveness poll interval during the grace window.
    pub poll: Duration,
}

impl Default for ShutdownPolicy {
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(5),
            poll: Duration::from_millis(50),
        }
    }
}

/// Two-phase shutdown of the child once the supervision scope ends.
#[derive(Debug)]
pub struct GracefulShutdown {
    probe: ChildProbe,
    policy: ShutdownPolicy,
}

impl GracefulShutdown {
    pub fn new(probe: ChildProbe, policy: ShutdownPolicy) -> Self {
        Self { probe, policy }
    }

    /// Wait for `scope` to end, then interrupt once, poll for up to the
    /// grace window, and kill once if the child is still there.
    ///
    /// Best effort: a child that survives the kill is not retried.
    pub async fn run(self, scope: CancellationToken) {
        scope.cancelled().await;

        let pid = self.probe.pid();
        if !self.probe.is_alive() {
            debug!(pid = %pid, "scope ended after child exit; nothing to shut down");
            return;
        }

        let interrupt = platform::interrupt_signal();
        info!(pid = %pid, signal = ?interrupt, "interrupting child");
        let started = Instant::now();
        if !self.probe.signal(interrupt) {
            return;
        }

        loop {
            if !self.probe.is_alive() {
                debug!(pid = %pid, elapsed = ?started.elapsed(), "child exited within grace window");
                return;
            }
            let elapsed = started.elapsed();
            if elapsed >= self.policy.grace {
                break;
            }
            tokio::time::sleep(self.policy.poll.min(self.policy.grace - elapsed)).await;
        }

        let kill = platform::kill_signal();
        warn!(pid = %pid, signal = ?kill, grace = ?self.policy.grace, "child ignored interrupt; killing");
        self.probe.signal(kill);
    }
}
