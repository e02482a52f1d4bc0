// src/supervise/platform.rs

//! Per-OS signal capability table.
//!
//! Relayable signals exclude the uncatchable ones (`KILL`, `STOP`), the
//! synchronous fault signals, job-control stops, `CHLD`, and the shutdown
//! triggers, which go through graceful shutdown instead.

use nix::sys::signal::Signal;

#[cfg(target_os = "linux")]
const RELAYABLE: &[Signal] = &[
    Signal::SIGHUP,
    Signal::SIGUSR1,
    Signal::SIGUSR2,
    Signal::SIGWINCH,
    Signal::SIGALRM,
    Signal::SIGCONT,
    Signal::SIGURG,
    Signal::SIGVTALRM,
    Signal::SIGPROF,
    Signal::SIGXCPU,
    Signal::SIGXFSZ,
    Signal::SIGIO,
    Signal::SIGPWR,
];

#[cfg(target_os = "macos")]
const RELAYABLE: &[Signal] = &[
    Signal::SIGHUP,
    Signal::SIGUSR1,
    Signal::SIGUSR2,
    Signal::SIGWINCH,
    Signal::SIGALRM,
    Signal::SIGCONT,
    Signal::SIGURG,
    Signal::SIGVTALRM,
    Signal::SIGPROF,
    Signal::SIGXCPU,
    Signal::SIGXFSZ,
    Signal::SIGIO,
    Signal::SIGINFO,
];

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
const RELAYABLE: &[Signal] = &[
    Signal::SIGHUP,
    Signal::SIGUSR1,
    Signal::SIGUSR2,
    Signal::SIGWINCH,
    Signal::SIGALRM,
    Signal::SIGCONT,
];

const SHUTDOWN: &[Signal] = &[Signal::SIGINT, Signal::SIGTERM, Signal::SIGQUIT];

/// Signals forwarded verbatim to the child.
pub fn relayable_signals() -> &'static [Signal] {
    RELAYABLE
}

/// Signals that end the top-level scope instead of being relayed.
pub fn shutdown_signals() -> &'static [Signal] {
    SHUTDOWN
}

/// First, cooperative escalation step.
pub fn interrupt_signal() -> Signal {
    Signal::SIGINT
}

/// Second, forceful escalation step.
pub fn kill_signal() -> Signal {
    Signal::SIGKILL
}
