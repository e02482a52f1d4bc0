// src/supervise/relay.rs

use std::fmt;

use nix::sys::signal::Signal;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::supervise::platform;
use crate::supervise::probe::ChildProbe;

/// Forwards relayable signals received by this process to the child.
///
/// Handlers are installed by [`SignalRelay::register`], before the relay
/// task runs, so nothing sent right after spawn is lost.
pub struct SignalRelay {
    probe: ChildProbe,
    listeners: Vec<(Signal, tokio::signal::unix::Signal)>,
}

impl fmt::Debug for SignalRelay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let signals: Vec<_> = self.listeners.iter().map(|(sig, _)| *sig).collect();
        f.debug_struct("SignalRelay")
            .field("probe", &self.probe)
            .field("signals", &signals)
            .finish()
    }
}

impl SignalRelay {
    /// Install handlers for every relayable signal. Signals the platform
    /// refuses are logged and skipped. Must be called inside a Tokio runtime.
    pub fn register(probe: ChildProbe) -> Self {
        let listeners = platform::relayable_signals()
            .iter()
            .filter_map(|&sig| match signal(SignalKind::from_raw(sig as i32)) {
                Ok(stream) => Some((sig, stream)),
                Err(err) => {
                    warn!(signal = ?sig, error = %err, "cannot listen for signal; it will not be relayed");
                    None
                }
            })
            .collect();

        Self { probe, listeners }
    }

    /// Relay until `scope` ends or the child is gone.
    pub async fn run(self, scope: CancellationToken) {
        let (tx, mut rx) = mpsc::channel::<Signal>(16);
        let mut forwarders = JoinSet::new();

        for (sig, mut stream) in self.listeners {
            let tx = tx.clone();
            let scope = scope.clone();
            forwarders.spawn(async move {
                loop {
                    tokio::select! {
                        biased;
                        _ = scope.cancelled() => break,
                        got = stream.recv() => match got {
                            Some(()) => {
                                if tx.send(sig).await.is_err() {
                                    break;
                                }
                            }
                            None => break,
                        },
                    }
                }
            });
        }
        drop(tx);

        let pid = self.probe.pid();
        loop {
            if !self.probe.is_alive() {
                debug!(pid = %pid, "child gone; signal relay stopping");
                break;
            }

            tokio::select! {
                biased;
                _ = scope.cancelled() => break,
                got = rx.recv() => match got {
                    Some(sig) => {
                        if self.probe.signal(sig) {
                            debug!(pid = %pid, signal = ?sig, "relayed signal to child");
                        }
                    }
                    None => break,
                },
            }
        }

        forwarders.abort_all();
        while forwarders.join_next().await.is_some() {}
    }
}
