// src/collect/task.rs

//! The source task abstraction.
//!
//! The collector talks to `SourceTask` trait objects, so tests can plug in
//! fake tasks (slow ones, panicking ones, silent ones) next to the real
//! sources in [`crate::collect::sources`].

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::collect::registry::Registry;
use crate::environ::{EnvironmentEntry, ParentEnv};
use crate::identity::{ParsedArguments, ScriptIdentity};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A self-contained unit of context gathering.
///
/// Contract:
/// - never block past cancellation of `ctx.cancel`;
/// - report failures through the returned `Result` (the collector logs
///   them and drops them, nothing reaches the script);
/// - check every variable it produces against `ctx.parent_env` *before*
///   doing any work for it.
pub trait SourceTask: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Variable whose presence in the parent environment makes the whole
    /// task a no-op. Checked by the collector before the task is started.
    fn idempotency_key(&self) -> Option<&'static str> {
        None
    }

    fn run<'a>(&'a self, ctx: &'a TaskContext, sink: EnvSink) -> BoxFuture<'a, anyhow::Result<()>>;
}

/// Read-only inputs shared by all tasks of one collection.
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub identity: ScriptIdentity,
    pub args: ParsedArguments,
    pub parent_env: ParentEnv,
    /// Single instant all time-derived values are computed from.
    pub started_at: DateTime<Utc>,
    pub registry: Arc<Registry>,
    pub cancel: CancellationToken,
}

impl TaskContext {
    pub fn new(
        identity: ScriptIdentity,
        args: ParsedArguments,
        parent_env: ParentEnv,
        registry: Arc<Registry>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            identity,
            args,
            parent_env,
            started_at: Utc::now(),
            registry,
            cancel,
        }
    }

    /// Idempotency check: is `name` already provided by the parent?
    pub fn is_set(&self, name: &str) -> bool {
        self.parent_env.is_set(name)
    }

    /// Run `fut` unless the scope ends first. `None` means cancelled.
    pub async fn until_cancelled<F>(&self, fut: F) -> Option<F::Output>
    where
        F: Future,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            out = fut => Some(out),
        }
    }
}

/// Write side of the collection queue.
///
/// Cheap to clone; every task gets its own copy. Sending is
/// cancellation-aware: it completes when the entry is accepted or when the
/// scope ends, whichever comes first, so a producer can never block forever.
#[derive(Debug, Clone)]
pub struct EnvSink {
    tx: mpsc::Sender<EnvironmentEntry>,
    cancel: CancellationToken,
}

impl EnvSink {
    pub fn new(tx: mpsc::Sender<EnvironmentEntry>, cancel: CancellationToken) -> Self {
        Self { tx, cancel }
    }

    /// Emit one entry. Empty values are silently dropped.
    ///
    /// Returns `false` if the entry could not be delivered (scope ended or
    /// the collector went away).
    pub async fn emit(&self, name: impl Into<String>, value: impl Into<String>) -> bool {
        let Some(entry) = EnvironmentEntry::new(name, value) else {
            return true;
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            sent = self.tx.send(entry) => sent.is_ok(),
        }
    }

    /// Emit several entries, stopping at the first one that cannot be
    /// delivered.
    pub async fn emit_all<I, K, V>(&self, entries: I) -> bool
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (name, value) in entries {
            if !self.emit(name, value).await {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn emit_drops_empty_values() {
        let (tx, mut rx) = mpsc::channel(4);
        let sink = EnvSink::new(tx, CancellationToken::new());

        assert!(sink.emit("A", "").await);
        assert!(sink.emit("B", "1").await);
        drop(sink);

        let got = rx.recv().await.unwrap();
        assert_eq!(got.name(), "B");
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn emit_on_full_queue_returns_when_cancelled() {
        let (tx, _rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        let sink = EnvSink::new(tx, cancel.clone());

        assert!(sink.emit("A", "1").await);

        let blocked = tokio::spawn({
            let sink = sink.clone();
            async move { sink.emit("B", "2").await }
        });
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        cancel.cancel();

        let delivered = tokio::time::timeout(std::time::Duration::from_secs(1), blocked)
            .await
            .expect("emit must return once the scope ends")
            .unwrap();
        assert!(!delivered);
    }
}
