use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chore::collect::{BoxFuture, EnvSink, SourceTask, TaskContext};

/// Emits a fixed list of entries, then finishes.
pub struct StaticSource {
    name: &'static str,
    entries: Vec<(String, String)>,
    key: Option<&'static str>,
    runs: Arc<AtomicUsize>,
}

impl StaticSource {
    pub fn new(name: &'static str, entries: &[(&str, &str)]) -> Self {
        Self {
            name,
            entries: entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            key: None,
            runs: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Gate the whole source on `key`, like the built-in sources do.
    pub fn with_idempotency_key(mut self, key: &'static str) -> Self {
        self.key = Some(key);
        self
    }

    /// Shared counter of how many times `run` was entered.
    pub fn runs(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.runs)
    }
}

impl SourceTask for StaticSource {
    fn name(&self) -> &'static str {
        self.name
    }

    fn idempotency_key(&self) -> Option<&'static str> {
        self.key
    }

    fn run<'a>(&'a self, _ctx: &'a TaskContext, sink: EnvSink) -> BoxFuture<'a, anyhow::Result<()>> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            sink.emit_all(self.entries.clone()).await;
            Ok(())
        })
    }
}

/// Sleeps for `delay` without watching the scope, then emits one entry.
///
/// Models a task stuck in blocking work that ignores cancellation.
pub struct SleepySource {
    pub delay: Duration,
    pub entry: (&'static str, &'static str),
}

impl SourceTask for SleepySource {
    fn name(&self) -> &'static str {
        "sleepy"
    }

    fn run<'a>(&'a self, _ctx: &'a TaskContext, sink: EnvSink) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            tokio::time::sleep(self.delay).await;
            sink.emit(self.entry.0, self.entry.1).await;
            Ok(())
        })
    }
}

/// Never emits and never finishes on its own; only cancellation or abort
/// ends it.
pub struct SilentSource;

impl SourceTask for SilentSource {
    fn name(&self) -> &'static str {
        "silent"
    }

    fn run<'a>(&'a self, _ctx: &'a TaskContext, _sink: EnvSink) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(std::future::pending::<anyhow::Result<()>>())
    }
}

/// Panics as soon as it runs.
pub struct PanickingSource;

impl SourceTask for PanickingSource {
    fn name(&self) -> &'static str {
        "panicking"
    }

    fn run<'a>(&'a self, _ctx: &'a TaskContext, _sink: EnvSink) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async { blow_up() })
    }
}

fn blow_up() -> anyhow::Result<()> {
    panic!("source blew up")
}

/// Fails without emitting anything.
pub struct FailingSource;

impl SourceTask for FailingSource {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn run<'a>(&'a self, _ctx: &'a TaskContext, _sink: EnvSink) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async { Err(anyhow::anyhow!("lookup failed")) })
    }
}
