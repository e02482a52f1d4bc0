// src/collect/collector.rs

//! Fan-out / fan-in of source tasks.

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::collect::registry::Registry;
use crate::collect::sources;
use crate::collect::task::{EnvSink, SourceTask, TaskContext};
use crate::config::ScriptConfig;
use crate::environ::{self, EnvironmentEntry, ParentEnv};
use crate::identity::{ParsedArguments, ScriptIdentity};

/// Default capacity of the fan-in queue.
const QUEUE_CAPACITY: usize = 64;

/// Runs a set of [`SourceTask`]s concurrently and merges their output.
///
/// Every task is spawned as its own Tokio task holding a clone of the
/// [`EnvSink`]. A [`JoinSet`] is the completion barrier; a single closer
/// task waits on it (or aborts it when the scope ends) and then drops the
/// last sender, which closes the queue. The caller drains the queue until
/// it is closed.
pub struct EnvironmentCollector {
    tasks: Vec<Arc<dyn SourceTask>>,
    queue_capacity: usize,
}

impl fmt::Debug for EnvironmentCollector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self.tasks.iter().map(|t| t.name()).collect();
        f.debug_struct("EnvironmentCollector")
            .field("tasks", &names)
            .field("queue_capacity", &self.queue_capacity)
            .finish()
    }
}

impl Default for EnvironmentCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl EnvironmentCollector {
    /// A collector without any tasks; only static entries are produced.
    pub fn new() -> Self {
        Self {
            tasks: Vec::new(),
            queue_capacity: QUEUE_CAPACITY,
        }
    }

    /// A collector with every built-in source enabled by `config`.
    pub fn from_config(config: &ScriptConfig) -> Self {
        Self {
            tasks: sources::default_sources(config),
            queue_capacity: QUEUE_CAPACITY,
        }
    }

    pub fn with_task(mut self, task: impl SourceTask + 'static) -> Self {
        self.tasks.push(Arc::new(task));
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    pub fn task_names(&self) -> Vec<&'static str> {
        self.tasks.iter().map(|t| t.name()).collect()
    }

    /// Run every task and return static entries plus everything the tasks
    /// emitted before they finished or the scope ended.
    ///
    /// Never fails: task errors and panics are logged and dropped, and a
    /// cancelled scope just yields a partial result. Ordering of the
    /// returned entries is unspecified.
    pub async fn collect(&self, ctx: TaskContext) -> Vec<EnvironmentEntry> {
        let cancel = ctx.cancel.clone();
        let ctx = Arc::new(ctx);
        let mut entries = static_entries(&ctx.identity);

        let (tx, mut rx) = mpsc::channel::<EnvironmentEntry>(self.queue_capacity);
        let sink = EnvSink::new(tx, cancel.clone());

        let mut running = JoinSet::new();
        for task in &self.tasks {
            if let Some(key) = task.idempotency_key() {
                if ctx.is_set(key) {
                    debug!(task = task.name(), key, "already set by parent; skipping source");
                    continue;
                }
            }

            let task = Arc::clone(task);
            let ctx = Arc::clone(&ctx);
            let sink = sink.clone();
            running.spawn(async move {
                debug!(task = task.name(), "source started");
                match task.run(&ctx, sink).await {
                    Ok(()) => debug!(task = task.name(), "source finished"),
                    Err(err) => warn!(task = task.name(), error = %format!("{err:#}"), "source failed"),
                }
            });
        }

        let closer = tokio::spawn(close_when_done(running, sink, cancel));

        while let Some(entry) = rx.recv().await {
            entries.push(entry);
        }

        if let Err(err) = closer.await {
            warn!(error = %err, "collector closer task failed");
        }

        debug!(count = entries.len(), "environment collected");
        entries
    }
}

/// The designated closer: wait for the barrier, then drop the last sender.
async fn close_when_done(mut running: JoinSet<()>, sink: EnvSink, cancel: CancellationToken) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(outstanding = running.len(), "scope ended; abandoning remaining sources");
                running.abort_all();
                break;
            }
            joined = running.join_next() => match joined {
                Some(result) => log_join_result(result),
                None => break,
            },
        }
    }

    while let Some(result) = running.join_next().await {
        log_join_result(result);
    }

    drop(sink);
}

fn log_join_result(result: Result<(), JoinError>) {
    match result {
        Ok(()) => {}
        Err(err) if err.is_panic() => warn!(error = %err, "source panicked; ignoring its output"),
        Err(err) if err.is_cancelled() => debug!("source aborted"),
        Err(err) => warn!(error = %err, "source task failed to join"),
    }
}

/// Entries derived straight from the script identity, without any task.
pub fn static_entries(identity: &ScriptIdentity) -> Vec<EnvironmentEntry> {
    let path = |p: &std::path::Path| p.to_string_lossy().into_owned();

    [
        (environ::NAMESPACE, identity.namespace.clone()),
        (environ::CALLER, identity.executable.clone()),
        (environ::PATH_CALLER, path(&identity.path)),
        (environ::PATH_DATA, path(&identity.data_path)),
        (environ::PATH_CACHE, path(&identity.cache_path)),
        (environ::PATH_STATE, path(&identity.state_path)),
        (environ::PATH_RUNTIME, path(&identity.runtime_path)),
    ]
    .into_iter()
    .filter_map(|(name, value)| EnvironmentEntry::new(name, value))
    .collect()
}

/// Collect the environment for one script invocation and return it as the
/// complete child environment (`NAME=VALUE` lines).
///
/// The parent environment is used twice: for idempotency checks inside the
/// sources, and, stripped of per-invocation variables, as the base the
/// collected entries are appended to.
pub async fn build_environment(
    scope: &CancellationToken,
    identity: &ScriptIdentity,
    args: &ParsedArguments,
    parent_env: &ParentEnv,
    config: &ScriptConfig,
    registry: Arc<Registry>,
) -> Vec<String> {
    let ctx = TaskContext::new(
        identity.clone(),
        args.clone(),
        parent_env.clone(),
        registry,
        scope.clone(),
    );
    let entries = EnvironmentCollector::from_config(config).collect(ctx).await;
    environ::child_environ(parent_env, &entries)
}
