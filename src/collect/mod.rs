// src/collect/mod.rs

//! Context collection.
//!
//! Many independent [`SourceTask`]s run concurrently against one
//! cancellation scope and push `NAME=VALUE` entries into a shared queue.
//! The [`EnvironmentCollector`] owns the queue, the completion barrier and
//! the closer; callers only see the merged list of entries.
//!
//! - [`task`] defines the `SourceTask` seam, the `EnvSink` and the
//!   read-only `TaskContext` handed to every task.
//! - [`registry`] holds state shared across tasks of one invocation
//!   (machine id cache, temp dirs).
//! - [`collector`] runs the fan-out / fan-in.
//! - [`sources`] contains the built-in tasks.

pub mod collector;
pub mod registry;
pub mod sources;
pub mod task;

pub use collector::{EnvironmentCollector, build_environment, static_entries};
pub use registry::Registry;
pub use task::{BoxFuture, EnvSink, SourceTask, TaskContext};
