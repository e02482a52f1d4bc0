// src/collect/sources/temp_dir.rs

use tracing::debug;

use crate::collect::task::{BoxFuture, EnvSink, SourceTask, TaskContext};
use crate::environ;

/// Fresh per-run scratch directory (`CHORE_PATH_TEMP`).
///
/// Created under the runtime path when possible, otherwise under the system
/// temp dir. The [`Registry`](crate::collect::Registry) owns it and removes
/// it on cleanup.
#[derive(Debug, Clone, Copy, Default)]
pub struct TempDirSource;

impl SourceTask for TempDirSource {
    fn name(&self) -> &'static str {
        "temp-dir"
    }

    fn run<'a>(&'a self, ctx: &'a TaskContext, sink: EnvSink) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            let path = match ctx.registry.make_temp_dir(&ctx.identity.runtime_path) {
                Ok(path) => path,
                Err(err) => {
                    debug!(
                        base = ?ctx.identity.runtime_path,
                        error = %format!("{err:#}"),
                        "runtime dir unusable; falling back to system temp dir"
                    );
                    ctx.registry.make_temp_dir(&std::env::temp_dir())?
                }
            };

            sink.emit(environ::PATH_TEMP, path.to_string_lossy()).await;
            Ok(())
        })
    }
}
