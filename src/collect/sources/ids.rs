// src/collect/sources/ids.rs

use uuid::Uuid;

use crate::collect::task::{BoxFuture, EnvSink, SourceTask, TaskContext};
use crate::environ;
use crate::ids;

/// Unique, isolated and chain identifiers.
///
/// - `CHORE_ID_UNIQUE`: fresh random id per run.
/// - `CHORE_ID_ISOLATED`: deterministic id of (script path, arguments).
/// - `CHORE_CHAIN_ID_ISOLATED`: isolated id linked to the parent's chain id.
/// - `CHORE_CHAIN_ID_RUN`: random id shared by a whole tree of nested runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdsSource;

impl SourceTask for IdsSource {
    fn name(&self) -> &'static str {
        "ids"
    }

    fn run<'a>(&'a self, ctx: &'a TaskContext, sink: EnvSink) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            let isolated = ids::isolated_id(&ctx.identity.path.to_string_lossy(), &ctx.args);
            let chained = ids::chain_id(&isolated, ctx.parent_env.get(environ::CHAIN_ID_ISOLATED));
            let run_chain = ctx
                .parent_env
                .get(environ::CHAIN_ID_RUN)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .unwrap_or_else(new_unique_id);

            sink.emit_all([
                (environ::ID_UNIQUE, new_unique_id()),
                (environ::ID_ISOLATED, isolated),
                (environ::CHAIN_ID_ISOLATED, chained),
                (environ::CHAIN_ID_RUN, run_chain),
            ])
            .await;
            Ok(())
        })
    }
}

fn new_unique_id() -> String {
    Uuid::new_v4().simple().to_string()
}
