// src/collect/sources/arguments.rs

use crate::collect::task::{BoxFuture, EnvSink, SourceTask, TaskContext};
use crate::environ::{self, EnvironmentEntry};
use crate::identity::ParsedArguments;

/// `CHORE_P_<NAME>` for every parameter and `CHORE_F_<NAME>` for every flag.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArgumentsSource;

impl SourceTask for ArgumentsSource {
    fn name(&self) -> &'static str {
        "arguments"
    }

    fn run<'a>(&'a self, ctx: &'a TaskContext, sink: EnvSink) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            for entry in argument_entries(&ctx.args) {
                if !sink.emit(entry.name(), entry.value()).await {
                    break;
                }
            }
            Ok(())
        })
    }
}

/// Parameters are joined with `,`; flags render as `true` / `false`.
pub fn argument_entries(args: &ParsedArguments) -> Vec<EnvironmentEntry> {
    let params = args.parameters.iter().map(|(name, values)| {
        (environ::argument_var(environ::PARAMETER_PREFIX, name), values.join(","))
    });
    let flags = args
        .flags
        .iter()
        .map(|(name, on)| (environ::argument_var(environ::FLAG_PREFIX, name), on.to_string()));

    params
        .chain(flags)
        .filter_map(|(name, value)| EnvironmentEntry::new(name, value))
        .collect()
}
