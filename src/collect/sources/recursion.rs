// src/collect/sources/recursion.rs

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use anyhow::Context;
use shell_escape::unix::escape;

use crate::collect::task::{BoxFuture, EnvSink, SourceTask, TaskContext};
use crate::environ;
use crate::identity::{ParsedArguments, ScriptIdentity};

/// `CHORE_SELF` (absolute path of the running runner) and
/// `CHORE_RECURSION` (a shell-ready command that re-runs the same script
/// with the same config, parameters and flags, without positional
/// arguments).
#[derive(Debug, Clone, Default)]
pub struct RecursionSource {
    config: Option<PathBuf>,
}

impl RecursionSource {
    /// `config` is the file the current run was configured from.
    pub fn new(config: Option<PathBuf>) -> Self {
        Self { config }
    }
}

impl SourceTask for RecursionSource {
    fn name(&self) -> &'static str {
        "recursion"
    }

    fn run<'a>(&'a self, ctx: &'a TaskContext, sink: EnvSink) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            let exe = std::env::current_exe().context("resolving current executable")?;
            let command =
                recursion_command(&exe, self.config.as_deref(), &ctx.identity, &ctx.args);

            sink.emit_all([
                (environ::SELF, exe.to_string_lossy().into_owned()),
                (environ::RECURSION, command),
            ])
            .await;
            Ok(())
        })
    }
}

/// `<exe> --namespace <ns> [--config <file>] [-p name=value]... [-f name[=false]]... <script>`,
/// every word shell-escaped.
pub fn recursion_command(
    exe: &Path,
    config: Option<&Path>,
    identity: &ScriptIdentity,
    args: &ParsedArguments,
) -> String {
    let mut words: Vec<String> = vec![
        exe.to_string_lossy().into_owned(),
        "--namespace".to_string(),
        identity.namespace.clone(),
    ];
    if let Some(config) = config {
        words.push("--config".to_string());
        words.push(config.to_string_lossy().into_owned());
    }

    for (name, values) in &args.parameters {
        for value in values {
            words.push("-p".to_string());
            words.push(format!("{name}={value}"));
        }
    }
    for (name, on) in &args.flags {
        words.push("-f".to_string());
        words.push(if *on { name.clone() } else { format!("{name}=false") });
    }
    words.push(identity.path.to_string_lossy().into_owned());

    words
        .into_iter()
        .map(|w| escape(Cow::Owned(w)).into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}
