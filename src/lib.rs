// src/lib.rs

#[cfg(not(unix))]
compile_error!("chore supervises processes with POSIX signals and only builds on Unix targets");

pub mod cli;
pub mod collect;
pub mod config;
pub mod environ;
pub mod errors;
pub mod identity;
pub mod ids;
pub mod logging;
pub mod supervise;
pub mod types;

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tokio::signal::unix::{SignalKind, signal};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::collect::{Registry, build_environment};
use crate::config::load_and_validate;
use crate::environ::ParentEnv;
use crate::identity::{ParsedArguments, ScriptIdentity};
use crate::supervise::{ChildStdio, platform, supervise};

/// High-level entry point used by `main.rs`. Returns the exit code `chore`
/// should exit with.
///
/// This wires together:
/// - config loading
/// - identity and argument parsing
/// - the top-level cancellation scope (shutdown signals, optional timeout)
/// - environment collection
/// - child supervision
pub async fn run(args: CliArgs) -> Result<i32> {
    run_in(
        args,
        ParentEnv::from_process(),
        CancellationToken::new(),
        &mut std::io::stdout(),
    )
    .await
}

/// [`run`] against an explicit parent environment and top-level scope.
/// `--print-env` output goes to `out`.
///
/// If `scope` ends before the script is started, the script is not run and
/// an error is returned.
pub async fn run_in<W: Write>(
    args: CliArgs,
    parent_env: ParentEnv,
    scope: CancellationToken,
    out: &mut W,
) -> Result<i32> {
    let config = load_and_validate(args.config.as_deref())
        .with_context(|| format!("loading config {:?}", args.config))?;

    let identity = ScriptIdentity::with_default_layout(&args.namespace, &args.script, |name| {
        parent_env.get(name).map(str::to_string)
    })?;
    let parsed = parse_arguments(&args)?;

    let mut guards = cancel_on_shutdown_signals(&scope)?;
    if let Some(limit) = config.timeout {
        guards.spawn(cancel_after(scope.clone(), limit));
    }

    let registry = Arc::new(Registry::new());
    let environ = build_environment(
        &scope,
        &identity,
        &parsed,
        &parent_env,
        &config,
        Arc::clone(&registry),
    )
    .await;
    debug!(count = environ.len(), "child environment ready");

    if args.print_env {
        registry.cleanup();
        guards.abort_all();
        for line in &environ {
            writeln!(out, "{line}").context("writing environment")?;
        }
        out.flush().context("writing environment")?;
        return Ok(0);
    }

    if scope.is_cancelled() {
        registry.cleanup();
        guards.abort_all();
        bail!("interrupted before {:?} was started", identity.path);
    }

    let outcome = supervise(
        &scope,
        &identity.path,
        &parsed.positional,
        environ,
        ChildStdio::inherit(),
        config.shutdown,
    )
    .await;

    registry.cleanup();
    guards.abort_all();

    let result = outcome?;
    info!(script = %identity.executable, exit_code = result.exit_code, "script finished");
    Ok(result.exit_code)
}

fn parse_arguments(args: &CliArgs) -> Result<ParsedArguments> {
    let mut parsed = ParsedArguments::default();
    for raw in &args.params {
        parsed.add_parameter(raw)?;
    }
    for raw in &args.flags {
        parsed.add_flag(raw)?;
    }
    parsed.positional = args.args.clone();
    Ok(parsed)
}

/// End `scope` when this process receives any shutdown signal. Dropping or
/// aborting the returned set removes the listeners' tasks.
fn cancel_on_shutdown_signals(scope: &CancellationToken) -> Result<JoinSet<()>> {
    let mut listeners = JoinSet::new();

    for &sig in platform::shutdown_signals() {
        let mut stream = signal(SignalKind::from_raw(sig as i32))
            .with_context(|| format!("listening for {sig:?}"))?;
        let scope = scope.clone();
        listeners.spawn(async move {
            tokio::select! {
                _ = scope.cancelled() => {}
                got = stream.recv() => {
                    if got.is_some() {
                        info!(signal = ?sig, "shutdown signal received");
                        scope.cancel();
                    }
                }
            }
        });
    }

    Ok(listeners)
}

async fn cancel_after(scope: CancellationToken, limit: Duration) {
    tokio::select! {
        _ = scope.cancelled() => {}
        _ = tokio::time::sleep(limit) => {
            warn!(timeout = ?limit, "invocation timed out");
            scope.cancel();
        }
    }
}
