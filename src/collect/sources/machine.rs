// src/collect/sources/machine.rs

use anyhow::{Context, Result};

use crate::collect::task::{BoxFuture, EnvSink, SourceTask, TaskContext};
use crate::environ;
use crate::ids;

/// Application key the raw machine id is protected with.
const APP_ID: &str = "chore";

/// Stable, protected machine id (`CHORE_MACHINE_ID`).
///
/// The raw OS machine id is never exported; scripts see
/// `HMAC-SHA256(machine id, "chore")`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MachineIdSource;

impl SourceTask for MachineIdSource {
    fn name(&self) -> &'static str {
        "machine-id"
    }

    fn idempotency_key(&self) -> Option<&'static str> {
        Some(environ::MACHINE_ID)
    }

    fn run<'a>(&'a self, ctx: &'a TaskContext, sink: EnvSink) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            if ctx.is_set(environ::MACHINE_ID) {
                return Ok(());
            }

            let id = ctx
                .registry
                .machine_id(move || async move {
                    read_machine_id(ctx)
                        .await
                        .map(|raw| ids::protected_id(&raw, APP_ID))
                })
                .await?;
            sink.emit(environ::MACHINE_ID, id).await;
            Ok(())
        })
    }
}

#[cfg(target_os = "macos")]
async fn read_machine_id(ctx: &TaskContext) -> Result<String> {
    let out = super::command_output(ctx, "ioreg", ["-rd1", "-c", "IOPlatformExpertDevice"]).await?;
    parse_ioreg_uuid(&out).context("IOPlatformUUID not found in ioreg output")
}

#[cfg(not(target_os = "macos"))]
async fn read_machine_id(_ctx: &TaskContext) -> Result<String> {
    let mut last_err = None;
    for path in ["/etc/machine-id", "/var/lib/dbus/machine-id"] {
        match tokio::fs::read_to_string(path).await {
            Ok(contents) if !contents.trim().is_empty() => return Ok(contents.trim().to_string()),
            Ok(_) => last_err = Some(anyhow::anyhow!("{path} is empty")),
            Err(err) => last_err = Some(anyhow::Error::from(err).context(format!("reading {path}"))),
        }
    }
    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("no machine id source available")))
        .context("machine id is unavailable")
}

/// Extract the value of `"IOPlatformUUID" = "..."` from `ioreg` output.
#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
fn parse_ioreg_uuid(output: &str) -> Option<String> {
    output
        .lines()
        .find(|line| line.contains("\"IOPlatformUUID\""))
        .and_then(|line| line.split('=').nth(1))
        .map(|value| value.trim().trim_matches('"').to_string())
        .filter(|value| !value.is_empty())
}
