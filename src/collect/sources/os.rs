// src/collect/sources/os.rs

use std::collections::HashMap;

use anyhow::Result;
use tracing::debug;

use crate::collect::task::{BoxFuture, EnvSink, SourceTask, TaskContext};
use crate::environ;

/// Operating system facts.
///
/// Type and architecture are compile-time constants and always emitted.
/// Distribution id, version and codename need introspection and are only
/// looked up when the parent did not already provide `CHORE_OS_ID`.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsSource;

/// What introspection found out about the running OS.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OsRelease {
    pub id: String,
    pub version: String,
    pub codename: String,
}

impl OsRelease {
    fn entries(&self) -> Vec<(&'static str, String)> {
        let mut parts = self.version.split('.');
        let major = parts.next().unwrap_or_default().to_string();
        let minor = parts.next().unwrap_or_default().to_string();

        vec![
            (environ::OS_ID, self.id.clone()),
            (environ::OS_VERSION, self.version.clone()),
            (environ::OS_CODENAME, self.codename.clone()),
            (environ::OS_VERSION_MAJOR, major),
            (environ::OS_VERSION_MINOR, minor),
        ]
    }
}

impl SourceTask for OsSource {
    fn name(&self) -> &'static str {
        "os"
    }

    fn run<'a>(&'a self, ctx: &'a TaskContext, sink: EnvSink) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            sink.emit_all([
                (environ::OS_TYPE, std::env::consts::OS),
                (environ::OS_ARCH, std::env::consts::ARCH),
            ])
            .await;

            if ctx.is_set(environ::OS_ID) {
                debug!("CHORE_OS_ID inherited; skipping OS introspection");
                return Ok(());
            }

            let release = introspect(ctx).await?;
            sink.emit_all(release.entries()).await;
            Ok(())
        })
    }
}

#[cfg(target_os = "macos")]
async fn introspect(ctx: &TaskContext) -> Result<OsRelease> {
    let version = super::command_output(ctx, "sw_vers", ["-productVersion"]).await?;
    Ok(OsRelease {
        id: "macos".to_string(),
        version,
        codename: String::new(),
    })
}

#[cfg(not(target_os = "macos"))]
async fn introspect(_ctx: &TaskContext) -> Result<OsRelease> {
    use anyhow::Context;

    let contents = match tokio::fs::read_to_string("/etc/os-release").await {
        Ok(contents) => contents,
        Err(_) => tokio::fs::read_to_string("/usr/lib/os-release")
            .await
            .context("reading os-release")?,
    };
    Ok(parse_os_release(&contents))
}

/// Parse the `KEY=value` lines of an os-release file.
pub fn parse_os_release(contents: &str) -> OsRelease {
    let fields: HashMap<&str, String> = contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim(), unquote(value.trim())))
        .collect();

    let field = |key: &str| fields.get(key).cloned().unwrap_or_default();
    OsRelease {
        id: field("ID"),
        version: field("VERSION_ID"),
        codename: field("VERSION_CODENAME"),
    }
}

fn unquote(value: &str) -> String {
    let stripped = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
        .unwrap_or(value);
    stripped.replace("\\\"", "\"")
}
