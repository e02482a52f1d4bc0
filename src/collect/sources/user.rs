// src/collect/sources/user.rs

use anyhow::Context;
use nix::unistd::{Uid, User, getgid, getuid};

use crate::collect::task::{BoxFuture, EnvSink, SourceTask, TaskContext};
use crate::environ;

/// Current OS user: uid, gid and login name, each skipped if already set.
#[derive(Debug, Clone, Copy, Default)]
pub struct UserSource;

impl SourceTask for UserSource {
    fn name(&self) -> &'static str {
        "user"
    }

    fn run<'a>(&'a self, ctx: &'a TaskContext, sink: EnvSink) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            let uid = getuid();

            if !ctx.is_set(environ::USER_UID) && !sink.emit(environ::USER_UID, uid.to_string()).await {
                return Ok(());
            }
            if !ctx.is_set(environ::USER_GID)
                && !sink.emit(environ::USER_GID, getgid().to_string()).await
            {
                return Ok(());
            }

            if ctx.is_set(environ::USER_NAME) {
                return Ok(());
            }

            // getpwuid_r may hit NSS (LDAP and friends), keep it off the runtime.
            let lookup = tokio::task::spawn_blocking(move || user_name(uid));
            let Some(joined) = ctx.until_cancelled(lookup).await else {
                return Ok(());
            };
            if let Some(name) = joined.context("user lookup panicked")?? {
                sink.emit(environ::USER_NAME, name).await;
            }
            Ok(())
        })
    }
}

fn user_name(uid: Uid) -> anyhow::Result<Option<String>> {
    let user = User::from_uid(uid).with_context(|| format!("looking up user {uid}"))?;
    Ok(user.map(|u| u.name))
}
