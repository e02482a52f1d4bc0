// src/collect/sources/git.rs

use std::fmt;

use tracing::debug;

use super::command_output;
use crate::collect::task::{BoxFuture, EnvSink, SourceTask, TaskContext};
use crate::environ;
use crate::types::GitAccessMode;

/// Git facts of the current working directory, resolved with the `git` CLI.
#[derive(Debug, Clone, Copy)]
pub struct GitSource {
    mode: GitAccessMode,
}

impl GitSource {
    pub fn new(mode: GitAccessMode) -> Self {
        Self { mode }
    }
}

/// What `HEAD` points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceType {
    Branch,
    Tag,
    Remote,
    Note,
    Commit,
}

impl fmt::Display for ReferenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReferenceType::Branch => "branch",
            ReferenceType::Tag => "tag",
            ReferenceType::Remote => "remote",
            ReferenceType::Note => "note",
            ReferenceType::Commit => "commit",
        };
        f.write_str(s)
    }
}

/// Resolved reference: full name, short name and type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub name: String,
    pub short: String,
    pub kind: ReferenceType,
}

/// Classify a full ref name such as `refs/heads/main`.
///
/// Anything outside the known namespaces is reported as a plain commit.
pub fn classify_reference(full: &str) -> Reference {
    const NAMESPACES: &[(&str, ReferenceType)] = &[
        ("refs/heads/", ReferenceType::Branch),
        ("refs/tags/", ReferenceType::Tag),
        ("refs/remotes/", ReferenceType::Remote),
        ("refs/notes/", ReferenceType::Note),
    ];

    for (prefix, kind) in NAMESPACES {
        if let Some(short) = full.strip_prefix(prefix) {
            return Reference {
                name: full.to_string(),
                short: short.to_string(),
                kind: *kind,
            };
        }
    }

    Reference {
        name: full.to_string(),
        short: full.to_string(),
        kind: ReferenceType::Commit,
    }
}

impl SourceTask for GitSource {
    fn name(&self) -> &'static str {
        "git"
    }

    fn run<'a>(&'a self, ctx: &'a TaskContext, sink: EnvSink) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            match self.mode {
                GitAccessMode::No => return Ok(()),
                GitAccessMode::IfUndefined if ctx.is_set(environ::GIT_COMMIT_HASH) => {
                    debug!("git facts inherited; skipping");
                    return Ok(());
                }
                _ => {}
            }

            if command_output(ctx, "git", ["rev-parse", "--is-inside-work-tree"])
                .await
                .is_err()
            {
                debug!("not inside a git work tree");
                return Ok(());
            }

            let hash = command_output(ctx, "git", ["rev-parse", "--verify", "HEAD"]).await?;
            let short_hash = command_output(ctx, "git", ["rev-parse", "--short", "HEAD"]).await?;
            let reference = resolve_reference(ctx, &hash, &short_hash).await;

            sink.emit_all([
                (environ::GIT_REFERENCE, reference.name),
                (environ::GIT_REFERENCE_SHORT, reference.short),
                (environ::GIT_REFERENCE_TYPE, reference.kind.to_string()),
                (environ::GIT_COMMIT_HASH, hash),
                (environ::GIT_COMMIT_HASH_SHORT, short_hash),
            ])
            .await;
            Ok(())
        })
    }
}

async fn resolve_reference(ctx: &TaskContext, hash: &str, short_hash: &str) -> Reference {
    if let Ok(full) = command_output(ctx, "git", ["symbolic-ref", "-q", "HEAD"]).await {
        return classify_reference(&full);
    }

    // Detached HEAD: see whether some tag, remote or note points at it.
    if let Ok(described) =
        command_output(ctx, "git", ["describe", "--all", "--exact-match", "HEAD"]).await
    {
        let reference = classify_reference(&format!("refs/{described}"));
        if reference.kind != ReferenceType::Commit {
            return reference;
        }
    }

    Reference {
        name: hash.to_string(),
        short: short_hash.to_string(),
        kind: ReferenceType::Commit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_known_namespaces() {
        let branch = classify_reference("refs/heads/feature/x");
        assert_eq!(branch.kind, ReferenceType::Branch);
        assert_eq!(branch.short, "feature/x");

        assert_eq!(classify_reference("refs/tags/v1.0").kind, ReferenceType::Tag);
        assert_eq!(
            classify_reference("refs/remotes/origin/main").short,
            "origin/main"
        );
        assert_eq!(classify_reference("refs/notes/commits").kind, ReferenceType::Note);
    }

    #[test]
    fn unknown_refs_are_commits() {
        let r = classify_reference("refs/stash");
        assert_eq!(r.kind, ReferenceType::Commit);
        assert_eq!(r.kind.to_string(), "commit");
    }
}
