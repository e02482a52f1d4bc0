#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use chore::collect::{Registry, TaskContext};
use chore::environ::ParentEnv;
use chore::identity::{ParsedArguments, ScriptIdentity};
use tokio_util::sync::CancellationToken;

/// Builder for `ScriptIdentity` with fixed, fake directories.
pub struct ScriptIdentityBuilder {
    identity: ScriptIdentity,
}

impl ScriptIdentityBuilder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let executable = path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "script".to_string());

        Self {
            identity: ScriptIdentity {
                namespace: "test".to_string(),
                data_path: PathBuf::from("/tmp/chore-test/data").join(&executable),
                cache_path: PathBuf::from("/tmp/chore-test/cache").join(&executable),
                state_path: PathBuf::from("/tmp/chore-test/state").join(&executable),
                runtime_path: std::env::temp_dir().join("chore-test-runtime"),
                executable,
                path,
            },
        }
    }

    pub fn namespace(mut self, namespace: &str) -> Self {
        self.identity.namespace = namespace.to_string();
        self
    }

    pub fn runtime_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.identity.runtime_path = path.into();
        self
    }

    pub fn build(self) -> ScriptIdentity {
        self.identity
    }
}

/// Builder for `ParsedArguments`.
#[derive(Default)]
pub struct ParsedArgumentsBuilder {
    args: ParsedArguments,
}

impl ParsedArgumentsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn param(mut self, name: &str, value: &str) -> Self {
        self.args
            .parameters
            .entry(name.to_string())
            .or_default()
            .push(value.to_string());
        self
    }

    pub fn flag(mut self, name: &str, value: bool) -> Self {
        self.args.flags.insert(name.to_string(), value);
        self
    }

    pub fn positional(mut self, arg: &str) -> Self {
        self.args.positional.push(arg.to_string());
        self
    }

    pub fn build(self) -> ParsedArguments {
        self.args
    }
}

/// Builder for a `TaskContext` with an empty parent environment.
pub struct TaskContextBuilder {
    identity: ScriptIdentity,
    args: ParsedArguments,
    parent: Vec<(String, String)>,
    cancel: CancellationToken,
    registry: Arc<Registry>,
}

impl TaskContextBuilder {
    pub fn new() -> Self {
        Self {
            identity: ScriptIdentityBuilder::new("/opt/chore/test/script").build(),
            args: ParsedArguments::default(),
            parent: Vec::new(),
            cancel: CancellationToken::new(),
            registry: Arc::new(Registry::new()),
        }
    }

    pub fn identity(mut self, identity: ScriptIdentity) -> Self {
        self.identity = identity;
        self
    }

    pub fn args(mut self, args: ParsedArguments) -> Self {
        self.args = args;
        self
    }

    /// Pretend the parent process exported `name=value`.
    pub fn parent_var(mut self, name: &str, value: &str) -> Self {
        self.parent.push((name.to_string(), value.to_string()));
        self
    }

    pub fn cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn registry(mut self, registry: Arc<Registry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn build(self) -> TaskContext {
        TaskContext::new(
            self.identity,
            self.args,
            ParentEnv::from_pairs(self.parent),
            self.registry,
            self.cancel,
        )
    }
}

impl Default for TaskContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}
