mod common;
use crate::common::{env_value, init_tracing, with_timeout, write_script};

use std::error::Error;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chore::collect::{Registry, build_environment};
use chore::config::ScriptConfig;
use chore::environ::{self, ParentEnv};
use chore::identity::{ParsedArguments, ScriptIdentity};
use chore::supervise::{ChildStdio, ExecutionResult, ShutdownPolicy, supervise};
use tokio_util::sync::CancellationToken;

type TestResult = Result<(), Box<dyn Error>>;

struct Run {
    result: ExecutionResult,
    stdout: String,
    environ: Vec<String>,
}

async fn run_script(
    dir: &Path,
    script: &Path,
    positional: &[&str],
    parent: ParentEnv,
) -> Result<Run, Box<dyn Error>> {
    let home = dir.join("home");
    let runtime = dir.join("runtime");
    let identity = ScriptIdentity::with_default_layout("e2e", script, |name| match name {
        "HOME" => Some(home.to_string_lossy().into_owned()),
        "XDG_RUNTIME_DIR" => Some(runtime.to_string_lossy().into_owned()),
        _ => None,
    })?;
    let args = ParsedArguments {
        positional: positional.iter().map(|s| s.to_string()).collect(),
        ..ParsedArguments::default()
    };

    let scope = CancellationToken::new();
    let registry = Arc::new(Registry::new());
    let environ = with_timeout(build_environment(
        &scope,
        &identity,
        &args,
        &parent,
        &ScriptConfig::default(),
        Arc::clone(&registry),
    ))
    .await;

    let out_path = dir.join("stdout");
    let stdio = ChildStdio {
        stdout: std::fs::File::create(&out_path)?.into(),
        ..ChildStdio::inherit()
    };
    let result = with_timeout(supervise(
        &scope,
        &identity.path,
        &args.positional,
        environ.clone(),
        stdio,
        ShutdownPolicy::default(),
    ))
    .await?;
    registry.cleanup();

    Ok(Run {
        result,
        stdout: std::fs::read_to_string(&out_path)?,
        environ,
    })
}

#[tokio::test]
async fn scenario_echo_caller_and_first_argument() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let script = write_script(dir.path(), "greet", "echo $CHORE_CALLER $1");

    let run = run_script(dir.path(), &script, &["a", "b"], ParentEnv::default()).await?;

    assert_eq!(run.stdout, "greet a\n");
    assert_eq!(run.result.exit_code, 0);
    assert!(run.result.elapsed < Duration::from_secs(1), "{:?}", run.result.elapsed);
    Ok(())
}

#[tokio::test]
async fn scenario_exit_code_propagates() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let script = write_script(dir.path(), "fail", "exit 3");

    let run = run_script(dir.path(), &script, &[], ParentEnv::default()).await?;
    assert_eq!(run.result.exit_code, 3);
    Ok(())
}

#[tokio::test]
async fn temp_dir_exists_while_script_runs_and_is_removed_after() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let script = write_script(dir.path(), "scratch", "test -d \"$CHORE_PATH_TEMP\" && echo present");

    let run = run_script(dir.path(), &script, &[], ParentEnv::default()).await?;
    assert_eq!(run.stdout, "present\n");

    let temp = env_value(&run.environ, environ::PATH_TEMP).expect("temp dir exported");
    assert!(temp.starts_with(&*dir.path().join("runtime").to_string_lossy()));
    assert!(!Path::new(temp).exists());
    Ok(())
}

#[tokio::test]
async fn nested_run_replaces_per_invocation_vars_and_keeps_facts() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let script = write_script(dir.path(), "nested", "echo \"$CHORE_NAMESPACE $CHORE_MACHINE_ID\"");

    let parent = ParentEnv::from_pairs([
        (environ::NAMESPACE, "outer"),
        (environ::MACHINE_ID, "inherited-machine"),
        ("CHORE_P_STALE", "1"),
        ("PATH", "/usr/bin:/bin"),
    ]);
    let run = run_script(dir.path(), &script, &[], parent).await?;

    assert_eq!(run.stdout, "e2e inherited-machine\n");
    assert_eq!(env_value(&run.environ, "CHORE_P_STALE"), None);
    assert_eq!(env_value(&run.environ, "PATH"), Some("/usr/bin:/bin"));
    let namespaces = run
        .environ
        .iter()
        .filter(|l| l.starts_with("CHORE_NAMESPACE="))
        .count();
    assert_eq!(namespaces, 1);
    Ok(())
}

#[tokio::test]
async fn time_and_identity_facts_reach_the_script() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let script = write_script(dir.path(), "facts", "true");

    let run = run_script(dir.path(), &script, &[], ParentEnv::default()).await?;
    for name in [
        environ::STARTED_AT_RFC3339,
        environ::STARTED_AT_UNIX,
        environ::ID_UNIQUE,
        environ::ID_ISOLATED,
        environ::CHAIN_ID_RUN,
        environ::OS_TYPE,
        environ::USER_UID,
        environ::SELF,
        environ::RECURSION,
    ] {
        assert!(env_value(&run.environ, name).is_some(), "{name} missing");
    }
    Ok(())
}
