#![allow(dead_code)]

pub use chore_test_utils::builders::{ParsedArgumentsBuilder, ScriptIdentityBuilder, TaskContextBuilder};
pub use chore_test_utils::fake_sources::{
    FailingSource, PanickingSource, SilentSource, SleepySource, StaticSource,
};
pub use chore_test_utils::{init_tracing, with_timeout, write_script};

use chore::environ::EnvironmentEntry;

/// Value of `name` among collected entries. Panics if it was emitted twice.
pub fn value_of<'a>(entries: &'a [EnvironmentEntry], name: &str) -> Option<&'a str> {
    let mut found = entries.iter().filter(|e| e.name() == name);
    let first = found.next()?;
    assert!(found.next().is_none(), "{name} emitted more than once");
    Some(first.value())
}

/// Value of `name` in a `NAME=VALUE` environment list.
pub fn env_value<'a>(environ: &'a [String], name: &str) -> Option<&'a str> {
    environ.iter().find_map(|line| {
        let (n, v) = line.split_once('=')?;
        (n == name).then_some(v)
    })
}

/// Serve exactly one HTTP response with `body` on a loopback port and
/// return the URL to reach it.
pub async fn serve_once(body: &'static str, content_type: &'static str) -> String {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let Ok((mut stream, _)) = listener.accept().await else {
            return;
        };
        let mut buf = [0u8; 4096];
        let _ = stream.read(&mut buf).await;
        let response = format!(
            "HTTP/1.1 200 OK\r\ncontent-type: {content_type}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        let _ = stream.write_all(response.as_bytes()).await;
        let _ = stream.shutdown().await;
    });

    format!("http://{addr}/")
}
