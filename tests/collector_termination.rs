mod common;
use crate::common::{
    FailingSource, PanickingSource, ScriptIdentityBuilder, SilentSource, SleepySource,
    StaticSource, TaskContextBuilder, init_tracing, value_of, with_timeout,
};

use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use chore::collect::EnvironmentCollector;
use proptest::prelude::*;
use tokio_util::sync::CancellationToken;

/// Identity-derived entries every collection starts with.
const STATIC_COUNT: usize = 7;

#[tokio::test]
async fn no_tasks_returns_static_entries_only() {
    init_tracing();
    let ctx = TaskContextBuilder::new().build();

    let entries = with_timeout(EnvironmentCollector::new().collect(ctx)).await;
    assert_eq!(entries.len(), STATIC_COUNT);
    assert_eq!(value_of(&entries, "CHORE_CALLER"), Some("script"));
}

#[tokio::test]
async fn finished_tasks_contribute_their_entries() {
    init_tracing();
    let ctx = TaskContextBuilder::new().build();

    let collector = EnvironmentCollector::new()
        .with_task(StaticSource::new("a", &[("CHORE_TEST_A", "1")]))
        .with_task(StaticSource::new("b", &[("CHORE_TEST_B", "2"), ("CHORE_TEST_EMPTY", "")]));

    let entries = with_timeout(collector.collect(ctx)).await;
    assert_eq!(value_of(&entries, "CHORE_TEST_A"), Some("1"));
    assert_eq!(value_of(&entries, "CHORE_TEST_B"), Some("2"));
    assert_eq!(value_of(&entries, "CHORE_TEST_EMPTY"), None);
    assert_eq!(entries.len(), STATIC_COUNT + 2);
}

#[tokio::test]
async fn hanging_tasks_are_abandoned_when_scope_ends() {
    init_tracing();
    let cancel = CancellationToken::new();
    let ctx = TaskContextBuilder::new().cancel(cancel.clone()).build();

    let collector = EnvironmentCollector::new()
        .with_task(SilentSource)
        .with_task(SleepySource {
            delay: Duration::from_secs(30),
            entry: ("CHORE_TEST_LATE", "1"),
        })
        .with_task(StaticSource::new("fast", &[("CHORE_TEST_FAST", "1")]));

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let entries = with_timeout(collector.collect(ctx)).await;

    assert!(started.elapsed() < Duration::from_secs(1), "took {:?}", started.elapsed());
    assert_eq!(value_of(&entries, "CHORE_TEST_FAST"), Some("1"));
    assert_eq!(value_of(&entries, "CHORE_TEST_LATE"), None);
}

#[tokio::test]
async fn failing_and_panicking_tasks_contribute_nothing() {
    init_tracing();
    let ctx = TaskContextBuilder::new().build();

    let collector = EnvironmentCollector::new()
        .with_task(FailingSource)
        .with_task(PanickingSource)
        .with_task(StaticSource::new("ok", &[("CHORE_TEST_OK", "yes")]));

    let entries = with_timeout(collector.collect(ctx)).await;
    assert_eq!(value_of(&entries, "CHORE_TEST_OK"), Some("yes"));
    assert_eq!(entries.len(), STATIC_COUNT + 1);
}

#[tokio::test]
async fn tiny_queue_does_not_stall_producers() {
    init_tracing();
    let ctx = TaskContextBuilder::new().build();

    let names: Vec<String> = (0..50).map(|i| format!("CHORE_TEST_{i}")).collect();
    let pairs: Vec<(&str, &str)> = names.iter().map(|n| (n.as_str(), "v")).collect();

    let collector = EnvironmentCollector::new()
        .with_queue_capacity(1)
        .with_task(StaticSource::new("many", &pairs))
        .with_task(StaticSource::new("more", &[("CHORE_TEST_X", "x")]));

    let entries = with_timeout(collector.collect(ctx)).await;
    assert_eq!(entries.len(), STATIC_COUNT + 51);
}

#[tokio::test]
async fn already_cancelled_scope_still_returns() {
    init_tracing();
    let cancel = CancellationToken::new();
    cancel.cancel();
    let ctx = TaskContextBuilder::new().cancel(cancel).build();

    let collector = EnvironmentCollector::new()
        .with_task(SilentSource)
        .with_task(SilentSource);
    let entries = with_timeout(collector.collect(ctx)).await;
    assert_eq!(entries.len(), STATIC_COUNT);
}

#[tokio::test]
async fn keyed_task_is_skipped_without_running_when_parent_defines_key() {
    init_tracing();
    let ctx = TaskContextBuilder::new()
        .identity(ScriptIdentityBuilder::new("/opt/chore/ops/keyed").namespace("ops").build())
        .parent_var("CHORE_TEST_KEYED", "1")
        .build();

    let keyed = StaticSource::new("keyed", &[("CHORE_TEST_KEYED", "2"), ("CHORE_TEST_SIDE", "x")])
        .with_idempotency_key("CHORE_TEST_KEYED");
    let keyed_runs = keyed.runs();
    let unkeyed = StaticSource::new("unkeyed", &[("CHORE_TEST_FREE", "3")])
        .with_idempotency_key("CHORE_TEST_UNSET");
    let unkeyed_runs = unkeyed.runs();

    let collector = EnvironmentCollector::new().with_task(keyed).with_task(unkeyed);
    let entries = with_timeout(collector.collect(ctx)).await;

    assert_eq!(keyed_runs.load(Ordering::SeqCst), 0);
    assert_eq!(value_of(&entries, "CHORE_TEST_KEYED"), None);
    assert_eq!(value_of(&entries, "CHORE_TEST_SIDE"), None);

    assert_eq!(unkeyed_runs.load(Ordering::SeqCst), 1);
    assert_eq!(value_of(&entries, "CHORE_TEST_FREE"), Some("3"));
    assert_eq!(value_of(&entries, "CHORE_NAMESPACE"), Some("ops"));
    assert_eq!(value_of(&entries, "CHORE_CALLER"), Some("keyed"));
}

#[derive(Debug, Clone, Copy)]
enum Kind {
    Emitting,
    Silent,
    Sleepy,
    Failing,
    Panicking,
}

fn kind_strategy() -> impl Strategy<Value = Kind> {
    prop_oneof![
        Just(Kind::Emitting),
        Just(Kind::Silent),
        Just(Kind::Sleepy),
        Just(Kind::Failing),
        Just(Kind::Panicking),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn collection_always_terminates_after_cancel(
        kinds in proptest::collection::vec(kind_strategy(), 0..8),
        cancel_after_ms in 0u64..30,
    ) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();

        let elapsed = rt.block_on(async move {
            let cancel = CancellationToken::new();
            let ctx = TaskContextBuilder::new().cancel(cancel.clone()).build();

            let mut collector = EnvironmentCollector::new();
            for kind in kinds {
                collector = match kind {
                    Kind::Emitting => {
                        collector.with_task(StaticSource::new("emit", &[("CHORE_TEST_P", "1")]))
                    }
                    Kind::Silent => collector.with_task(SilentSource),
                    Kind::Sleepy => collector.with_task(SleepySource {
                        delay: Duration::from_secs(60),
                        entry: ("CHORE_TEST_SLEEPY", "1"),
                    }),
                    Kind::Failing => collector.with_task(FailingSource),
                    Kind::Panicking => collector.with_task(PanickingSource),
                };
            }

            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(cancel_after_ms)).await;
                cancel.cancel();
            });

            let started = Instant::now();
            tokio::time::timeout(Duration::from_secs(2), collector.collect(ctx))
                .await
                .expect("collection must end after cancellation");
            started.elapsed()
        });

        prop_assert!(elapsed < Duration::from_secs(1));
    }
}
