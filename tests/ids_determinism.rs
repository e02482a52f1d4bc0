mod common;
use crate::common::{ParsedArgumentsBuilder, TaskContextBuilder, init_tracing, value_of, with_timeout};

use std::collections::BTreeMap;

use chore::collect::EnvironmentCollector;
use chore::collect::sources::IdsSource;
use chore::environ;
use chore::identity::ParsedArguments;
use chore::ids::{chain, checksum, isolated_id};
use proptest::prelude::*;

fn arguments_strategy() -> impl Strategy<Value = ParsedArguments> {
    (
        proptest::collection::btree_map("[a-z]{1,6}", proptest::collection::vec(".{0,8}", 1..3), 0..4),
        proptest::collection::btree_map("[a-z]{1,6}", any::<bool>(), 0..4),
        proptest::collection::vec(".{0,8}", 0..4),
    )
        .prop_map(|(parameters, flags, positional)| ParsedArguments {
            parameters,
            flags,
            positional,
        })
}

proptest! {
    #[test]
    fn isolated_id_is_a_pure_function(args in arguments_strategy(), path in "/[a-z/]{1,20}") {
        let first = isolated_id(&path, &args);
        let second = isolated_id(&path, &args.clone());
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(first, hex::encode(chain(&checksum(&args), path.as_bytes())));
    }

    #[test]
    fn insertion_order_does_not_matter(args in arguments_strategy()) {
        let mut reversed = ParsedArguments {
            parameters: BTreeMap::new(),
            flags: BTreeMap::new(),
            positional: args.positional.clone(),
        };
        for (name, values) in args.parameters.iter().rev() {
            reversed.parameters.insert(name.clone(), values.clone());
        }
        for (name, on) in args.flags.iter().rev() {
            reversed.flags.insert(name.clone(), *on);
        }
        prop_assert_eq!(checksum(&args), checksum(&reversed));
    }

    #[test]
    fn extra_positional_changes_the_id(args in arguments_strategy(), extra in "[a-z]{1,4}") {
        let mut more = args.clone();
        more.positional.push(extra);
        prop_assert_ne!(isolated_id("/s", &args), isolated_id("/s", &more));
    }
}

#[test]
fn fixture_is_stable_across_builds() {
    let args = ParsedArgumentsBuilder::new()
        .param("count", "1")
        .param("count", "2")
        .flag("verbose", true)
        .positional("a")
        .build();

    assert_eq!(
        isolated_id("/opt/chore/ns/script", &args),
        "ad88decccf55baa8354f936ca4736989ca5444f3a23e44b8811c13ffeac82eeb"
    );
}

async fn collect_ids(args: &ParsedArguments) -> Vec<chore::environ::EnvironmentEntry> {
    let ctx = TaskContextBuilder::new().args(args.clone()).build();
    with_timeout(EnvironmentCollector::new().with_task(IdsSource).collect(ctx)).await
}

#[tokio::test]
async fn ids_source_is_deterministic_except_unique_id() {
    init_tracing();
    let args = ParsedArgumentsBuilder::new().param("env", "prod").build();

    let first = collect_ids(&args).await;
    let second = collect_ids(&args).await;

    assert_eq!(
        value_of(&first, environ::ID_ISOLATED),
        value_of(&second, environ::ID_ISOLATED)
    );
    assert_ne!(
        value_of(&first, environ::ID_UNIQUE),
        value_of(&second, environ::ID_UNIQUE)
    );
    // Nothing inherited: chain id equals the isolated id.
    assert_eq!(
        value_of(&first, environ::CHAIN_ID_ISOLATED),
        value_of(&first, environ::ID_ISOLATED)
    );
}

#[tokio::test]
async fn chain_ids_follow_the_parent() {
    init_tracing();
    let ctx = TaskContextBuilder::new()
        .parent_var(environ::CHAIN_ID_ISOLATED, "parent-chain")
        .parent_var(environ::CHAIN_ID_RUN, "run-1234")
        .build();

    let entries = with_timeout(EnvironmentCollector::new().with_task(IdsSource).collect(ctx)).await;

    assert_eq!(value_of(&entries, environ::CHAIN_ID_RUN), Some("run-1234"));
    assert_ne!(
        value_of(&entries, environ::CHAIN_ID_ISOLATED),
        value_of(&entries, environ::ID_ISOLATED)
    );
}
