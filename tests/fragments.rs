//! Fragment ordering applied to deployments.

use std::path::Path;

use webapp_router::config::{load_deployment, parse_config};
use webapp_router::deployment::{build_deployment, DeploymentError, FragmentContribution};
use webapp_router::dispatch::{handler_fn, FilterAction};
use webapp_router::filter::{DispatchType, FilterEntry};
use webapp_router::fragment::{order, Fragment, OrderingEntry, OrderingError};
use webapp_router::Deployment;

mod common;

use common::{get, recording_filter, recording_handler, Journal};

fn contribution(fragment: Fragment) -> FragmentContribution {
    let name = fragment.name.clone();
    FragmentContribution::new(fragment).filter(FilterEntry::new(name).url_pattern("/*"))
}

fn builder_with_filters(journal: &Journal, names: &[&str]) -> webapp_router::DeploymentBuilder {
    let mut builder = Deployment::builder("app");
    builder.register_mapping("/", "h").unwrap();
    for name in names {
        builder
            .add_filter(*name, recording_filter(journal, name, FilterAction::Continue))
            .unwrap();
    }
    builder.add_handler("h", recording_handler(journal, "h")).unwrap();
    builder
}

#[test]
fn test_absolute_order_with_others() {
    let journal = Journal::new();
    let mut builder = builder_with_filters(&journal, &["F1", "F2", "F3"]);
    let absolute = vec![
        OrderingEntry::named("F3"),
        OrderingEntry::Others,
        OrderingEntry::named("F1"),
    ];
    let applied = builder
        .register_fragments(
            vec![
                contribution(Fragment::new("F1")),
                contribution(Fragment::new("F2")),
                contribution(Fragment::new("F3")),
            ],
            Some(&absolute),
        )
        .unwrap();
    assert_eq!(applied, vec!["F3", "F2", "F1"]);

    let deployment = builder.build().unwrap();
    assert_eq!(deployment.fragment_order(), ["F3", "F2", "F1"]);

    // Fragment filters land in the index in fragment order.
    deployment.service(&mut get(&deployment, "/")).unwrap();
    assert_eq!(
        journal.entries(),
        vec!["+F3", "+F2", "+F1", "h:REQUEST", "-F1", "-F2", "-F3"]
    );
}

#[test]
fn test_relative_order() {
    let fragments = vec![
        Fragment::new("F1").after("F2"),
        Fragment::new("F2"),
        Fragment::new("F3").before_others(),
    ];
    assert_eq!(order(&fragments, None).unwrap(), vec!["F3", "F2", "F1"]);
}

#[test]
fn test_absolute_order_drops_unlisted_fragment() {
    let journal = Journal::new();
    let mut builder = builder_with_filters(&journal, &["F1", "F2"]);
    let absolute = vec![OrderingEntry::named("F2")];
    let applied = builder
        .register_fragments(
            vec![
                contribution(Fragment::new("F1")),
                contribution(Fragment::new("F2")),
            ],
            Some(&absolute),
        )
        .unwrap();
    assert_eq!(applied, vec!["F2"]);

    let deployment = builder.build().unwrap();
    let chain = deployment.build_chain(deployment.resolve("/").as_ref(), "/", DispatchType::Request);
    assert_eq!(chain.ordered_filter_names, vec!["F2"]);
}

#[test]
fn test_cycle_fails_deployment() {
    let mut builder = Deployment::builder("app");
    let err = builder
        .register_fragments(
            vec![
                FragmentContribution::new(Fragment::new("A").before("B")),
                FragmentContribution::new(Fragment::new("B").before("A")),
            ],
            None,
        )
        .unwrap_err();

    match err {
        DeploymentError::Ordering(OrderingError::Cycle { participants }) => {
            assert!(participants.contains(&"A".to_string()));
            assert!(participants.contains(&"B".to_string()));
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn test_others_declared_by_two_fragments_fails_deployment() {
    let config = parse_config(
        r#"
        [[fragments]]
        name = "first"
        before = ["others"]

        [[fragments]]
        name = "last"
        after = ["others"]

        [[fragments]]
        name = "plain"
        "#,
    )
    .unwrap();

    match build_deployment(&config) {
        Err(DeploymentError::Ordering(OrderingError::DuplicateOthers { location })) => {
            assert!(location.contains("first"));
            assert!(location.contains("last"));
        }
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("deployment should be rejected"),
    }
}

#[test]
fn test_later_fragment_mapping_wins() {
    let mut builder = Deployment::builder("app");
    builder
        .register_fragments(
            vec![
                FragmentContribution::new(Fragment::new("late").after("early")).mapping("/shared", "late_handler"),
                FragmentContribution::new(Fragment::new("early")).mapping("/shared", "early_handler"),
            ],
            None,
        )
        .unwrap();
    builder.add_handler("early_handler", handler_fn(|_, _| Ok(()))).unwrap();
    builder.add_handler("late_handler", handler_fn(|_, _| Ok(()))).unwrap();
    let deployment = builder.build().unwrap();

    assert_eq!(deployment.resolve("/shared").unwrap().handler_name, "late_handler");
}

#[test]
fn test_descriptor_fragments() {
    let config = parse_config(
        r#"
        [[handlers]]
        name = "home"
        kind = "static"
        body = "home"

        [[mappings]]
        pattern = "/"
        handler = "home"

        [[fragments]]
        name = "metrics"
        after = ["i18n"]

        [[fragments.handlers]]
        name = "stats"
        kind = "static"
        body = "stats"

        [[fragments.mappings]]
        pattern = "/stats"
        handler = "stats"

        [[fragments]]
        name = "security"
        before = ["others"]

        [[fragments.filters]]
        name = "headers"
        kind = "header"
        header = "x-frame-options"
        value = "DENY"
        url_patterns = ["/*"]

        [[fragments]]
        name = "i18n"
        "#,
    )
    .unwrap();

    let deployment = build_deployment(&config).unwrap();
    assert_eq!(deployment.fragment_order(), ["security", "i18n", "metrics"]);
    assert_eq!(deployment.resolve("/stats").unwrap().handler_name, "stats");

    let mut exchange = get(&deployment, "/stats");
    deployment.service(&mut exchange).unwrap();
    assert_eq!(exchange.response.headers()["x-frame-options"], "DENY");
    assert_eq!(common::body(&exchange), "stats");
}

#[test]
fn test_sample_descriptor_loads() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("deploy.toml");
    let (config, deployment) = load_deployment(&path).unwrap();

    assert_eq!(config.name, "demo");
    assert_eq!(deployment.fragment_order(), ["security", "status"]);
    assert_eq!(deployment.resolve("/status").unwrap().handler_name, "status");
    assert_eq!(deployment.resolve("/a/b.do").unwrap().handler_name, "echo");

    let mut exchange = get(&deployment, "/admin/users");
    deployment.service(&mut exchange).unwrap();
    assert_eq!(exchange.response.status(), axum::http::StatusCode::FORBIDDEN);

    let mut exchange = get(&deployment, "/");
    deployment.service(&mut exchange).unwrap();
    assert_eq!(exchange.response.headers()["x-frame-options"], "DENY");
    assert_eq!(common::body(&exchange), "welcome\n");
}
