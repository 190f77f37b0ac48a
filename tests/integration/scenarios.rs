//! The documented end-to-end cases, one test each.

use krm_setters::config::{load_from_str, ConfigFormat, FunctionConfig, SetterConfig};
use krm_setters::document::{load_str, render_documents};
use krm_setters::engine::pattern::{resolve, Bindings, Pattern};
use krm_setters::engine::{Action, ErrorKind};
use krm_setters::functions::{apply_setters, search_replace};
use std::collections::BTreeMap;

fn search_config(yaml: &str) -> krm_setters::config::SearchReplaceConfig {
    match load_from_str(yaml, ConfigFormat::Yaml).unwrap() {
        FunctionConfig::SearchReplace(config) => config,
        FunctionConfig::Setters(_) => panic!("expected a search-replace config"),
    }
}

#[test]
fn partial_binding_derives_the_tag() {
    let pattern = Pattern::parse("${image}:${tag}");
    let bindings = Bindings::from([("image".to_string(), "ubuntu".to_string())]);
    assert_eq!(resolve(&pattern, &bindings, "nginx:1.7.9").unwrap(), "ubuntu:1.7.9");
}

#[test]
fn search_by_value_replaces_every_match() {
    let mut resources = load_str(
        "\
apiVersion: apps/v1
kind: Deployment
metadata:
  name: nginx-deployment
spec:
  replicas: \"3\"
  template:
    spec:
      terminationGracePeriodSeconds: \"3\"
",
        "deploy.yaml",
    )
    .unwrap();
    let config = search_config("data:\n  by-value: \"3\"\n  put-value: \"4\"\n");

    let report = search_replace(&mut resources, &config).unwrap();

    assert_eq!(report.results.len(), 2);
    assert_eq!(report.summary(), "Mutated 2 field(s)");
    let rendered = render_documents(&resources);
    assert!(rendered.contains("  replicas: \"4\"\n"));
    assert!(rendered.contains("      terminationGracePeriodSeconds: \"4\"\n"));
}

#[test]
fn out_of_bounds_path_is_not_an_error() {
    let input = "spec:\n  foo:\n    - a\n    - b\n";
    let mut resources = load_str(input, "r.yaml").unwrap();
    let config = search_config("data:\n  by-path: spec.foo[2]\n  put-value: c\n");

    let report = search_replace(&mut resources, &config).unwrap();

    assert_eq!(report.count(), 0);
    assert_eq!(report.action, Action::Mutated);
    assert_eq!(report.summary(), "Mutated 0 field(s)");
    assert_eq!(render_documents(&resources), input);
}

#[test]
fn array_setter_replaces_the_sequence() {
    let mut resources = load_str(
        "\
apiVersion: v1
kind: ConfigMap
metadata:
  name: envs
environments: # kpt-set: ${environments}
  - dev
",
        "cm.yaml",
    )
    .unwrap();
    let data = BTreeMap::from([("environments".to_string(), "[stage, prod]".to_string())]);

    let report = apply_setters(&mut resources, &SetterConfig::from_data(&data)).unwrap();

    assert_eq!(report.count(), 1);
    assert_eq!(report.results[0].old_value, "[dev]");
    assert_eq!(report.results[0].new_value, "[stage, prod]");
    assert!(render_documents(&resources)
        .ends_with("environments: # kpt-set: ${environments}\n  - stage\n  - prod\n"));
}

#[test]
fn conflicting_matchers_are_rejected_before_any_walk() {
    let err = load_from_str("data:\n  by-value: a\n  by-value-regex: b\n", ConfigFormat::Yaml)
        .unwrap_err();
    assert!(err.to_string().contains("by-value"));

    let err = search_replace(
        &mut load_str("a: b\n", "r.yaml").unwrap(),
        &krm_setters::config::SearchReplaceConfig {
            by_value: Some("a".to_string()),
            by_value_regex: Some("b".to_string()),
            ..Default::default()
        },
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}
