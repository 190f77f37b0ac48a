//! Property tests for pattern resolution, derivation and the functions'
//! idempotence.

use krm_setters::config::{SearchReplaceConfig, SetterConfig};
use krm_setters::document::{load_str, render_documents};
use krm_setters::engine::graph::{
    Definition, SubstitutionGraph, SubstitutionRef, DEFINITIONS_PREFIX, SUBSTITUTION_PREFIX,
};
use krm_setters::engine::pattern::{resolve, Bindings, Pattern};
use krm_setters::engine::{ErrorKind, SubstError};
use krm_setters::functions::{apply_setters, search_replace};
use proptest::prelude::*;
use std::collections::BTreeMap;

fn value() -> impl Strategy<Value = String> {
    "[a-z0-9.]{1,10}"
}

fn name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9]{0,6}"
}

proptest! {
    #[test]
    fn fully_bound_patterns_leave_no_placeholders(
        a in value(),
        b in value(),
        prefix in "[a-z/]{0,5}",
    ) {
        let pattern = Pattern::parse(&format!("{prefix}${{a}}:${{b}}"));
        let bindings = Bindings::from([("a".to_string(), a.clone()), ("b".to_string(), b.clone())]);
        let out = resolve(&pattern, &bindings, "unrelated").unwrap();
        prop_assert_eq!(out, format!("{prefix}{a}:{b}"));
    }

    #[test]
    fn derivation_recovers_substituted_values(a in value(), b in value()) {
        let pattern = Pattern::parse("${a}:${b}-suffix");
        let bindings = Bindings::from([("a".to_string(), a), ("b".to_string(), b)]);
        let text = pattern.substitute(&bindings);
        prop_assert_eq!(pattern.derive(&text), Some(bindings));
    }

    #[test]
    fn partial_bindings_keep_derived_values(image in value(), tag in value(), new in value()) {
        let pattern = Pattern::parse("${image}:${tag}");
        let bindings = Bindings::from([("image".to_string(), new.clone())]);
        let out = resolve(&pattern, &bindings, &format!("{image}:{tag}")).unwrap();
        prop_assert_eq!(out, format!("{new}:{tag}"));
    }

    #[test]
    fn apply_setters_is_idempotent(image in value(), tag in value(), replicas in 1u32..100) {
        let input = "\
spec:
  replicas: 3 # kpt-set: ${replicas}
  image: nginx:1.7.9 # kpt-set: ${image}:${tag}
  envs: # kpt-set: ${envs}
    - dev
";
        let data = BTreeMap::from([
            ("image".to_string(), image),
            ("tag".to_string(), tag),
            ("replicas".to_string(), replicas.to_string()),
            ("envs".to_string(), "[stage, prod]".to_string()),
        ]);
        let setters = SetterConfig::from_data(&data);

        let mut resources = load_str(input, "r.yaml").unwrap();
        apply_setters(&mut resources, &setters).unwrap();
        let once = render_documents(&resources);
        apply_setters(&mut resources, &setters).unwrap();
        prop_assert_eq!(render_documents(&resources), once);
    }

    #[test]
    fn search_replace_is_idempotent(
        old in "[a-z]{1,6}",
        new in "[a-z]{1,6}",
        version in 1u32..50,
    ) {
        let input = format!(
            "spec:\n  name: {old} # note\n  image: nginx-{version}\n  other: {old}-x\n"
        );
        let configs = [
            SearchReplaceConfig {
                by_value: Some(old),
                put_value: Some(new),
                ..Default::default()
            },
            SearchReplaceConfig {
                by_value_regex: Some(r"nginx-(\d+)".to_string()),
                put_value: Some("registry/nginx-${1}".to_string()),
                ..Default::default()
            },
        ];
        for config in &configs {
            let mut resources = load_str(&input, "r.yaml").unwrap();
            search_replace(&mut resources, config).unwrap();
            let once = render_documents(&resources);
            search_replace(&mut resources, config).unwrap();
            prop_assert_eq!(render_documents(&resources), once);
        }
    }

    #[test]
    fn substitution_rings_are_cycles(names in prop::collection::btree_set(name(), 1..6)) {
        let names: Vec<String> = names.into_iter().collect();
        let definitions = names.iter().enumerate().map(|(i, name)| {
            let next = &names[(i + 1) % names.len()];
            let definition = Definition::Substitution {
                name: name.clone(),
                pattern: "X".to_string(),
                values: vec![SubstitutionRef {
                    marker: "X".to_string(),
                    reference: format!("{DEFINITIONS_PREFIX}{SUBSTITUTION_PREFIX}{next}"),
                }],
            };
            (format!("{SUBSTITUTION_PREFIX}{name}"), definition)
        });
        let mut graph = SubstitutionGraph::new(definitions);
        let err = graph.resolve(&names[0]).unwrap_err();
        prop_assert!(
            matches!(err, SubstError::CyclicSubstitution { ref name } if name == &names[0]),
            "unexpected error: {}",
            err
        );
    }

    #[test]
    fn only_single_placeholder_patterns_are_pure(
        name in name(),
        literal in "[a-z-]{1,5}",
    ) {
        let pure = format!("${{{name}}}");
        let pure_pattern = Pattern::parse(&pure);
        prop_assert_eq!(pure_pattern.pure_name(), Some(name.as_str()));
        let prefixed_pattern = Pattern::parse(&format!("{literal}{pure}"));
        prop_assert_eq!(prefixed_pattern.pure_name(), None);
        let double_pattern = Pattern::parse(&format!("{pure}${{{name}x}}"));
        prop_assert_eq!(double_pattern.pure_name(), None);

        let input = format!("envs: # kpt-set: {literal}{pure}\n  - a\n");
        let data = BTreeMap::from([(name.clone(), "[b]".to_string())]);
        let mut resources = load_str(&input, "r.yaml").unwrap();
        let err = apply_setters(&mut resources, &SetterConfig::from_data(&data)).unwrap_err();
        prop_assert_eq!(err.kind(), ErrorKind::Type);
    }
}
