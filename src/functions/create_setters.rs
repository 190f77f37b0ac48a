use crate::config::sequence_values;
use crate::document::{inline_value, FieldPath, MapEntry, Node, Resource, Style};
use crate::engine::directive::{self, SETTER_MARKER};
use crate::engine::{run, Context, Report, Strategy, StrategyKind, SubstError};
use std::collections::BTreeMap;
use tracing::debug;

/// Adds `# kpt-set:` directives to fields whose values contain setter
/// values.
#[derive(Debug, Clone, Default)]
pub struct CreateSetters {
    /// `(name, value)`, longest value first.
    scalars: Vec<(String, String)>,
    /// Name to sorted element values.
    arrays: BTreeMap<String, Vec<String>>,
}

impl CreateSetters {
    /// Values that parse as lists are array setters. Empty values are
    /// ignored.
    pub fn new(data: &BTreeMap<String, String>) -> Self {
        let mut setters = Self::default();
        for (name, value) in data {
            match sequence_values(value) {
                Some(mut values) => {
                    values.sort();
                    setters.arrays.insert(name.clone(), values);
                }
                None if value.is_empty() => {}
                None => setters.scalars.push((name.clone(), value.clone())),
            }
        }
        setters
            .scalars
            .sort_by(|a, b| b.1.len().cmp(&a.1.len()).then_with(|| a.0.cmp(&b.0)));
        setters
    }

    /// `value` with every setter value replaced by its placeholder, or
    /// `None` when nothing matched.
    ///
    /// At each position the longest setter value wins and replaced text is
    /// not searched again.
    pub fn pattern_for(&self, value: &str) -> Option<String> {
        let mut out = String::with_capacity(value.len());
        let mut rest = value;
        let mut matched = false;
        while !rest.is_empty() {
            match self.scalars.iter().find(|(_, v)| rest.starts_with(v.as_str())) {
                Some((name, setter_value)) => {
                    out.push_str("${");
                    out.push_str(name);
                    out.push('}');
                    rest = &rest[setter_value.len()..];
                    matched = true;
                }
                None => {
                    let mut chars = rest.chars();
                    if let Some(c) = chars.next() {
                        out.push(c);
                    }
                    rest = chars.as_str();
                }
            }
        }
        matched.then_some(out)
    }

    fn contains_scalar_value(&self, value: &str) -> bool {
        self.scalars.iter().any(|(_, v)| value.contains(v.as_str()))
    }
}

impl Strategy for CreateSetters {
    const KIND: StrategyKind = StrategyKind::Detect;

    fn mutating(&self) -> bool {
        true
    }

    fn visit_entry(
        &mut self,
        entry: &mut MapEntry,
        path: &FieldPath,
        cx: &mut Context<'_>,
    ) -> Result<(), SubstError> {
        let Some(items) = entry.value.items() else {
            return Ok(());
        };
        let mut values: Vec<String> = items.iter().map(inline_value).collect();
        values.sort();
        let is_flow = entry.value.style == Style::Flow;

        // Items will get their own comments, which only a block list shows.
        if is_flow && values.iter().any(|v| self.contains_scalar_value(v)) {
            entry.value.style = Style::Folded;
        }

        let Some(name) = self
            .arrays
            .iter()
            .find(|(_, expected)| **expected == values)
            .map(|(name, _)| name.clone())
        else {
            return Ok(());
        };

        let comment = directive::format(SETTER_MARKER, &format!("${{{name}}}"));
        if values.is_empty() {
            entry.value.set_comment(&comment);
        } else {
            if entry.value.style == Style::Flow {
                entry.value.style = Style::Folded;
            }
            entry.value.comment = None;
            entry.key.set_comment(&comment);
        }
        debug!(file = cx.file_path, %path, setter = %name, "array setter created");
        let value = inline_value(&entry.value);
        cx.recorder.record(cx.file_path, path, value.clone(), value).comment = Some(comment);
        Ok(())
    }

    fn visit_scalar(
        &mut self,
        node: &mut Node,
        path: &FieldPath,
        cx: &mut Context<'_>,
    ) -> Result<(), SubstError> {
        let Some(value) = node.scalar_value().filter(|v| !v.is_empty()) else {
            return Ok(());
        };
        let Some(pattern) = self.pattern_for(value) else {
            return Ok(());
        };
        let value = value.to_string();
        let comment = directive::format(SETTER_MARKER, &pattern);
        node.set_comment(&comment);
        debug!(file = cx.file_path, %path, %pattern, "scalar setter created");
        cx.recorder.record(cx.file_path, path, value.clone(), value).comment = Some(comment);
        Ok(())
    }
}

pub fn create_setters(
    resources: &mut [Resource],
    data: &BTreeMap<String, String>,
) -> Result<Report, SubstError> {
    run(resources, &mut CreateSetters::new(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{load_str, render_documents};

    fn data(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn create(input: &str, pairs: &[(&str, &str)]) -> (String, Report) {
        let mut resources = load_str(input, "resources.yaml").unwrap();
        let report = create_setters(&mut resources, &data(pairs)).unwrap();
        (render_documents(&resources), report)
    }

    #[test]
    fn scalar_values_become_patterns() {
        let (out, report) = create(
            "spec:\n  env: dev\n  image: nginx:1.7.1\n",
            &[("image", "nginx"), ("env", "dev"), ("tag", "1.7.1")],
        );
        assert_eq!(
            out,
            "spec:\n  env: dev # kpt-set: ${env}\n  image: nginx:1.7.1 # kpt-set: ${image}:${tag}\n"
        );
        assert_eq!(report.count(), 2);
    }

    #[test]
    fn longest_value_wins_and_is_not_rescanned() {
        let setters = CreateSetters::new(&data(&[("app", "nginx"), ("short", "ngi")]));
        assert_eq!(
            setters.pattern_for("nginx-ngi").as_deref(),
            Some("${app}-${short}")
        );
        let setters = CreateSetters::new(&data(&[("image", "nginx"), ("ubuntu", "image")]));
        assert_eq!(
            setters.pattern_for("nginx-image").as_deref(),
            Some("${image}-${ubuntu}")
        );
        assert_eq!(setters.pattern_for("other"), None);
    }

    #[test]
    fn matching_block_sequence_gets_key_comment() {
        let (out, _) = create(
            "environments:\n  - stage\n  - dev\n",
            &[("env", "[dev, stage]")],
        );
        assert_eq!(out, "environments: # kpt-set: ${env}\n  - stage\n  - dev\n");
    }

    #[test]
    fn matching_flow_sequence_is_folded() {
        let (out, _) = create("env: [foo, bar]\n", &[("env", "[bar, foo]")]);
        assert_eq!(out, "env: # kpt-set: ${env}\n  - foo\n  - bar\n");
    }

    #[test]
    fn flow_sequence_with_scalar_value_is_folded_for_item_comments() {
        let (out, _) = create("env: [foo, bar]\n", &[("image", "foo")]);
        assert_eq!(out, "env:\n  - foo # kpt-set: ${image}\n  - bar\n");
    }
}
