use crate::engine::errors::SubstError;
use std::collections::{BTreeMap, HashMap};
use tracing::trace;

/// Prefix of `$ref` values pointing into the definitions table.
pub const DEFINITIONS_PREFIX: &str = "#/definitions/";
pub const SETTER_PREFIX: &str = "io.k8s.cli.setters.";
pub const SUBSTITUTION_PREFIX: &str = "io.k8s.cli.substitutions.";

/// One entry of a definitions table, keyed by its definition key
/// (e.g. `io.k8s.cli.setters.image`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Definition {
    Setter {
        name: String,
        value: String,
        /// Current setter value to the text written in its place.
        enum_values: BTreeMap<String, String>,
    },
    Substitution {
        name: String,
        pattern: String,
        values: Vec<SubstitutionRef>,
    },
}

impl Definition {
    pub fn name(&self) -> &str {
        match self {
            Definition::Setter { name, .. } | Definition::Substitution { name, .. } => name,
        }
    }
}

/// A marker inside a substitution pattern and the definition it stands for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubstitutionRef {
    pub marker: String,
    pub reference: String,
}

/// Nested substitution definitions, expanded into `${setter}` patterns.
///
/// Resolution is a depth-first walk over the reference DAG. A name seen
/// again on the active path is a cycle; finished substitutions are
/// memoized so shared sub-references expand once.
#[derive(Debug, Clone, Default)]
pub struct SubstitutionGraph {
    definitions: BTreeMap<String, Definition>,
    memo: HashMap<String, String>,
}

impl SubstitutionGraph {
    pub fn new(definitions: impl IntoIterator<Item = (String, Definition)>) -> Self {
        Self {
            definitions: definitions.into_iter().collect(),
            memo: HashMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Definition> {
        self.definitions.get(key)
    }

    pub fn setter(&self, name: &str) -> Option<&Definition> {
        self.definitions.get(&format!("{SETTER_PREFIX}{name}"))
    }

    pub fn substitution(&self, name: &str) -> Option<&Definition> {
        self.definitions.get(&format!("{SUBSTITUTION_PREFIX}{name}"))
    }

    pub fn definitions(&self) -> impl Iterator<Item = (&str, &Definition)> {
        self.definitions.iter().map(|(key, def)| (key.as_str(), def))
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Expand the substitution called `name` into a setter pattern.
    pub fn resolve(&mut self, name: &str) -> Result<String, SubstError> {
        let key = format!("{SUBSTITUTION_PREFIX}{name}");
        let mut active = Vec::new();
        self.resolve_key(&key, &mut active)
    }

    fn resolve_key(&mut self, key: &str, active: &mut Vec<String>) -> Result<String, SubstError> {
        if let Some(done) = self.memo.get(key) {
            return Ok(done.clone());
        }
        let definition = self
            .definitions
            .get(key)
            .cloned()
            .ok_or_else(|| SubstError::NotFound {
                reference: key.to_string(),
            })?;
        let (name, pattern, values) = match definition {
            Definition::Substitution {
                name,
                pattern,
                values,
            } => (name, pattern, values),
            Definition::Setter {
                name,
                value,
                enum_values,
            } => {
                return Ok(enum_values
                    .get(&value)
                    .cloned()
                    .unwrap_or_else(|| format!("${{{name}}}")))
            }
        };

        if active.contains(&name) {
            return Err(SubstError::CyclicSubstitution { name });
        }
        active.push(name.clone());

        let mut replacements = Vec::with_capacity(values.len());
        for value in &values {
            if value.reference.is_empty() {
                return Err(SubstError::MissingReference { name });
            }
            let target = value
                .reference
                .strip_prefix(DEFINITIONS_PREFIX)
                .filter(|target| self.definitions.contains_key(*target))
                .ok_or_else(|| SubstError::NotFound {
                    reference: value.reference.clone(),
                })?;
            let replacement = self.resolve_key(target, active)?;
            replacements.push((value.marker.as_str(), replacement));
        }

        active.pop();
        let resolved = replace_markers(&pattern, &replacements);
        trace!(substitution = %name, pattern = %resolved, "resolved substitution");
        self.memo.insert(key.to_string(), resolved.clone());
        Ok(resolved)
    }
}

/// Single left-to-right pass; inserted text is not searched for markers.
/// At a given position the longest marker wins.
fn replace_markers(pattern: &str, replacements: &[(&str, String)]) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut rest = pattern;
    'scan: while !rest.is_empty() {
        let best = replacements
            .iter()
            .filter(|(marker, _)| !marker.is_empty() && rest.starts_with(*marker))
            .max_by_key(|(marker, _)| marker.len());
        if let Some((marker, replacement)) = best {
            out.push_str(replacement);
            rest = &rest[marker.len()..];
            continue 'scan;
        }
        let mut chars = rest.chars();
        if let Some(c) = chars.next() {
            out.push(c);
        }
        rest = chars.as_str();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setter(name: &str, value: &str) -> (String, Definition) {
        (
            format!("{SETTER_PREFIX}{name}"),
            Definition::Setter {
                name: name.to_string(),
                value: value.to_string(),
                enum_values: BTreeMap::new(),
            },
        )
    }

    fn substitution(name: &str, pattern: &str, refs: &[(&str, &str)]) -> (String, Definition) {
        (
            format!("{SUBSTITUTION_PREFIX}{name}"),
            Definition::Substitution {
                name: name.to_string(),
                pattern: pattern.to_string(),
                values: refs
                    .iter()
                    .map(|(marker, key)| SubstitutionRef {
                        marker: marker.to_string(),
                        reference: if key.is_empty() {
                            String::new()
                        } else {
                            format!("{DEFINITIONS_PREFIX}{key}")
                        },
                    })
                    .collect(),
            },
        )
    }

    #[test]
    fn nested_substitutions_expand_to_setter_patterns() {
        let mut graph = SubstitutionGraph::new([
            setter("project", "my-project"),
            setter("tag", "v1"),
            substitution(
                "image",
                "gcr.io/PROJECT/app",
                &[("PROJECT", "io.k8s.cli.setters.project")],
            ),
            substitution(
                "image-tag",
                "IMAGE:TAG",
                &[
                    ("IMAGE", "io.k8s.cli.substitutions.image"),
                    ("TAG", "io.k8s.cli.setters.tag"),
                ],
            ),
        ]);
        assert_eq!(
            graph.resolve("image-tag").unwrap(),
            "gcr.io/${project}/app:${tag}"
        );
    }

    #[test]
    fn enum_values_replace_the_placeholder() {
        let (key, _) = setter("size", "small");
        let mut graph = SubstitutionGraph::new([
            (
                key,
                Definition::Setter {
                    name: "size".to_string(),
                    value: "small".to_string(),
                    enum_values: BTreeMap::from([("small".to_string(), "1Gi".to_string())]),
                },
            ),
            substitution("mem", "SIZE-mem", &[("SIZE", "io.k8s.cli.setters.size")]),
        ]);
        assert_eq!(graph.resolve("mem").unwrap(), "1Gi-mem");
    }

    #[test]
    fn cycles_are_detected() {
        let mut graph = SubstitutionGraph::new([
            substitution("a", "A", &[("A", "io.k8s.cli.substitutions.b")]),
            substitution("b", "B", &[("B", "io.k8s.cli.substitutions.a")]),
        ]);
        let err = graph.resolve("a").unwrap_err();
        assert_eq!(err.to_string(), "cyclic substitution detected with name a");
    }

    #[test]
    fn shared_references_are_not_cycles() {
        let mut graph = SubstitutionGraph::new([
            setter("x", "1"),
            substitution("leaf", "L", &[("L", "io.k8s.cli.setters.x")]),
            substitution(
                "root",
                "A-B",
                &[
                    ("A", "io.k8s.cli.substitutions.leaf"),
                    ("B", "io.k8s.cli.substitutions.leaf"),
                ],
            ),
        ]);
        assert_eq!(graph.resolve("root").unwrap(), "${x}-${x}");
    }

    #[test]
    fn missing_references_are_not_found_errors() {
        let mut graph = SubstitutionGraph::new([substitution("a", "A", &[("A", "")])]);
        let err = graph.resolve("a").unwrap_err();
        assert_eq!(err.to_string(), "missing reference on substitution a");

        let mut graph = SubstitutionGraph::new([substitution(
            "a",
            "A",
            &[("A", "io.k8s.cli.setters.nope")],
        )]);
        assert!(matches!(
            graph.resolve("a").unwrap_err(),
            SubstError::NotFound { .. }
        ));
        assert!(matches!(
            graph.resolve("missing").unwrap_err(),
            SubstError::NotFound { .. }
        ));
    }

    #[test]
    fn inserted_text_is_not_rescanned_for_markers() {
        assert_eq!(
            replace_markers("A-B", &[("A", "B".to_string()), ("B", "x".to_string())]),
            "B-x"
        );
        assert_eq!(
            replace_markers("TAGS", &[("TAG", "1".to_string()), ("TAGS", "2".to_string())]),
            "2"
        );
    }
}
