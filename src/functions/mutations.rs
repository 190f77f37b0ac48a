use crate::document::{FieldPath, Node, Resource};
use crate::engine::directive::{extract, MUTATION_MARKER};
use crate::engine::mutator::set_scalar;
use crate::engine::{run, Context, Report, Strategy, StrategyKind, SubstError};
use regex::{Captures, Regex};
use serde::Serialize;
use tracing::debug;

pub const MUTATION_ANNOTATION: &str = "config.kubernetes.io/apply-time-mutation";

const REFERENCE_PATTERN: &str = r"\$\{(?P<group>[^/]+)/((?P<version>[^/]+)/)?namespaces/(?P<namespace>[^/]+)/(?P<kind>[^/]+)/(?P<name>[^:]+):(?P<path>[^}]+)\}";

/// Object a mutation reads its value from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceRef {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    pub kind: String,
    pub name: String,
    pub namespace: String,
}

/// One entry of the apply-time-mutation annotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSubstitution {
    pub source_path: String,
    pub source_ref: SourceRef,
    pub target_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// Turns `# apply-time-mutation:` directives into the
/// `config.kubernetes.io/apply-time-mutation` annotation.
#[derive(Debug, Clone)]
pub struct AnnotateMutations {
    reference: Regex,
    pending: Vec<FieldSubstitution>,
}

impl AnnotateMutations {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            reference: Regex::new(REFERENCE_PATTERN)?,
            pending: Vec::new(),
        })
    }

    fn source(caps: &Captures<'_>) -> (SourceRef, String) {
        let get = |name: &str| caps.name(name).map_or("", |m| m.as_str()).to_string();
        let group = get("group");
        let (api_version, group) = match caps.name("version") {
            Some(version) => (Some(format!("{group}/{}", version.as_str())), None),
            None => (None, Some(group)),
        };
        let source = SourceRef {
            api_version,
            group,
            kind: get("kind"),
            name: get("name"),
            namespace: get("namespace"),
        };
        (source, get("path"))
    }

    /// Whether `text` is a single reference and nothing else.
    fn is_only_reference(&self, text: &str) -> bool {
        self.reference
            .find(text)
            .is_some_and(|m| m.start() == 0 && m.end() == text.len())
    }
}

impl Strategy for AnnotateMutations {
    const KIND: StrategyKind = StrategyKind::Rewrite;

    fn mutating(&self) -> bool {
        true
    }

    fn begin_resource(&mut self, _file_path: &str) -> bool {
        self.pending.clear();
        true
    }

    fn visit_scalar(
        &mut self,
        node: &mut Node,
        path: &FieldPath,
        cx: &mut Context<'_>,
    ) -> Result<(), SubstError> {
        let Some(text) = extract(node.comment(), MUTATION_MARKER) else {
            return Ok(());
        };
        if !self.reference.is_match(text) {
            return Err(SubstError::MissingMutationReference);
        }
        let target_path = format!("$.{path}");
        let tokenize = !self.is_only_reference(text);

        let mut found = Vec::new();
        let tokenized = self.reference.replace_all(text, |caps: &Captures<'_>| {
            let (source_ref, source_path) = Self::source(caps);
            let token = format!("$ref{}", self.pending.len() + found.len());
            found.push(FieldSubstitution {
                source_path,
                source_ref,
                target_path: target_path.clone(),
                token: tokenize.then(|| token.clone()),
            });
            token
        });

        let old = node.scalar_value().unwrap_or_default().to_string();
        let new = if tokenize {
            let tokenized = tokenized.into_owned();
            set_scalar(node, &tokenized)?;
            tokenized
        } else {
            old.clone()
        };
        debug!(file = cx.file_path, %path, references = found.len(), "apply-time mutation");
        self.pending.append(&mut found);
        cx.recorder.record(cx.file_path, path, old, new).comment = node.comment.clone();
        Ok(())
    }

    fn end_resource(
        &mut self,
        resource: &mut Resource,
        cx: &mut Context<'_>,
    ) -> Result<(), SubstError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let annotation = serde_yaml::to_string(&self.pending)?;
        if !resource.set_annotation(MUTATION_ANNOTATION, annotation) {
            return Err(SubstError::KindMismatch {
                expected: "mapping",
                found: resource.root.kind_name(),
            }
            .at(cx.file_path, "metadata.annotations"));
        }
        debug!(file = cx.file_path, mutations = self.pending.len(), "wrote annotation");
        self.pending.clear();
        Ok(())
    }
}

pub fn annotate_mutations(resources: &mut [Resource]) -> Result<Report, SubstError> {
    run(resources, &mut AnnotateMutations::new()?)
}
