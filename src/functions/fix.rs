use crate::document::{inline_value, FieldPath, MapEntry, Node, Resource};
use crate::engine::directive::{self, SETTER_MARKER};
use crate::engine::graph::{Definition, SubstitutionGraph, DEFINITIONS_PREFIX};
use crate::engine::{run, Context, Report, Strategy, StrategyKind, SubstError};
use serde_json::Value;
use tracing::{debug, trace};

/// Reference carried by a legacy setter comment.
#[derive(Debug, Clone, PartialEq, Eq)]
enum LegacyComment {
    /// `{"$kpt-set":"name"}`
    ShortHand(String),
    /// `{"$ref":"#/definitions/<key>"}`
    Ref(String),
}

impl LegacyComment {
    fn parse(comment: &str) -> Option<Self> {
        let body = comment.trim().trim_start_matches('#').trim();
        if !body.starts_with('{') {
            return None;
        }
        let object: Value = serde_json::from_str(body).ok()?;
        let text = |key: &str| {
            object
                .get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        text("$kpt-set")
            .map(LegacyComment::ShortHand)
            .or_else(|| text("$ref").map(LegacyComment::Ref))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    Setter(String),
    Substitution(String),
}

/// Migrates legacy `{"$kpt-set":...}` / `{"$ref":...}` comments to
/// `# kpt-set:` patterns, expanding substitutions through the graph.
#[derive(Debug, Clone, Default)]
pub struct Fix {
    graph: SubstitutionGraph,
}

impl Fix {
    pub fn new(graph: SubstitutionGraph) -> Self {
        Self { graph }
    }

    /// Setter names win over substitution names in the short-hand form.
    fn target(&self, legacy: &LegacyComment) -> Option<Target> {
        let definition = match legacy {
            LegacyComment::ShortHand(name) => self
                .graph
                .setter(name)
                .or_else(|| self.graph.substitution(name))?,
            LegacyComment::Ref(reference) => self
                .graph
                .get(reference.strip_prefix(DEFINITIONS_PREFIX)?)?,
        };
        Some(match definition {
            Definition::Setter { name, .. } => Target::Setter(name.clone()),
            Definition::Substitution { name, .. } => Target::Substitution(name.clone()),
        })
    }
}

impl Strategy for Fix {
    const KIND: StrategyKind = StrategyKind::Rewrite;

    fn mutating(&self) -> bool {
        true
    }

    fn visit_entry(
        &mut self,
        entry: &mut MapEntry,
        path: &FieldPath,
        cx: &mut Context<'_>,
    ) -> Result<(), SubstError> {
        if !entry.value.is_sequence() {
            return Ok(());
        }
        let Some(legacy) = entry.key.comment().and_then(LegacyComment::parse) else {
            return Ok(());
        };
        let name = match (&legacy, self.target(&legacy)) {
            (_, Some(Target::Setter(name))) => name,
            (LegacyComment::ShortHand(name), _) => name.clone(),
            _ => {
                trace!(%path, "legacy sequence comment without setter definition");
                return Ok(());
            }
        };
        let comment = directive::format(SETTER_MARKER, &format!("${{{name}}}"));
        entry.key.set_comment(&comment);
        debug!(file = cx.file_path, %path, setter = %name, "fixed sequence setter");
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
        let Some(legacy) = node.comment().and_then(LegacyComment::parse) else {
            return Ok(());
        };
        let pattern = match self.target(&legacy) {
            Some(Target::Setter(name)) => format!("${{{name}}}"),
            Some(Target::Substitution(name)) => self.graph.resolve(&name)?,
            None => {
                trace!(%path, ?legacy, "legacy comment without definition");
                return Ok(());
            }
        };
        let comment = directive::format(SETTER_MARKER, &pattern);
        node.set_comment(&comment);
        debug!(file = cx.file_path, %path, %pattern, "fixed setter comment");
        let value = node.scalar_value().unwrap_or_default().to_string();
        cx.recorder.record(cx.file_path, path, value.clone(), value).comment = Some(comment);
        Ok(())
    }
}

pub fn fix(resources: &mut [Resource], graph: SubstitutionGraph) -> Result<Report, SubstError> {
    run(resources, &mut Fix::new(graph))
}
