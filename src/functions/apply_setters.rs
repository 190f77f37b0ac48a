use crate::config::SetterConfig;
use crate::document::{inline_value, FieldPath, MapEntry, Node, Resource};
use crate::engine::directive::{extract, SETTER_MARKER};
use crate::engine::mutator::{set_scalar, set_sequence};
use crate::engine::pattern::{resolve, Pattern};
use crate::engine::{run, Context, Report, Strategy, StrategyKind, SubstError};
use tracing::{debug, trace};

/// Resolves `# kpt-set:` directives against setter values.
#[derive(Debug, Clone)]
pub struct ApplySetters {
    setters: SetterConfig,
}

impl ApplySetters {
    pub fn new(setters: SetterConfig) -> Self {
        Self { setters }
    }

    /// True when the pattern names at least one supplied setter.
    fn applies(&self, pattern: &Pattern) -> bool {
        pattern
            .placeholders()
            .iter()
            .any(|name| self.setters.contains(name))
    }

    /// List literal for an array directive.
    fn sequence_literal(&self, name: &str) -> Option<&str> {
        self.setters
            .arrays
            .get(name)
            .map(|array| array.literal.as_str())
            .or_else(|| self.setters.scalars.get(name).map(String::as_str))
    }
}

impl Strategy for ApplySetters {
    const KIND: StrategyKind = StrategyKind::MatchAndSet;

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
        let comment = entry.key.comment().or(entry.value.comment());
        let Some(directive) = extract(comment, SETTER_MARKER) else {
            return Ok(());
        };
        let pattern = Pattern::parse(directive);
        if !self.applies(&pattern) {
            trace!(%path, pattern = %pattern, "no supplied setter for sequence");
            return Ok(());
        }
        let name = pattern.pure_name().ok_or_else(|| SubstError::ImpureArrayPattern {
            pattern: pattern.to_string(),
        })?;
        let Some(literal) = self.sequence_literal(name) else {
            return Ok(());
        };

        let old = inline_value(&entry.value);
        set_sequence(&mut entry.value, literal)?;
        let new = inline_value(&entry.value);
        debug!(file = cx.file_path, %path, setter = name, "set sequence");
        cx.recorder.record(cx.file_path, path, old, new);
        Ok(())
    }

    fn visit_scalar(
        &mut self,
        node: &mut Node,
        path: &FieldPath,
        cx: &mut Context<'_>,
    ) -> Result<(), SubstError> {
        let Some(directive) = extract(node.comment(), SETTER_MARKER) else {
            return Ok(());
        };
        let pattern = Pattern::parse(directive);
        if !self.applies(&pattern) {
            trace!(%path, pattern = %pattern, "no supplied setter for scalar");
            return Ok(());
        }
        if let Some(name) = pattern
            .placeholders()
            .into_iter()
            .find(|name| self.setters.arrays.contains_key(*name))
        {
            return Err(SubstError::ArraySetterInScalar {
                name: name.to_string(),
            });
        }

        let old = node.scalar_value().unwrap_or_default().to_string();
        let new = resolve(&pattern, &self.setters.scalars, &old)?;
        set_scalar(node, &new)?;
        debug!(file = cx.file_path, %path, value = %new, "set scalar");
        cx.recorder.record(cx.file_path, path, old, new);
        Ok(())
    }
}

pub fn apply_setters(
    resources: &mut [Resource],
    setters: &SetterConfig,
) -> Result<Report, SubstError> {
    run(resources, &mut ApplySetters::new(setters.clone()))
}
