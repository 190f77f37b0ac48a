use crate::document::{FieldPath, MapEntry, Node, Resource};
use crate::engine::errors::SubstError;
use crate::engine::recorder::{Report, ResultRecorder};
use crate::engine::walker::{walk, Visitor};
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    /// Find fields by directive or criteria and set them.
    MatchAndSet,
    /// Inspect values and add directives or report them.
    Detect,
    /// Rewrite existing directives into another form.
    Rewrite,
}

/// Per-resource state handed to strategy hooks.
pub struct Context<'a> {
    pub file_path: &'a str,
    pub recorder: &'a mut ResultRecorder,
}

/// One function built on the shared traversal.
///
/// `visit_entry` sees every mapping entry before its value is walked, so
/// directives on keys (sequence setters) can be handled there.
pub trait Strategy {
    const KIND: StrategyKind;

    /// Whether matched fields are written.
    fn mutating(&self) -> bool;

    /// Called before each resource is walked; `false` skips it.
    fn begin_resource(&mut self, _file_path: &str) -> bool {
        true
    }

    fn visit_entry(
        &mut self,
        _entry: &mut MapEntry,
        _path: &FieldPath,
        _cx: &mut Context<'_>,
    ) -> Result<(), SubstError> {
        Ok(())
    }

    fn visit_scalar(
        &mut self,
        node: &mut Node,
        path: &FieldPath,
        cx: &mut Context<'_>,
    ) -> Result<(), SubstError>;

    fn end_resource(
        &mut self,
        _resource: &mut Resource,
        _cx: &mut Context<'_>,
    ) -> Result<(), SubstError> {
        Ok(())
    }
}

/// Adapts a [`Strategy`] to the tree [`Visitor`], locating errors.
pub struct StrategyVisitor<'a, 'c, S> {
    strategy: &'a mut S,
    cx: &'a mut Context<'c>,
}

impl<'a, 'c, S: Strategy> StrategyVisitor<'a, 'c, S> {
    pub fn new(strategy: &'a mut S, cx: &'a mut Context<'c>) -> Self {
        Self { strategy, cx }
    }
}

impl<S: Strategy> Visitor for StrategyVisitor<'_, '_, S> {
    fn visit_mapping(&mut self, node: &mut Node, path: &FieldPath) -> Result<(), SubstError> {
        let file_path = self.cx.file_path;
        if let Some(entries) = node.entries_mut() {
            for entry in entries.iter_mut().filter(|entry| !entry.value.is_alias()) {
                let child = path.field(entry.key_str());
                self.strategy
                    .visit_entry(entry, &child, self.cx)
                    .map_err(|e| e.at(file_path, &child))?;
            }
        }
        Ok(())
    }

    fn visit_scalar(&mut self, node: &mut Node, path: &FieldPath) -> Result<(), SubstError> {
        let file_path = self.cx.file_path;
        self.strategy
            .visit_scalar(node, path, self.cx)
            .map_err(|e| e.at(file_path, path))
    }
}

/// Run `strategy` over `resources`.
///
/// Resources are only updated when every resource succeeds; the first
/// error leaves them as they were. A mutating strategy walks a copy of
/// each resource and only copies that changed are kept until the commit.
pub fn run<S: Strategy>(resources: &mut [Resource], strategy: &mut S) -> Result<Report, SubstError> {
    let mut recorder = ResultRecorder::new(strategy.mutating());
    let mut staged = Vec::new();

    for (idx, resource) in resources.iter_mut().enumerate() {
        let file_path = resource.file_path().to_string();
        if !strategy.begin_resource(&file_path) {
            trace!(file = %file_path, "resource skipped");
            continue;
        }
        let mut cx = Context {
            file_path: &file_path,
            recorder: &mut recorder,
        };
        if !strategy.mutating() {
            visit_resource(resource, strategy, &mut cx)?;
            continue;
        }
        let mut working = resource.clone();
        visit_resource(&mut working, strategy, &mut cx)?;
        if working != *resource {
            staged.push((idx, working));
        }
    }

    debug!(
        kind = ?S::KIND,
        fields = recorder.len(),
        resources = staged.len(),
        "run finished"
    );
    for (idx, working) in staged {
        resources[idx] = working;
    }
    Ok(recorder.finish())
}

fn visit_resource<S: Strategy>(
    resource: &mut Resource,
    strategy: &mut S,
    cx: &mut Context<'_>,
) -> Result<(), SubstError> {
    walk(&mut resource.root, &mut StrategyVisitor::new(strategy, cx))?;
    strategy.end_resource(resource, cx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::load_str;
    use crate::engine::mutator::set_scalar;
    use crate::engine::recorder::Action;

    /// Uppercases every scalar, failing on `boom`.
    struct Upper;

    impl Strategy for Upper {
        const KIND: StrategyKind = StrategyKind::MatchAndSet;

        fn mutating(&self) -> bool {
            true
        }

        fn visit_scalar(
            &mut self,
            node: &mut Node,
            path: &FieldPath,
            cx: &mut Context<'_>,
        ) -> Result<(), SubstError> {
            let old = node.scalar_value().unwrap_or_default().to_string();
            if old == "boom" {
                return Err(SubstError::UnresolvedCaptureGroups);
            }
            let new = old.to_uppercase();
            set_scalar(node, &new)?;
            cx.recorder.record(cx.file_path, path, old, new);
            Ok(())
        }
    }

    #[test]
    fn records_every_visited_field() {
        let mut resources = load_str("a: x\nb:\n  c: y\n", "r.yaml").unwrap();
        let report = run(&mut resources, &mut Upper).unwrap();
        assert_eq!(report.action, Action::Mutated);
        let paths: Vec<_> = report.results.iter().map(|r| r.field_path.as_str()).collect();
        assert_eq!(paths, vec!["a", "b.c"]);
        assert_eq!(resources[0].root.get("a").and_then(Node::scalar_value), Some("X"));
    }

    /// Reports scalars without touching them.
    struct Count;

    impl Strategy for Count {
        const KIND: StrategyKind = StrategyKind::Detect;

        fn mutating(&self) -> bool {
            false
        }

        fn visit_scalar(
            &mut self,
            node: &mut Node,
            path: &FieldPath,
            cx: &mut Context<'_>,
        ) -> Result<(), SubstError> {
            let value = node.scalar_value().unwrap_or_default().to_string();
            cx.recorder.record(cx.file_path, path, value.clone(), value);
            Ok(())
        }
    }

    #[test]
    fn detect_runs_report_without_changes() {
        let mut resources = load_str("a: x
---
b: y
", "r.yaml").unwrap();
        let before = resources.clone();
        let report = run(&mut resources, &mut Count).unwrap();
        assert_eq!(report.action, Action::Matched);
        assert_eq!(report.count(), 2);
        assert_eq!(resources, before);
    }

    #[test]
    fn unchanged_resources_are_kept() {
        let mut resources = load_str("a: X
---
b: y
", "r.yaml").unwrap();
        let first = resources[0].clone();
        run(&mut resources, &mut Upper).unwrap();
        assert_eq!(resources[0], first);
        assert_eq!(resources[1].root.get("b").and_then(Node::scalar_value), Some("Y"));
    }

    #[test]
    fn failed_runs_leave_resources_untouched() {
        let mut resources = load_str("a: x\n---\nb: boom\n", "r.yaml").unwrap();
        let before = resources.clone();
        let err = run(&mut resources, &mut Upper).unwrap_err();
        assert_eq!(err.to_string(), "r.yaml: b: unable to resolve capture groups");
        assert_eq!(resources, before);
    }
}
