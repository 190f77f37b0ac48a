use crate::config::SearchReplaceConfig;
use crate::document::node::normalize_comment;
use crate::document::{
    inline_value, FieldPath, MapEntry, Node, NodeKind, Resource, Segment, Style, NULL_TAG,
};
use crate::engine::matcher::MatchCriteria;
use crate::engine::mutator::set_scalar;
use crate::engine::pattern::resolve_capture_groups;
use crate::engine::{run, Context, Report, Strategy, StrategyKind, SubstError};
use tracing::debug;

/// Matches fields by value, value regex, path and file glob, optionally
/// writing a value or a comment to each match.
#[derive(Debug, Clone)]
pub struct SearchReplace {
    criteria: MatchCriteria,
    put_value: Option<String>,
    put_comment: Option<String>,
    /// Target created when a resource has no match.
    create_path: Option<FieldPath>,
    matched: usize,
}

impl SearchReplace {
    pub fn new(config: &SearchReplaceConfig) -> Result<Self, SubstError> {
        config.validate()?;
        let criteria = MatchCriteria::from_config(config)?;
        let create_path = match (&config.put_value, &criteria.value, &criteria.path) {
            (Some(_), None, Some(pattern)) => pattern.to_field_path(),
            _ => None,
        };
        Ok(Self {
            criteria,
            put_value: config.put_value.clone(),
            put_comment: config.put_comment.clone(),
            create_path,
            matched: 0,
        })
    }

    fn put_by_path(
        &self,
        resource: &mut Resource,
        path: &FieldPath,
        value: &str,
    ) -> Result<bool, SubstError> {
        let mut root = resource.root.clone();
        let Some(slot) = create_field(&mut root, path) else {
            return Ok(false);
        };
        set_scalar(slot, value)?;
        if let Some(comment) = &self.put_comment {
            slot.set_comment(comment);
        }
        resource.root = root;
        Ok(true)
    }
}

impl Strategy for SearchReplace {
    const KIND: StrategyKind = StrategyKind::MatchAndSet;

    fn mutating(&self) -> bool {
        self.put_value.is_some() || self.put_comment.is_some()
    }

    fn begin_resource(&mut self, file_path: &str) -> bool {
        self.matched = 0;
        self.criteria.matches_file(file_path)
    }

    fn visit_entry(
        &mut self,
        entry: &mut MapEntry,
        path: &FieldPath,
        cx: &mut Context<'_>,
    ) -> Result<(), SubstError> {
        let Some(comment) = &self.put_comment else {
            return Ok(());
        };
        let is_filled_sequence = entry.value.items().is_some_and(|items| !items.is_empty());
        if !is_filled_sequence || !self.criteria.matches_path(path) {
            return Ok(());
        }

        entry.key.set_comment(comment);
        entry.value.comment = None;
        entry.value.style = Style::Folded;
        self.matched += 1;

        let value = inline_value(&entry.value);
        debug!(file = cx.file_path, %path, "comment on sequence");
        cx.recorder.record(cx.file_path, path, value.clone(), value).comment =
            entry.key.comment.clone();
        Ok(())
    }

    fn visit_scalar(
        &mut self,
        node: &mut Node,
        path: &FieldPath,
        cx: &mut Context<'_>,
    ) -> Result<(), SubstError> {
        if !self.criteria.matches(node, path, cx.file_path) {
            return Ok(());
        }
        self.matched += 1;

        let old = node.scalar_value().unwrap_or_default().to_string();
        let regex = self.criteria.regex();
        let comment = self
            .put_comment
            .as_deref()
            .map(|template| resolve_capture_groups(template, regex, &old))
            .transpose()?;
        let new = match &self.put_value {
            Some(template) => resolve_capture_groups(template, regex, &old)?,
            None => old.clone(),
        };

        if self.put_value.is_some() {
            set_scalar(node, &new)?;
        }
        if let Some(comment) = &comment {
            node.set_comment(comment);
        }
        debug!(file = cx.file_path, %path, value = %new, "matched");
        cx.recorder.record(cx.file_path, path, old, new).comment =
            comment.is_some().then(|| node.comment.clone()).flatten();
        Ok(())
    }

    fn end_resource(
        &mut self,
        resource: &mut Resource,
        cx: &mut Context<'_>,
    ) -> Result<(), SubstError> {
        let (Some(path), Some(value)) = (&self.create_path, &self.put_value) else {
            return Ok(());
        };
        if self.matched > 0 {
            return Ok(());
        }
        if self.put_by_path(resource, path, value)? {
            debug!(file = cx.file_path, %path, "created field");
            cx.recorder.record(cx.file_path, path, "", value.as_str()).comment = self
                .put_comment
                .as_deref()
                .map(normalize_comment);
        }
        Ok(())
    }
}

/// Walk to `path`, creating missing mapping fields on the way.
///
/// Indexes must already exist and the target must be new or an empty
/// scalar. Returns `None` without a usable slot; `root` may then hold
/// partially created fields, so callers work on a copy.
fn create_field<'a>(root: &'a mut Node, path: &FieldPath) -> Option<&'a mut Node> {
    let (last, parents) = path.segments().split_last()?;
    let Segment::Field(leaf) = last else {
        return None;
    };
    let mut node = root;
    for segment in parents {
        if node.is_alias() {
            return None;
        }
        node = match segment {
            Segment::Field(name) => {
                promote_null(node);
                node.field_or_insert_with(name, || Node::mapping(Vec::new()))?
            }
            Segment::Index(idx) => node.items_mut()?.get_mut(*idx)?,
        };
    }
    if node.is_alias() {
        return None;
    }
    promote_null(node);
    let slot = node.field_or_insert_with(leaf, Node::null)?;
    (slot.is_scalar() && !slot.is_alias()).then_some(slot)
}

/// `key:` with no value becomes an empty mapping so fields can be added.
fn promote_null(node: &mut Node) {
    let is_null = node
        .as_scalar()
        .is_some_and(|s| s.value.is_empty() && s.tag.as_deref() == Some(NULL_TAG));
    if is_null {
        node.kind = NodeKind::Mapping(Vec::new());
    }
}

pub fn search_replace(
    resources: &mut [Resource],
    config: &SearchReplaceConfig,
) -> Result<Report, SubstError> {
    run(resources, &mut SearchReplace::new(config)?)
}
