use serde_yaml::Value;

/// Annotation carrying the package-relative file path of a resource.
pub const PATH_ANNOTATION: &str = "config.kubernetes.io/path";
/// Newer spelling of [`PATH_ANNOTATION`] used by recent KRM hosts.
pub const INTERNAL_PATH_ANNOTATION: &str = "internal.config.kubernetes.io/path";

pub const STR_TAG: &str = "!!str";
pub const NULL_TAG: &str = "!!null";

/// Presentation style of a node.
///
/// `Folded` is only meaningful for sequences: it renders as a block list,
/// one element per line, with the directive comment kept on the owning key.
/// The quoted styles apply to scalars and survive value changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Style {
    #[default]
    Block,
    Flow,
    Folded,
    DoubleQuoted,
    SingleQuoted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scalar {
    pub value: String,
    /// Explicit tag. `None` lets the emitter infer the type from the literal.
    pub tag: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Mapping(Vec<MapEntry>),
    Sequence(Vec<Node>),
    Scalar(Scalar),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapEntry {
    pub key: Node,
    pub value: Node,
}

impl MapEntry {
    pub fn new(key: impl Into<String>, value: Node) -> Self {
        Self {
            key: Node::scalar(key),
            value,
        }
    }

    /// Key text, or an empty string for complex (non-scalar) keys.
    pub fn key_str(&self) -> &str {
        self.key.scalar_value().unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub kind: NodeKind,
    /// Line comment, always stored with its leading `#`.
    pub comment: Option<String>,
    /// Comment lines directly above the node, joined with newlines.
    pub head_comment: Option<String>,
    pub style: Style,
    /// `&name` declared on the node.
    pub anchor: Option<String>,
    /// Set when the node was written as `*name`. The node then holds a
    /// resolved copy that is rendered as the alias and never traversed.
    pub alias: Option<String>,
}

impl Node {
    fn with_kind(kind: NodeKind) -> Self {
        Self {
            kind,
            comment: None,
            head_comment: None,
            style: Style::Block,
            anchor: None,
            alias: None,
        }
    }

    pub fn scalar(value: impl Into<String>) -> Self {
        Self::with_kind(NodeKind::Scalar(Scalar {
            value: value.into(),
            tag: None,
        }))
    }

    pub fn tagged_scalar(value: impl Into<String>, tag: impl Into<String>) -> Self {
        Self::with_kind(NodeKind::Scalar(Scalar {
            value: value.into(),
            tag: Some(tag.into()),
        }))
    }

    pub fn null() -> Self {
        Self::tagged_scalar("", NULL_TAG)
    }

    pub fn mapping(entries: Vec<MapEntry>) -> Self {
        Self::with_kind(NodeKind::Mapping(entries))
    }

    pub fn sequence(items: Vec<Node>) -> Self {
        Self::with_kind(NodeKind::Sequence(items))
    }

    pub fn with_comment(mut self, comment: impl AsRef<str>) -> Self {
        self.set_comment(comment);
        self
    }

    pub fn with_style(mut self, style: Style) -> Self {
        self.style = style;
        self
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self.kind, NodeKind::Scalar(_))
    }

    pub fn is_mapping(&self) -> bool {
        matches!(self.kind, NodeKind::Mapping(_))
    }

    pub fn is_sequence(&self) -> bool {
        matches!(self.kind, NodeKind::Sequence(_))
    }

    pub fn is_alias(&self) -> bool {
        self.alias.is_some()
    }

    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            NodeKind::Mapping(_) => "mapping",
            NodeKind::Sequence(_) => "sequence",
            NodeKind::Scalar(_) => "scalar",
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match &self.kind {
            NodeKind::Scalar(scalar) => Some(scalar),
            _ => None,
        }
    }

    pub fn scalar_value(&self) -> Option<&str> {
        self.as_scalar().map(|s| s.value.as_str())
    }

    pub fn entries(&self) -> Option<&[MapEntry]> {
        match &self.kind {
            NodeKind::Mapping(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn entries_mut(&mut self) -> Option<&mut Vec<MapEntry>> {
        match &mut self.kind {
            NodeKind::Mapping(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn items(&self) -> Option<&[Node]> {
        match &self.kind {
            NodeKind::Sequence(items) => Some(items),
            _ => None,
        }
    }

    pub fn items_mut(&mut self) -> Option<&mut Vec<Node>> {
        match &mut self.kind {
            NodeKind::Sequence(items) => Some(items),
            _ => None,
        }
    }

    /// Look up a mapping field by key.
    pub fn get(&self, key: &str) -> Option<&Node> {
        self.entries()?
            .iter()
            .find(|entry| entry.key_str() == key)
            .map(|entry| &entry.value)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Node> {
        self.entries_mut()?
            .iter_mut()
            .find(|entry| entry.key_str() == key)
            .map(|entry| &mut entry.value)
    }

    /// Look up a mapping field, inserting `default()` when absent.
    ///
    /// Returns `None` if `self` is not a mapping.
    pub fn field_or_insert_with(
        &mut self,
        key: &str,
        default: impl FnOnce() -> Node,
    ) -> Option<&mut Node> {
        let entries = self.entries_mut()?;
        let idx = match entries.iter().position(|entry| entry.key_str() == key) {
            Some(idx) => idx,
            None => {
                entries.push(MapEntry::new(key, default()));
                entries.len() - 1
            }
        };
        Some(&mut entries[idx].value)
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    /// Set the line comment, adding the leading `# ` when missing.
    pub fn set_comment(&mut self, comment: impl AsRef<str>) {
        self.comment = Some(normalize_comment(comment.as_ref()));
    }

    /// Build a node tree from a parsed YAML value.
    ///
    /// Strings that would not read back as the same string when written
    /// plain (e.g. a quoted `"3"`) keep an explicit `!!str` tag.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Null => Self::null(),
            Value::Bool(b) => Self::scalar(b.to_string()),
            Value::Number(n) => Self::scalar(n.to_string()),
            Value::String(s) => {
                if reads_back_as_string(&s) {
                    Self::scalar(s)
                } else {
                    Self::tagged_scalar(s, STR_TAG)
                }
            }
            Value::Sequence(items) => {
                Self::sequence(items.into_iter().map(Self::from_value).collect())
            }
            Value::Mapping(map) => Self::mapping(
                map.into_iter()
                    .map(|(key, value)| MapEntry {
                        key: Self::from_value(key),
                        value: Self::from_value(value),
                    })
                    .collect(),
            ),
            Value::Tagged(tagged) => {
                let tag = tagged.tag.to_string();
                let mut node = Self::from_value(tagged.value);
                if let NodeKind::Scalar(scalar) = &mut node.kind {
                    scalar.tag = Some(tag);
                }
                node
            }
        }
    }
}

/// True when `s` written as a plain scalar parses back to the same string.
pub(crate) fn reads_back_as_string(s: &str) -> bool {
    if s.is_empty() || s.contains('\n') {
        return false;
    }
    matches!(serde_yaml::from_str::<Value>(s), Ok(Value::String(parsed)) if parsed == s)
}

pub(crate) fn normalize_comment(comment: &str) -> String {
    let trimmed = comment.trim();
    if trimmed.starts_with('#') {
        trimmed.to_string()
    } else {
        format!("# {trimmed}")
    }
}

/// One top-level KRM resource together with the file it was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub root: Node,
    pub source_path: String,
    /// Comment lines after the last field of the document.
    pub trailing_comment: Option<String>,
}

impl Resource {
    pub fn new(root: Node, source_path: impl Into<String>) -> Self {
        Self {
            root,
            source_path: source_path.into(),
            trailing_comment: None,
        }
    }

    /// File path used for results and `by-file-path` matching.
    ///
    /// The path annotation wins over the path the resource was loaded from.
    pub fn file_path(&self) -> &str {
        self.annotation(INTERNAL_PATH_ANNOTATION)
            .or_else(|| self.annotation(PATH_ANNOTATION))
            .unwrap_or(&self.source_path)
    }

    pub fn kind(&self) -> Option<&str> {
        self.root.get("kind")?.scalar_value()
    }

    pub fn name(&self) -> Option<&str> {
        self.root.get("metadata")?.get("name")?.scalar_value()
    }

    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.root
            .get("metadata")?
            .get("annotations")?
            .get(key)?
            .scalar_value()
    }

    /// Set an annotation, creating `metadata.annotations` as needed.
    ///
    /// Returns `false` when the resource root or `metadata` is not a mapping.
    pub fn set_annotation(&mut self, key: &str, value: impl Into<String>) -> bool {
        let Some(metadata) = self
            .root
            .field_or_insert_with("metadata", || Node::mapping(Vec::new()))
        else {
            return false;
        };
        let Some(annotations) =
            metadata.field_or_insert_with("annotations", || Node::mapping(Vec::new()))
        else {
            return false;
        };
        match annotations.field_or_insert_with(key, Node::null) {
            Some(slot) => {
                let comment = slot.comment.take();
                *slot = Node::scalar(value);
                slot.comment = comment;
                true
            }
            None => false,
        }
    }
}
