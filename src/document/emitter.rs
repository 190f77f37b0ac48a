use crate::document::node::{MapEntry, Node, NodeKind, Resource, Scalar, Style, NULL_TAG, STR_TAG};
use serde_yaml::Value;

const INDENT: usize = 2;

/// Render resources as a multi-document YAML stream.
pub fn render_documents<'a>(resources: impl IntoIterator<Item = &'a Resource>) -> String {
    resources
        .into_iter()
        .map(render_resource)
        .collect::<Vec<_>>()
        .join("---\n")
}

pub fn render_resource(resource: &Resource) -> String {
    let mut emitter = Emitter::default();
    emitter.block(&resource.root, 0);
    if let Some(trailing) = &resource.trailing_comment {
        emitter.head(Some(trailing), 0);
    }
    emitter.out
}

/// Single-line flow rendering, e.g. `[stage, prod]`.
pub fn render_flow(node: &Node) -> String {
    if let Some(alias) = &node.alias {
        return format!("*{alias}");
    }
    let body = match &node.kind {
        NodeKind::Scalar(scalar) => scalar_text(node, scalar, true),
        NodeKind::Sequence(items) => {
            let items: Vec<String> = items.iter().map(render_flow).collect();
            format!("[{}]", items.join(", "))
        }
        NodeKind::Mapping(entries) => {
            let entries: Vec<String> = entries
                .iter()
                .map(|entry| format!("{}: {}", render_flow(&entry.key), render_flow(&entry.value)))
                .collect();
            format!("{{{}}}", entries.join(", "))
        }
    };
    match &node.anchor {
        Some(anchor) if body.is_empty() => format!("&{anchor}"),
        Some(anchor) => format!("&{anchor} {body}"),
        None => body,
    }
}

/// `&name ` for anchored block nodes, written before the block indicator.
fn anchor_prefix(node: &Node) -> String {
    node.anchor
        .as_deref()
        .map(|anchor| format!("&{anchor} "))
        .unwrap_or_default()
}

/// Value as shown in results: raw text for scalars, flow YAML otherwise.
pub fn inline_value(node: &Node) -> String {
    match &node.kind {
        NodeKind::Scalar(scalar) => scalar.value.clone(),
        _ => render_flow(node),
    }
}

#[derive(Default)]
struct Emitter {
    out: String,
}

impl Emitter {
    fn line(&mut self, indent: usize, text: &str, comment: Option<&str>) {
        self.out.push_str(&" ".repeat(indent));
        self.out.push_str(text);
        if let Some(comment) = comment {
            if !text.is_empty() {
                self.out.push(' ');
            }
            self.out.push_str(comment);
        }
        self.out.push('\n');
    }

    fn head(&mut self, head: Option<&str>, indent: usize) {
        for line in head.into_iter().flat_map(str::lines) {
            self.line(indent, line.trim(), None);
        }
    }

    fn block(&mut self, node: &Node, indent: usize) {
        match &node.kind {
            NodeKind::Mapping(entries) if !entries.is_empty() && node.style != Style::Flow => {
                self.mapping(entries, indent)
            }
            NodeKind::Sequence(items) if !items.is_empty() && node.style != Style::Flow => {
                self.sequence(items, indent)
            }
            _ => self.line(indent, &render_flow(node), node.comment()),
        }
    }

    fn mapping(&mut self, entries: &[MapEntry], indent: usize) {
        for entry in entries {
            self.head(entry.key.head_comment.as_deref(), indent);
            let key = key_text(&entry.key);
            let value = &entry.value;

            if is_block_collection(value) {
                let comment = entry.key.comment().or(value.comment());
                let header = format!("{key}: {}", anchor_prefix(value));
                self.line(indent, header.trim_end(), comment);
                self.block(value, indent + INDENT);
                continue;
            }

            let comment = value.comment().or(entry.key.comment());
            match &value.kind {
                NodeKind::Scalar(scalar) if is_literal_block(scalar) && !value.is_alias() => {
                    let header = block_header(&scalar.value);
                    let prefix = anchor_prefix(value);
                    self.line(indent, &format!("{key}: {prefix}{header}"), comment);
                    self.literal_lines(&scalar.value, indent + INDENT);
                }
                _ => {
                    let text = render_flow(value);
                    if text.is_empty() {
                        self.line(indent, &format!("{key}:"), comment);
                    } else {
                        self.line(indent, &format!("{key}: {text}"), comment);
                    }
                }
            }
        }
    }

    fn sequence(&mut self, items: &[Node], indent: usize) {
        let pad = " ".repeat(indent);
        for item in items {
            self.head(item.head_comment.as_deref(), indent);

            if let (true, Some(anchor)) = (is_block_collection(item), &item.anchor) {
                self.line(indent, &format!("- &{anchor}"), item.comment());
                self.block(item, indent + INDENT);
                continue;
            }

            if is_block_collection(item) {
                // Render the child one level deeper, then fold its first
                // line onto the dash.
                let mut child = Emitter::default();
                let first_head = match &item.kind {
                    NodeKind::Mapping(entries) => entries
                        .first()
                        .and_then(|entry| entry.key.head_comment.as_deref()),
                    _ => None,
                };
                self.head(first_head, indent);
                self.head(item.comment(), indent);
                match &item.kind {
                    NodeKind::Mapping(entries) => {
                        let mut entries = entries.clone();
                        if let Some(first) = entries.first_mut() {
                            first.key.head_comment = None;
                        }
                        child.mapping(&entries, indent + INDENT);
                    }
                    NodeKind::Sequence(inner) => child.sequence(inner, indent + INDENT),
                    NodeKind::Scalar(_) => {}
                }
                let inner_pad = " ".repeat(indent + INDENT);
                let rendered = match child.out.strip_prefix(inner_pad.as_str()) {
                    Some(rest) => format!("{pad}- {rest}"),
                    None => child.out.clone(),
                };
                self.out.push_str(&rendered);
                continue;
            }

            match &item.kind {
                NodeKind::Scalar(scalar) if is_literal_block(scalar) && !item.is_alias() => {
                    let header = block_header(&scalar.value);
                    let prefix = anchor_prefix(item);
                    self.line(indent, &format!("- {prefix}{header}"), item.comment());
                    self.literal_lines(&scalar.value, indent + INDENT);
                }
                _ => {
                    let text = render_flow(item);
                    if text.is_empty() {
                        self.line(indent, "-", item.comment());
                    } else {
                        self.line(indent, &format!("- {text}"), item.comment());
                    }
                }
            }
        }
    }

    fn literal_lines(&mut self, value: &str, indent: usize) {
        for line in value.trim_end_matches('\n').split('\n') {
            if line.is_empty() {
                self.out.push('\n');
            } else {
                self.line(indent, line, None);
            }
        }
    }
}

fn is_block_collection(node: &Node) -> bool {
    if node.is_alias() {
        return false;
    }
    match &node.kind {
        NodeKind::Mapping(entries) => !entries.is_empty() && node.style != Style::Flow,
        NodeKind::Sequence(items) => !items.is_empty() && node.style != Style::Flow,
        NodeKind::Scalar(_) => false,
    }
}

fn key_text(key: &Node) -> String {
    match &key.kind {
        NodeKind::Scalar(scalar) => scalar_text(key, scalar, false),
        _ => render_flow(key),
    }
}

/// Multi-line strings that a `|` block can represent exactly.
fn is_literal_block(scalar: &Scalar) -> bool {
    let value = &scalar.value;
    matches!(scalar.tag.as_deref(), None | Some(STR_TAG))
        && value.contains('\n')
        && !value.starts_with([' ', '\n', '\t'])
        && !value.ends_with("\n\n")
        && !value.contains('\r')
        && value.lines().all(|line| !line.ends_with([' ', '\t']))
}

fn block_header(value: &str) -> &'static str {
    if value.ends_with('\n') {
        "|"
    } else {
        "|-"
    }
}

/// How a plain scalar would be read back.
enum Plain {
    String,
    Other,
}

fn plain_reading(value: &str, flow: bool) -> Option<Plain> {
    if value.is_empty()
        || value != value.trim()
        || value.contains('\n')
        || value.contains(" #")
        || value.contains(": ")
        || value.ends_with(':')
    {
        return None;
    }
    if flow && value.contains([',', '[', ']', '{', '}']) {
        return None;
    }
    match serde_yaml::from_str::<Value>(value) {
        Ok(Value::String(parsed)) if parsed == value => Some(Plain::String),
        Ok(Value::Number(_) | Value::Bool(_)) => Some(Plain::Other),
        Ok(Value::Null) if matches!(value, "~" | "null" | "Null" | "NULL") => Some(Plain::Other),
        _ => None,
    }
}

fn quote(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

fn single_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn scalar_text(node: &Node, scalar: &Scalar, flow: bool) -> String {
    let value = scalar.value.as_str();
    let quoted = match node.style {
        Style::DoubleQuoted => Some(quote(value)),
        Style::SingleQuoted if !value.contains('\n') => Some(single_quote(value)),
        _ => None,
    };
    match scalar.tag.as_deref() {
        Some(NULL_TAG) if value.is_empty() => String::new(),
        Some(STR_TAG) => quoted.unwrap_or_else(|| match plain_reading(value, flow) {
            Some(Plain::String) => value.to_string(),
            _ => quote(value),
        }),
        None | Some("!!int" | "!!bool" | "!!float" | "!!null") => {
            quoted.unwrap_or_else(|| match plain_reading(value, flow) {
                Some(_) => value.to_string(),
                None => quote(value),
            })
        }
        Some(tag) => {
            let text = quoted.unwrap_or_else(|| match plain_reading(value, flow) {
                Some(Plain::String) => value.to_string(),
                _ => quote(value),
            });
            format!("{tag} {text}")
        }
    }
}
