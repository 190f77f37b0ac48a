//! YAML loading with comment recovery.
//!
//! Values come from `serde_yaml`, which drops comments, anchors and
//! presentation style. A second pass walks the node tree in lockstep with
//! the source lines and re-attaches line comments, head comments, flow
//! styles, anchors and aliases. A layout that cannot be aligned with the
//! tree (complex keys, tagged collections) is rejected with
//! [`DocumentError::UnalignedComments`] rather than loaded without comments.

use crate::document::errors::DocumentError;
use crate::document::node::{MapEntry, Node, NodeKind, Resource, Style};
use serde_yaml::Value;
use tracing::trace;

/// Parse every document in `text` into a [`Resource`].
///
/// Documents consisting only of comments are not returned; their comments
/// are carried into the next document.
pub fn load_str(text: &str, source_path: &str) -> Result<Vec<Resource>, DocumentError> {
    let mut resources = Vec::new();
    let mut carried = Vec::new();

    for (first_line, chunk) in split_documents(text) {
        let lines: Vec<Line> = chunk.lines().map(Line::parse).collect();
        if !lines.iter().any(|line| line.kind == LineKind::Content) {
            carried.extend(lines.into_iter().filter_map(|line| line.comment));
            continue;
        }

        let value: Value =
            serde_yaml::from_str(&chunk).map_err(|source| DocumentError::InvalidYaml {
                file: source_path.to_string(),
                source,
            })?;
        if !matches!(value, Value::Mapping(_)) {
            return Err(DocumentError::NotAMapping {
                file: source_path.to_string(),
            });
        }

        let mut root = Node::from_value(value);
        let mut recovery = Recovery {
            lines,
            pos: 0,
            pending: std::mem::take(&mut carried),
        };
        let trailing = recovery
            .document(&mut root)
            .map_err(|Mismatch { line }| DocumentError::UnalignedComments {
                file: source_path.to_string(),
                line: first_line + line - 1,
            })?;
        trace!(file = %source_path, line = first_line, "document loaded");
        let mut resource = Resource::new(root, source_path);
        resource.trailing_comment = trailing;
        resources.push(resource);
    }

    Ok(resources)
}

/// Parse a YAML fragment (e.g. a sequence literal) into a node.
pub fn parse_node(text: &str) -> Result<Node, DocumentError> {
    let value: Value = serde_yaml::from_str(text).map_err(|source| DocumentError::InvalidYaml {
        file: "<literal>".to_string(),
        source,
    })?;
    Ok(Node::from_value(value))
}

/// A `---` or `...` line, with the comment following `---` if any.
fn document_marker(line: &str) -> Option<Option<&str>> {
    let line = line.trim_end();
    if line == "---" || line == "..." {
        return Some(None);
    }
    let after = line.strip_prefix("---")?;
    let comment = after.trim_start();
    (after.starts_with([' ', '\t']) && comment.starts_with('#')).then_some(Some(comment))
}

/// Split a stream into documents, each with the 1-based source line it
/// starts at. A comment on a `---` line opens the next document.
fn split_documents(text: &str) -> Vec<(usize, String)> {
    let mut documents = Vec::new();
    let mut current = String::new();
    let mut first_line = 1;
    for (idx, line) in text.lines().enumerate() {
        let Some(comment) = document_marker(line) else {
            current.push_str(line);
            current.push('\n');
            continue;
        };
        documents.push((first_line, std::mem::take(&mut current)));
        first_line = idx + 2;
        if let Some(comment) = comment {
            current.push_str(comment);
            current.push('\n');
            first_line = idx + 1;
        }
    }
    documents.push((first_line, current));
    documents
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind {
    Blank,
    Comment,
    Content,
}

#[derive(Debug, Clone)]
struct Line {
    indent: usize,
    content: String,
    comment: Option<String>,
    kind: LineKind,
}

impl Line {
    fn parse(raw: &str) -> Self {
        let body = raw.trim_start_matches(' ');
        let indent = raw.len() - body.len();
        let body = body.trim_end();

        if body.is_empty() {
            return Self {
                indent,
                content: String::new(),
                comment: None,
                kind: LineKind::Blank,
            };
        }
        if body.starts_with('#') {
            return Self {
                indent,
                content: String::new(),
                comment: Some(body.to_string()),
                kind: LineKind::Comment,
            };
        }

        let (content, comment) = match find_comment(body) {
            Some(idx) => (body[..idx].trim_end(), Some(body[idx..].to_string())),
            None => (body, None),
        };
        Self {
            indent,
            content: content.to_string(),
            comment,
            kind: LineKind::Content,
        }
    }
}

/// Byte offset of a `#` starting a comment, ignoring `#` inside quotes.
fn find_comment(s: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    let mut prev: Option<char> = None;
    let mut chars = s.char_indices().peekable();

    while let Some((i, ch)) = chars.next() {
        match quote {
            Some('"') => {
                if ch == '\\' {
                    chars.next();
                } else if ch == '"' {
                    quote = None;
                }
            }
            Some(_) => {
                if ch == '\'' {
                    if matches!(chars.peek(), Some((_, '\''))) {
                        chars.next();
                    } else {
                        quote = None;
                    }
                }
            }
            None => {
                if ch == '#' && matches!(prev, Some(' ' | '\t')) {
                    return Some(i);
                }
                if (ch == '"' || ch == '\'')
                    && matches!(prev, None | Some(' ' | '\t' | '[' | '{' | ','))
                {
                    quote = Some(ch);
                }
            }
        }
        prev = Some(ch);
    }
    None
}

/// Index of the closing quote of a quoted scalar starting at offset 0.
fn closing_quote(s: &str) -> Option<usize> {
    let mut chars = s.char_indices();
    let (_, open) = chars.next()?;
    let mut chars = chars.peekable();
    while let Some((i, ch)) = chars.next() {
        if open == '"' && ch == '\\' {
            chars.next();
        } else if ch == open {
            if open == '\'' && matches!(chars.peek(), Some((_, '\''))) {
                chars.next();
                continue;
            }
            return Some(i);
        }
    }
    None
}

/// Split `key: rest` into the key text and the trimmed remainder.
fn split_key(content: &str) -> Option<(String, &str)> {
    let (key, after) = if content.starts_with('"') || content.starts_with('\'') {
        let end = closing_quote(content)?;
        let key: String = serde_yaml::from_str(&content[..=end]).ok()?;
        (key, content[end + 1..].trim_start())
    } else {
        let idx = content
            .match_indices(':')
            .map(|(i, _)| i)
            .find(|&i| matches!(content[i + 1..].chars().next(), None | Some(' ')))?;
        (content[..idx].trim_end().to_string(), &content[idx..])
    };
    let rest = after.strip_prefix(':')?;
    Some((key, rest.trim()))
}

fn quote_style(text: &str) -> Style {
    if text.starts_with('"') {
        Style::DoubleQuoted
    } else if text.starts_with('\'') {
        Style::SingleQuoted
    } else {
        Style::Block
    }
}

fn is_flow(rest: &str) -> bool {
    rest.starts_with('[') || rest.starts_with('{')
}

fn is_block_indicator(rest: &str) -> bool {
    rest.starts_with('|') || rest.starts_with('>')
}

/// Net count of flow brackets opened on a line, ignoring quoted text.
fn flow_depth(s: &str) -> isize {
    let mut depth = 0;
    let mut quote: Option<char> = None;
    let mut prev: Option<char> = None;
    let mut chars = s.chars().peekable();

    while let Some(ch) = chars.next() {
        match quote {
            Some('"') => {
                if ch == '\\' {
                    chars.next();
                } else if ch == '"' {
                    quote = None;
                }
            }
            Some(_) => {
                if ch == '\'' {
                    if chars.peek() == Some(&'\'') {
                        chars.next();
                    } else {
                        quote = None;
                    }
                }
            }
            None => match ch {
                '[' | '{' => depth += 1,
                ']' | '}' => depth -= 1,
                '"' | '\'' if matches!(prev, None | Some(' ' | '\t' | '[' | '{' | ',')) => {
                    quote = Some(ch)
                }
                _ => {}
            },
        }
        prev = Some(ch);
    }
    depth
}

/// Node properties written before a value: `&anchor` and `*alias`.
///
/// Tags stay in `rest`; scalar tags come from `serde_yaml`.
#[derive(Debug, Default, PartialEq, Eq)]
struct Properties<'a> {
    anchor: Option<String>,
    alias: Option<String>,
    rest: &'a str,
}

impl<'a> Properties<'a> {
    fn split(text: &'a str) -> Self {
        let mut props = Self {
            rest: text,
            ..Self::default()
        };
        if let Some(after) = props.rest.strip_prefix('&') {
            let (name, rest) = first_token(after);
            props.anchor = Some(name.to_string());
            props.rest = rest;
        }
        if let Some(after) = props.rest.strip_prefix('*') {
            let (name, rest) = first_token(after);
            props.alias = Some(name.to_string());
            props.rest = rest;
        }
        props
    }
}

fn first_token(s: &str) -> (&str, &str) {
    let end = s.find([' ', '\t']).unwrap_or(s.len());
    (&s[..end], s[end..].trim_start())
}

#[derive(Debug)]
struct Mismatch {
    line: usize,
}

type Step = Result<(), Mismatch>;

struct Recovery {
    lines: Vec<Line>,
    pos: usize,
    pending: Vec<String>,
}

impl Recovery {
    fn mismatch(&self) -> Mismatch {
        Mismatch { line: self.pos + 1 }
    }

    fn document(&mut self, root: &mut Node) -> Result<Option<String>, Mismatch> {
        self.skip_trivia();
        let col = self.indent()?;
        let NodeKind::Mapping(entries) = &mut root.kind else {
            return Err(self.mismatch());
        };
        self.mapping(entries, col)?;
        self.skip_trivia();
        if self.pos < self.lines.len() {
            return Err(self.mismatch());
        }
        Ok(self.take_pending())
    }

    fn indent(&self) -> Result<usize, Mismatch> {
        self.lines
            .get(self.pos)
            .map(|line| line.indent)
            .ok_or_else(|| self.mismatch())
    }

    /// Consume blank and comment-only lines, queueing comments as head comments.
    fn skip_trivia(&mut self) {
        while let Some(line) = self.lines.get(self.pos) {
            match line.kind {
                LineKind::Blank => {}
                LineKind::Comment => {
                    if let Some(comment) = &line.comment {
                        self.pending.push(comment.clone());
                    }
                }
                LineKind::Content => break,
            }
            self.pos += 1;
        }
    }

    /// Skip the remaining lines of a value that started on an earlier line.
    fn skip_continuation(&mut self, col: usize, include_comments: bool) {
        while let Some(line) = self.lines.get(self.pos) {
            let skip = match line.kind {
                LineKind::Blank => include_comments,
                LineKind::Comment => include_comments && line.indent > col,
                LineKind::Content => line.indent > col,
            };
            if !skip {
                break;
            }
            self.pos += 1;
        }
    }

    fn take_pending(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.pending).join("\n"))
        }
    }

    fn mapping(&mut self, entries: &mut [MapEntry], col: usize) -> Step {
        for entry in entries.iter_mut() {
            self.skip_trivia();
            let line = self.lines.get(self.pos).ok_or_else(|| self.mismatch())?;
            if line.indent != col {
                return Err(self.mismatch());
            }
            let (key, rest) = split_key(&line.content).ok_or_else(|| self.mismatch())?;
            if key != entry.key_str() {
                return Err(self.mismatch());
            }
            let rest = rest.to_string();
            let comment = line.comment.clone();

            entry.key.head_comment = self.take_pending();
            entry.key.style = quote_style(&self.lines[self.pos].content);
            self.pos += 1;

            let props = Properties::split(&rest);
            entry.value.anchor = props.anchor;
            if let Some(alias) = props.alias {
                self.alias(&mut entry.value, alias, props.rest, comment)?;
                continue;
            }
            let rest = props.rest;
            if entry.value.is_scalar() || is_flow(rest) {
                self.inline_value(&mut entry.value, col, rest, comment)?;
                continue;
            }
            if !rest.is_empty() {
                return Err(self.mismatch());
            }
            entry.key.comment = comment;
            self.skip_trivia();
            self.nested(&mut entry.value, col)?;
        }
        Ok(())
    }

    fn sequence(&mut self, items: &mut [Node], col: usize) -> Step {
        for item in items.iter_mut() {
            self.skip_trivia();
            let line = self.lines.get(self.pos).ok_or_else(|| self.mismatch())?;
            if line.indent != col {
                return Err(self.mismatch());
            }
            let content = line.content.clone();
            let comment = line.comment.clone();
            let rest = if content == "-" {
                ""
            } else {
                content.strip_prefix("- ").ok_or_else(|| self.mismatch())?
            };
            let props = Properties::split(rest.trim_start());
            let rest = props.rest;
            let offset = content.len() - rest.len();

            item.head_comment = self.take_pending();
            item.anchor = props.anchor;

            if let Some(alias) = props.alias {
                self.pos += 1;
                self.alias(item, alias, rest, comment)?;
                continue;
            }
            if item.is_scalar() || is_flow(rest) {
                self.pos += 1;
                self.inline_value(item, col, rest, comment)?;
                continue;
            }

            if rest.is_empty() {
                if let Some(comment) = comment {
                    item.head_comment = Some(match item.head_comment.take() {
                        Some(head) => format!("{head}\n{comment}"),
                        None => comment,
                    });
                }
                self.pos += 1;
                self.skip_trivia();
                self.nested(item, col)?;
                continue;
            }

            // `- key: value` or `- - value`: the collection starts on this line.
            let inner_col = col + offset;
            let line = &mut self.lines[self.pos];
            line.indent = inner_col;
            line.content = rest.to_string();
            match &mut item.kind {
                NodeKind::Mapping(entries) => self.mapping(entries, inner_col)?,
                NodeKind::Sequence(inner) => self.sequence(inner, inner_col)?,
                NodeKind::Scalar(_) => return Err(self.mismatch()),
            }
        }
        Ok(())
    }

    /// A block collection starting on the line after its key or dash.
    fn nested(&mut self, node: &mut Node, parent_col: usize) -> Step {
        let indent = self.indent()?;
        match &mut node.kind {
            NodeKind::Mapping(entries) if indent > parent_col => self.mapping(entries, indent),
            NodeKind::Sequence(items) if indent >= parent_col => self.sequence(items, indent),
            _ => Err(self.mismatch()),
        }
    }

    /// `*name` after `key:` or `- `. The tree keeps the resolved copy.
    fn alias(&self, node: &mut Node, name: String, rest: &str, comment: Option<String>) -> Step {
        if !rest.is_empty() {
            return Err(self.mismatch());
        }
        node.alias = Some(name);
        node.comment = comment;
        Ok(())
    }

    /// Consume the lines of a flow collection up to its closing bracket.
    ///
    /// Returns the one comment written inside or after it; more than one
    /// cannot be kept on a single node.
    fn close_flow(
        &mut self,
        rest: &str,
        mut comment: Option<String>,
    ) -> Result<Option<String>, Mismatch> {
        let mut depth = flow_depth(rest);
        while depth > 0 {
            let line = self.lines.get(self.pos).ok_or_else(|| self.mismatch())?;
            if line.kind == LineKind::Content {
                depth += flow_depth(&line.content);
            }
            if let Some(found) = &line.comment {
                if comment.is_some() {
                    return Err(self.mismatch());
                }
                comment = Some(found.clone());
            }
            self.pos += 1;
        }
        Ok(comment)
    }

    /// A scalar or flow collection written after `key:` or `- `.
    fn inline_value(
        &mut self,
        node: &mut Node,
        col: usize,
        rest: &str,
        comment: Option<String>,
    ) -> Step {
        if is_flow(rest) {
            if !node.is_scalar() {
                node.style = Style::Flow;
            }
            node.comment = self.close_flow(rest, comment)?;
            return Ok(());
        }
        if let NodeKind::Scalar(scalar) = &mut node.kind {
            if scalar.tag.is_none() && !rest.is_empty() && !is_block_indicator(rest) {
                if let Some(source) = plain_source_text(rest, &scalar.value) {
                    scalar.value = source;
                }
            }
            if closing_quote(rest).is_some_and(|end| end + 1 == rest.len()) {
                node.style = quote_style(rest);
            }
        }
        node.comment = comment;
        self.skip_continuation(col, is_block_indicator(rest));
        Ok(())
    }
}

/// Source spelling of a number or boolean (`010`, `1.50`, `True`) when it
/// denotes the same value as `parsed`.
fn plain_source_text(rest: &str, parsed: &str) -> Option<String> {
    let value: Value = serde_yaml::from_str(rest).ok()?;
    if !matches!(value, Value::Number(_) | Value::Bool(_)) {
        return None;
    }
    let node = Node::from_value(value);
    (node.scalar_value() == Some(parsed) && rest != parsed).then(|| rest.to_string())
}
