use crate::document::errors::DocumentError;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    Field(String),
    Index(usize),
}

/// Concrete location of a node inside a resource, e.g. `spec.foo[1].c`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FieldPath {
    segments: Vec<Segment>,
}

impl FieldPath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn from_segments(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn field(&self, name: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(Segment::Field(name.into()));
        Self { segments }
    }

    pub fn index(&self, index: usize) -> Self {
        let mut segments = self.segments.clone();
        segments.push(Segment::Index(index));
        Self { segments }
    }

    /// Parse a path without wildcards.
    pub fn parse(input: &str) -> Result<Self, DocumentError> {
        PathPattern::parse(input)?
            .to_field_path()
            .ok_or_else(|| DocumentError::InvalidPath {
                input: input.to_string(),
                message: "wildcards are not allowed in a field path".to_string(),
            })
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Field(name) if i == 0 => write!(f, "{name}")?,
                Segment::Field(name) => write!(f, ".{name}")?,
                Segment::Index(idx) => write!(f, "[{idx}]")?,
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternSegment {
    Field(String),
    Index(usize),
    /// `[*]`: any sequence index.
    AnyIndex,
    /// `*`: any single field name.
    AnyField,
    /// `**`: zero or more segments of any kind.
    Deep,
}

impl PatternSegment {
    fn matches(&self, segment: &Segment) -> bool {
        match (self, segment) {
            (PatternSegment::Field(want), Segment::Field(got)) => want == got,
            (PatternSegment::Index(want), Segment::Index(got)) => want == got,
            (PatternSegment::AnyIndex, Segment::Index(_)) => true,
            (PatternSegment::AnyField, Segment::Field(_)) => true,
            (PatternSegment::Deep, _) => true,
            _ => false,
        }
    }

    fn is_wildcard(&self) -> bool {
        matches!(
            self,
            PatternSegment::AnyIndex | PatternSegment::AnyField | PatternSegment::Deep
        )
    }
}

/// A `by-path` expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    segments: Vec<PatternSegment>,
}

impl PathPattern {
    pub fn parse(input: &str) -> Result<Self, DocumentError> {
        let segments = parse_segments(input)?;
        if segments.is_empty() {
            return Err(DocumentError::InvalidPath {
                input: input.to_string(),
                message: "empty path".to_string(),
            });
        }
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[PatternSegment] {
        &self.segments
    }

    /// True when the pattern contains no wildcard segment.
    pub fn is_absolute(&self) -> bool {
        !self.segments.iter().any(PatternSegment::is_wildcard)
    }

    pub fn to_field_path(&self) -> Option<FieldPath> {
        self.segments
            .iter()
            .map(|segment| match segment {
                PatternSegment::Field(name) => Some(Segment::Field(name.clone())),
                PatternSegment::Index(idx) => Some(Segment::Index(*idx)),
                _ => None,
            })
            .collect::<Option<Vec<_>>>()
            .map(FieldPath::from_segments)
    }

    pub fn matches(&self, path: &FieldPath) -> bool {
        match_from(&self.segments, path.segments())
    }
}

fn match_from(pattern: &[PatternSegment], path: &[Segment]) -> bool {
    match pattern.split_first() {
        None => path.is_empty(),
        Some((PatternSegment::Deep, rest)) => {
            (0..=path.len()).any(|skip| match_from(rest, &path[skip..]))
        }
        Some((head, rest)) => match path.split_first() {
            Some((segment, tail)) => head.matches(segment) && match_from(rest, tail),
            None => false,
        },
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            let sep = if i == 0 { "" } else { "." };
            match segment {
                PatternSegment::Field(name) => write!(f, "{sep}{name}")?,
                PatternSegment::AnyField => write!(f, "{sep}*")?,
                PatternSegment::Deep => write!(f, "{sep}**")?,
                PatternSegment::Index(idx) => write!(f, "[{idx}]")?,
                PatternSegment::AnyIndex => write!(f, "[*]")?,
            }
        }
        Ok(())
    }
}

fn field_segment(name: String, quoted: bool) -> PatternSegment {
    match name.as_str() {
        "*" if !quoted => PatternSegment::AnyField,
        "**" if !quoted => PatternSegment::Deep,
        _ => PatternSegment::Field(name),
    }
}

fn parse_segments(input: &str) -> Result<Vec<PatternSegment>, DocumentError> {
    let err = |message: &str| DocumentError::InvalidPath {
        input: input.to_string(),
        message: message.to_string(),
    };

    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = input.chars().peekable();
    let mut in_quotes = false;
    let mut quote_char = '\0';
    let mut quoted = false;
    let mut after_index = false;

    while let Some(ch) = chars.next() {
        if in_quotes {
            if ch == quote_char {
                in_quotes = false;
                continue;
            }
            if quote_char == '"' && ch == '\\' {
                if let Some(next) = chars.next() {
                    current.push(next);
                    continue;
                }
            }
            current.push(ch);
            continue;
        }

        match ch {
            '.' => {
                if current.is_empty() && !quoted {
                    if !after_index {
                        return Err(err("empty path segment"));
                    }
                } else {
                    segments.push(field_segment(std::mem::take(&mut current), quoted));
                }
                quoted = false;
                after_index = false;
                if chars.peek().is_none() {
                    return Err(err("trailing '.'"));
                }
            }
            '[' => {
                if !current.is_empty() || quoted {
                    segments.push(field_segment(std::mem::take(&mut current), quoted));
                    quoted = false;
                }
                let mut index = String::new();
                loop {
                    match chars.next() {
                        Some(']') => break,
                        Some(c) => index.push(c),
                        None => return Err(err("unterminated index")),
                    }
                }
                let segment = match index.trim() {
                    "*" => PatternSegment::AnyIndex,
                    n => PatternSegment::Index(
                        n.parse()
                            .map_err(|_| err("index must be a non-negative integer or '*'"))?,
                    ),
                };
                segments.push(segment);
                after_index = true;
            }
            '"' | '\'' => {
                if !current.is_empty() || after_index {
                    return Err(err("unexpected quote inside key"));
                }
                in_quotes = true;
                quote_char = ch;
                quoted = true;
            }
            ch if ch.is_whitespace() => {
                return Err(err("whitespace not allowed in path"));
            }
            other => {
                if after_index {
                    return Err(err("expected '.' or '[' after index"));
                }
                current.push(other);
            }
        }
    }

    if in_quotes {
        return Err(err("unterminated quoted key"));
    }

    if !current.is_empty() || quoted {
        segments.push(field_segment(current, quoted));
    }

    Ok(segments)
}
