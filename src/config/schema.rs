use crate::document::{inline_value, parse_node, NodeKind};
use std::collections::BTreeMap;
use std::fmt;

pub const BY_VALUE: &str = "by-value";
pub const BY_VALUE_REGEX: &str = "by-value-regex";
pub const BY_PATH: &str = "by-path";
pub const BY_FILE_PATH: &str = "by-file-path";
pub const PUT_VALUE: &str = "put-value";
pub const PUT_COMMENT: &str = "put-comment";

/// Keys that switch a data map into search-replace mode.
pub const RESERVED_KEYS: [&str; 6] = [
    BY_VALUE,
    BY_FILE_PATH,
    BY_VALUE_REGEX,
    BY_PATH,
    PUT_VALUE,
    PUT_COMMENT,
];

/// Configuration interpreted from a flat string map (a ConfigMap's `data`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FunctionConfig {
    Setters(SetterConfig),
    SearchReplace(SearchReplaceConfig),
}

impl FunctionConfig {
    /// Reserved keys select search-replace mode; anything else is a setter.
    pub fn from_data(data: &BTreeMap<String, String>) -> Result<Self, ValidationError> {
        if data.keys().any(|key| RESERVED_KEYS.contains(&key.as_str())) {
            return SearchReplaceConfig::from_data(data).map(FunctionConfig::SearchReplace);
        }
        if data.is_empty() {
            return Err(ValidationError::single(ValidationIssue::MissingMatcher));
        }
        Ok(FunctionConfig::Setters(SetterConfig::from_data(data)))
    }
}

/// An array setter: the literal as supplied plus its element values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArraySetter {
    pub literal: String,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetterConfig {
    pub scalars: BTreeMap<String, String>,
    pub arrays: BTreeMap<String, ArraySetter>,
}

impl SetterConfig {
    pub fn from_data(data: &BTreeMap<String, String>) -> Self {
        let mut config = Self::default();
        for (name, value) in data {
            match sequence_values(value) {
                Some(values) => {
                    config.arrays.insert(
                        name.clone(),
                        ArraySetter {
                            literal: value.clone(),
                            values,
                        },
                    );
                }
                None => {
                    config.scalars.insert(name.clone(), value.clone());
                }
            }
        }
        config
    }

    pub fn is_empty(&self) -> bool {
        self.scalars.is_empty() && self.arrays.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.scalars.contains_key(name) || self.arrays.contains_key(name)
    }
}

/// Element values of `value` when it is written as a sequence literal.
///
/// Only values starting with `[` or containing `- ` are candidates, so a
/// plain string is never mistaken for a one-element list.
pub fn sequence_values(value: &str) -> Option<Vec<String>> {
    if !(value.trim_start().starts_with('[') || value.contains("- ")) {
        return None;
    }
    let node = parse_node(value).ok()?;
    match &node.kind {
        NodeKind::Sequence(items) => Some(items.iter().map(inline_value).collect()),
        _ => None,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchReplaceConfig {
    pub by_value: Option<String>,
    pub by_value_regex: Option<String>,
    pub by_path: Option<String>,
    pub by_file_path: Option<String>,
    pub put_value: Option<String>,
    pub put_comment: Option<String>,
}

impl SearchReplaceConfig {
    pub fn from_data(data: &BTreeMap<String, String>) -> Result<Self, ValidationError> {
        let mut issues = Vec::new();
        for key in data.keys() {
            if !RESERVED_KEYS.contains(&key.as_str()) {
                issues.push(ValidationIssue::UnknownKey {
                    key: key.clone(),
                    suggestion: suggest_key(key),
                });
            }
        }
        if !issues.is_empty() {
            return Err(ValidationError { issues });
        }

        let get = |key: &str| data.get(key).filter(|v| !v.is_empty()).cloned();
        let config = Self {
            by_value: get(BY_VALUE),
            by_value_regex: get(BY_VALUE_REGEX),
            by_path: get(BY_PATH),
            by_file_path: get(BY_FILE_PATH),
            put_value: get(PUT_VALUE),
            put_comment: get(PUT_COMMENT),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();
        if self.by_value.is_some() && self.by_value_regex.is_some() {
            issues.push(ValidationIssue::ConflictingMatchers);
        }
        if self.by_value.is_none() && self.by_value_regex.is_none() && self.by_path.is_none() {
            issues.push(ValidationIssue::MissingMatcher);
        }
        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }

    /// True when the run changes documents rather than only reporting.
    pub fn mutates(&self) -> bool {
        self.put_value.is_some() || self.put_comment.is_some()
    }
}

fn suggest_key(key: &str) -> Option<String> {
    RESERVED_KEYS
        .iter()
        .map(|candidate| (candidate, strsim::jaro_winkler(key, candidate)))
        .filter(|(_, score)| *score > 0.8)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(candidate, _)| candidate.to_string())
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationError {
    pub fn single(issue: ValidationIssue) -> Self {
        Self {
            issues: vec![issue],
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone, PartialEq)]
pub enum ValidationIssue {
    UnknownKey {
        key: String,
        suggestion: Option<String>,
    },
    ConflictingMatchers,
    MissingMatcher,
    NoSetters,
    InvalidRegex {
        pattern: String,
        message: String,
    },
    InvalidGlob {
        pattern: String,
        message: String,
    },
    InvalidPath {
        path: String,
        message: String,
    },
    InvalidValue {
        key: String,
        message: String,
    },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::UnknownKey { key, suggestion } => {
                write!(f, "invalid matcher {key:?}, must be one of {RESERVED_KEYS:?}")?;
                if let Some(suggestion) = suggestion {
                    write!(f, " (did you mean {suggestion:?}?)")?;
                }
                Ok(())
            }
            ValidationIssue::ConflictingMatchers => {
                write!(f, "only one of [{BY_VALUE:?}, {BY_VALUE_REGEX:?}] can be provided")
            }
            ValidationIssue::MissingMatcher => write!(
                f,
                "at least one of [{BY_VALUE:?}, {BY_VALUE_REGEX:?}, {BY_PATH:?}] must be provided"
            ),
            ValidationIssue::NoSetters => write!(f, "at least one setter must be provided"),
            ValidationIssue::InvalidRegex { pattern, message } => {
                write!(f, "failed to compile input pattern {pattern:?}: {message}")
            }
            ValidationIssue::InvalidGlob { pattern, message } => {
                write!(f, "invalid file path glob {pattern:?}: {message}")
            }
            ValidationIssue::InvalidPath { path, message } => {
                write!(f, "invalid field path {path:?}: {message}")
            }
            ValidationIssue::InvalidValue { key, message } => {
                write!(f, "invalid value for {key:?}: {message}")
            }
        }
    }
}
