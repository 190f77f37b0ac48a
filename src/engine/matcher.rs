use crate::config::{SearchReplaceConfig, ValidationError, ValidationIssue};
use crate::document::{FieldPath, Node, PathPattern};
use globset::{GlobBuilder, GlobMatcher};
use regex::Regex;

/// Predicate on a scalar's value.
#[derive(Debug, Clone)]
pub enum ValuePredicate {
    Exact(String),
    Regex(Regex),
}

impl ValuePredicate {
    /// Empty values never match.
    pub fn matches(&self, value: &str) -> bool {
        if value.is_empty() {
            return false;
        }
        match self {
            ValuePredicate::Exact(expected) => expected == value,
            ValuePredicate::Regex(regex) => regex.is_match(value),
        }
    }

    pub fn regex(&self) -> Option<&Regex> {
        match self {
            ValuePredicate::Regex(regex) => Some(regex),
            ValuePredicate::Exact(_) => None,
        }
    }
}

/// Compiled search criteria. Built once per invocation.
#[derive(Debug, Clone, Default)]
pub struct MatchCriteria {
    pub value: Option<ValuePredicate>,
    pub path: Option<PathPattern>,
    pub file_path: Option<GlobMatcher>,
}

impl MatchCriteria {
    pub fn new(
        by_value: Option<&str>,
        by_value_regex: Option<&str>,
        by_path: Option<&str>,
        by_file_path: Option<&str>,
    ) -> Result<Self, ValidationError> {
        let mut issues = Vec::new();

        let value = match (by_value, by_value_regex) {
            (Some(_), Some(_)) => {
                issues.push(ValidationIssue::ConflictingMatchers);
                None
            }
            (Some(exact), None) => Some(ValuePredicate::Exact(exact.to_string())),
            (None, Some(pattern)) => match Regex::new(pattern) {
                Ok(regex) => Some(ValuePredicate::Regex(regex)),
                Err(e) => {
                    issues.push(ValidationIssue::InvalidRegex {
                        pattern: pattern.to_string(),
                        message: e.to_string(),
                    });
                    None
                }
            },
            (None, None) => None,
        };

        let path = match by_path.map(PathPattern::parse).transpose() {
            Ok(path) => path,
            Err(e) => {
                issues.push(ValidationIssue::InvalidPath {
                    path: by_path.unwrap_or_default().to_string(),
                    message: e.to_string(),
                });
                None
            }
        };

        let file_path = match by_file_path.map(compile_glob).transpose() {
            Ok(glob) => glob,
            Err(issue) => {
                issues.push(issue);
                None
            }
        };

        if issues.is_empty() {
            Ok(Self {
                value,
                path,
                file_path,
            })
        } else {
            Err(ValidationError { issues })
        }
    }

    pub fn from_config(config: &SearchReplaceConfig) -> Result<Self, ValidationError> {
        Self::new(
            config.by_value.as_deref(),
            config.by_value_regex.as_deref(),
            config.by_path.as_deref(),
            config.by_file_path.as_deref(),
        )
    }

    /// File gate. Always true without a `by-file-path` glob.
    pub fn matches_file(&self, file_path: &str) -> bool {
        self.file_path
            .as_ref()
            .map_or(true, |glob| glob.is_match(file_path))
    }

    pub fn matches_path(&self, path: &FieldPath) -> bool {
        self.path.as_ref().is_some_and(|pattern| pattern.matches(path))
    }

    /// Whether `node` at `path` in `file_path` is selected.
    ///
    /// With both a value predicate and a path, both must hold. Criteria
    /// without either select nothing.
    pub fn matches(&self, node: &Node, path: &FieldPath, file_path: &str) -> bool {
        if !self.matches_file(file_path) {
            return false;
        }
        let value_match = || match (&self.value, node.scalar_value()) {
            (Some(predicate), Some(value)) => predicate.matches(value),
            _ => false,
        };
        match (&self.value, &self.path) {
            (Some(_), Some(_)) => self.matches_path(path) && value_match(),
            (Some(_), None) => value_match(),
            (None, Some(_)) => self.matches_path(path),
            (None, None) => false,
        }
    }

    pub fn regex(&self) -> Option<&Regex> {
        self.value.as_ref().and_then(ValuePredicate::regex)
    }
}

fn compile_glob(pattern: &str) -> Result<GlobMatcher, ValidationIssue> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map(|glob| glob.compile_matcher())
        .map_err(|e| ValidationIssue::InvalidGlob {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })
}
