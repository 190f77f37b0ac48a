use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Action {
    Matched,
    Mutated,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Matched => write!(f, "Matched"),
            Action::Mutated => write!(f, "Mutated"),
        }
    }
}

/// One matched or mutated field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldResult {
    pub file_path: String,
    pub field_path: String,
    pub old_value: String,
    pub new_value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub action: Action,
}

/// Collects [`FieldResult`]s in visit order.
#[derive(Debug)]
pub struct ResultRecorder {
    mutating: bool,
    results: Vec<FieldResult>,
}

impl ResultRecorder {
    /// `mutating` marks runs that write documents; their results are
    /// all reported as mutations.
    pub fn new(mutating: bool) -> Self {
        Self {
            mutating,
            results: Vec::new(),
        }
    }

    pub fn record(
        &mut self,
        file_path: &str,
        field_path: impl ToString,
        old_value: impl Into<String>,
        new_value: impl Into<String>,
    ) -> &mut FieldResult {
        let old_value = old_value.into();
        let new_value = new_value.into();
        let action = if self.mutating || old_value != new_value {
            Action::Mutated
        } else {
            Action::Matched
        };
        self.results.push(FieldResult {
            file_path: file_path.to_string(),
            field_path: field_path.to_string(),
            old_value,
            new_value,
            comment: None,
            action,
        });
        let last = self.results.len() - 1;
        &mut self.results[last]
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn finish(self) -> Report {
        Report {
            action: if self.mutating {
                Action::Mutated
            } else {
                Action::Matched
            },
            results: self.results,
        }
    }
}

/// Outcome of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub action: Action,
    pub results: Vec<FieldResult>,
}

impl Report {
    pub fn count(&self) -> usize {
        self.results.len()
    }

    pub fn summary(&self) -> String {
        format!("{} {} field(s)", self.action, self.results.len())
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for result in &self.results {
            writeln!(f, "{}", result.file_path)?;
            writeln!(f, "fieldPath: {}", result.field_path)?;
            match &result.comment {
                Some(comment) => writeln!(f, "value: {} {}", result.new_value, comment)?,
                None => writeln!(f, "value: {}", result.new_value)?,
            }
            writeln!(f)?;
        }
        writeln!(f, "{}", self.summary())
    }
}
