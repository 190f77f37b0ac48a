use crate::config::ValidationError;
use thiserror::Error;

/// Coarse classification of [`SubstError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Pattern,
    Type,
    NotFound,
}

#[derive(Error, Debug)]
pub enum SubstError {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("invalid regular expression: {0}")]
    Regex(#[from] regex::Error),

    #[error("values for setters [{}] must be provided", .names.join(", "))]
    UnresolvedPlaceholders { names: Vec<String> },

    #[error("cyclic substitution detected with name {name}")]
    CyclicSubstitution { name: String },

    #[error("unable to resolve capture groups")]
    UnresolvedCaptureGroups,

    #[error("apply mutation comment found with no valid reference to source path")]
    MissingMutationReference,

    #[error("invalid setter pattern for array node: {pattern:?}")]
    ImpureArrayPattern { pattern: String },

    #[error("input to array setter must be an array of values, but found {value:?}")]
    NotASequence { value: String },

    #[error("array setter {name:?} cannot be used in a scalar field pattern")]
    ArraySetterInScalar { name: String },

    #[error("expected a {expected} node, found a {found}")]
    KindMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("missing reference on substitution {name}")]
    MissingReference { name: String },

    #[error("definition not found for reference {reference:?}")]
    NotFound { reference: String },

    #[error("failed to format apply-time-mutation annotation: {0}")]
    Annotation(#[from] serde_yaml::Error),

    #[error("{file_path}: {field_path}: {source}")]
    AtField {
        file_path: String,
        field_path: String,
        #[source]
        source: Box<SubstError>,
    },
}

impl SubstError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SubstError::Validation(_) | SubstError::Regex(_) => ErrorKind::Validation,
            SubstError::UnresolvedPlaceholders { .. }
            | SubstError::CyclicSubstitution { .. }
            | SubstError::UnresolvedCaptureGroups
            | SubstError::MissingMutationReference => ErrorKind::Pattern,
            SubstError::ImpureArrayPattern { .. }
            | SubstError::NotASequence { .. }
            | SubstError::ArraySetterInScalar { .. }
            | SubstError::KindMismatch { .. }
            | SubstError::Annotation(_) => ErrorKind::Type,
            SubstError::MissingReference { .. } | SubstError::NotFound { .. } => {
                ErrorKind::NotFound
            }
            SubstError::AtField { source, .. } => source.kind(),
        }
    }

    /// Attach the location of the failing field. Already located errors
    /// are returned unchanged.
    pub fn at(self, file_path: &str, field_path: impl ToString) -> Self {
        match self {
            SubstError::AtField { .. } | SubstError::Validation(_) => self,
            other => SubstError::AtField {
                file_path: file_path.to_string(),
                field_path: field_path.to_string(),
                source: Box::new(other),
            },
        }
    }
}
