//! Directive-driven substitution engine.
//!
//! A run walks every resource depth first ([`walker`]), hands each node to
//! a [`Strategy`], and records one [`FieldResult`] per matched field. The
//! building blocks are independent of any one function:
//!
//! - [`directive`] reads `# kpt-set: ` style markers out of comments
//! - [`matcher`] evaluates value / regex / path / file criteria
//! - [`pattern`] resolves `${name}` placeholders and capture groups
//! - [`graph`] expands nested substitutions with cycle detection
//! - [`mutator`] writes resolved values back

pub mod directive;
pub mod errors;
pub mod graph;
pub mod matcher;
pub mod mutator;
pub mod pattern;
pub mod recorder;
pub mod strategy;
pub mod walker;

pub use errors::{ErrorKind, SubstError};
pub use graph::{Definition, SubstitutionGraph, SubstitutionRef};
pub use matcher::{MatchCriteria, ValuePredicate};
pub use pattern::{Bindings, Pattern};
pub use recorder::{Action, FieldResult, Report, ResultRecorder};
pub use strategy::{run, Context, Strategy, StrategyKind, StrategyVisitor};
pub use walker::{walk, Visitor};
