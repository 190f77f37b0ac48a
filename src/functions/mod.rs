//! The function catalog, one [`Strategy`](crate::engine::Strategy) per
//! function.

pub mod apply_setters;
pub mod create_setters;
pub mod fix;
pub mod list_setters;
pub mod mutations;
pub mod search_replace;

pub use apply_setters::{apply_setters, ApplySetters};
pub use create_setters::{create_setters, CreateSetters};
pub use fix::{fix, Fix};
pub use list_setters::{list_setters, ListSetters, SetterListing, SetterSummary};
pub use mutations::{
    annotate_mutations, AnnotateMutations, FieldSubstitution, SourceRef, MUTATION_ANNOTATION,
};
pub use search_replace::{search_replace, SearchReplace};
