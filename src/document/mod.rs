//! In-memory document model for KRM resources.
//!
//! The engine operates on a small owned tree ([`Node`]) rather than on a
//! parser's native representation. [`loader`] builds the tree from YAML
//! (values via `serde_yaml`, comments and flow styles recovered from the
//! source text) and [`emitter`] renders it back.

pub mod emitter;
pub mod errors;
pub mod loader;
pub mod node;
pub mod path;

pub use emitter::{inline_value, render_documents, render_flow, render_resource};
pub use errors::DocumentError;
pub use loader::{load_str, parse_node};
pub use node::{
    MapEntry, Node, NodeKind, Resource, Scalar, Style, INTERNAL_PATH_ANNOTATION, NULL_TAG,
    PATH_ANNOTATION, STR_TAG,
};
pub use path::{FieldPath, PathPattern, PatternSegment, Segment};
