//! krm-setters: directive-driven mutation of KRM configuration packages
//!
//! Fields in Kubernetes resource YAML carry line comments such as
//! `# kpt-set: ${image}:${tag}`. The functions in this crate read those
//! directives (or explicit search criteria) and set, report or annotate
//! the fields they mark, keeping comments and layout intact.
//!
//! # Architecture
//!
//! Every function is a [`Strategy`](engine::Strategy) run by one shared
//! traversal ([`engine::run`]) over an owned document tree
//! ([`document::Node`]). Strategies record what they touched in a
//! [`ResultRecorder`](engine::ResultRecorder); a run either succeeds for
//! every resource or leaves all of them untouched.
//!
//! - [`document`]: YAML loading, field paths, and rendering
//! - [`engine`]: patterns, directives, the substitution graph, traversal
//! - [`functions`]: apply-setters, search-replace, create-setters,
//!   list-setters, fix, annotate-apply-time-mutations
//! - [`config`]: function configs and Kptfile setter definitions
//! - [`package`]: reading a directory of resources and writing it back
//!
//! # Example
//!
//! ```
//! use krm_setters::config::SetterConfig;
//! use krm_setters::document::{load_str, render_documents};
//! use krm_setters::functions::apply_setters;
//! use std::collections::BTreeMap;
//!
//! let mut resources = load_str(
//!     "spec:\n  image: nginx:1.7.9 # kpt-set: ${image}:${tag}\n",
//!     "deploy.yaml",
//! )
//! .unwrap();
//! let data = BTreeMap::from([("tag".to_string(), "1.8.0".to_string())]);
//! let report = apply_setters(&mut resources, &SetterConfig::from_data(&data)).unwrap();
//!
//! assert_eq!(report.count(), 1);
//! assert_eq!(
//!     render_documents(&resources),
//!     "spec:\n  image: nginx:1.8.0 # kpt-set: ${image}:${tag}\n"
//! );
//! ```

pub mod config;
pub mod document;
pub mod engine;
pub mod functions;
pub mod logging;
pub mod package;

// Re-exports
pub use config::{
    load_from_path, load_from_str, load_kptfile, ConfigError, FunctionConfig,
    KptfileDefinitions, SearchReplaceConfig, SetterConfig, ValidationError,
};
pub use document::{load_str, render_documents, DocumentError, FieldPath, Node, Resource};
pub use engine::{ErrorKind, FieldResult, Report, SubstError, SubstitutionGraph};
pub use package::{FileChange, Package, PackageError};
