//! Integration tests for the function catalog.
//!
//! `scenarios` covers the documented end-to-end cases, `package` runs the
//! functions over package directories on disk.

mod package;
mod scenarios;
