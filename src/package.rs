//! Reading a package directory into resources and writing changed files
//! back.

use crate::document::{load_str, render_documents, DocumentError, Resource};
use similar::TextDiff;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, trace};
use walkdir::{DirEntry, WalkDir};

#[derive(Error, Debug)]
pub enum PackageError {
    #[error("File I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error(transparent)]
    Document(#[from] DocumentError),
}

/// One YAML file of the package.
#[derive(Debug, Clone)]
struct PackageFile {
    path: PathBuf,
    /// Path relative to the package root, with `/` separators.
    relative: String,
    /// Rendering of the file as loaded.
    baseline: String,
}

/// A file whose rendering changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub path: PathBuf,
    pub before: String,
    pub after: String,
}

impl FileChange {
    /// Unified diff of the change.
    pub fn unified_diff(&self) -> String {
        let name = self.path.display();
        let old = format!("{name} (original)");
        let new = format!("{name} (updated)");
        let diff = TextDiff::from_lines(&self.before, &self.after);
        diff.unified_diff().header(&old, &new).to_string()
    }
}

/// The KRM resources of a directory tree (or a single file).
#[derive(Debug, Clone, Default)]
pub struct Package {
    files: Vec<PackageFile>,
    pub resources: Vec<Resource>,
}

impl Package {
    /// Load every `*.yaml` / `*.yml` file under `root`, skipping hidden
    /// directories and `exclude`.
    pub fn load(root: &Path, exclude: Option<&Path>) -> Result<Self, PackageError> {
        let base = if root.is_file() {
            root.parent().unwrap_or(Path::new(""))
        } else {
            root
        };
        let exclude = exclude.and_then(|p| p.canonicalize().ok());

        let mut paths = Vec::new();
        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry));
        for entry in walker {
            let entry = entry.map_err(|source| PackageError::Walk {
                path: root.to_path_buf(),
                source,
            })?;
            if !entry.file_type().is_file() || !is_yaml(entry.path()) {
                continue;
            }
            if exclude.is_some() && entry.path().canonicalize().ok() == exclude {
                trace!(path = %entry.path().display(), "excluded from package");
                continue;
            }
            paths.push(entry.into_path());
        }

        let mut package = Package::default();
        for path in paths {
            let text = fs::read_to_string(&path).map_err(|source| PackageError::Io {
                path: path.clone(),
                source,
            })?;
            let relative = relative_path(base, &path);
            let resources = load_str(&text, &relative)?;
            package.files.push(PackageFile {
                path,
                relative,
                baseline: render_documents(&resources),
            });
            package.resources.extend(resources);
        }
        debug!(
            files = package.files.len(),
            resources = package.resources.len(),
            "package loaded"
        );
        Ok(package)
    }

    /// Files whose resources now render differently than when loaded.
    pub fn changes(&self) -> Vec<FileChange> {
        self.files
            .iter()
            .filter_map(|file| {
                let after = render_documents(
                    self.resources
                        .iter()
                        .filter(|r| r.source_path == file.relative),
                );
                (after != file.baseline).then(|| FileChange {
                    path: file.path.clone(),
                    before: file.baseline.clone(),
                    after,
                })
            })
            .collect()
    }

    /// Write every changed file and return the changes.
    pub fn write(&self) -> Result<Vec<FileChange>, PackageError> {
        let changes = self.changes();
        for change in &changes {
            atomic_write(&change.path, change.after.as_bytes()).map_err(|source| {
                PackageError::Io {
                    path: change.path.clone(),
                    source,
                }
            })?;
            debug!(path = %change.path.display(), "file written");
        }
        Ok(changes)
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_str().is_some_and(|name| name.starts_with('.'))
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml" | "yml")
    )
}

fn relative_path(base: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(base).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Atomic file write: tempfile + fsync + rename.
fn atomic_write(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
