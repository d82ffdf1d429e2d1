//! Directory scanning.
//!
//! Two ways to find stacks in a directory:
//!
//! - [`scan_directory`] lists every `.tif`/`.tiff` file (optionally
//!   recursively) and resolves each one, producing a [`Catalog`]. Files that
//!   fail to resolve are recorded with their error instead of aborting the
//!   scan.
//! - [`resolve_in`] resolves one named file and never lists or opens its
//!   siblings, so the result cannot depend on what else is in the directory.
//!
//! ## Output
//!
//! ```text
//! cluttered/
//! ├── dummy0.tiff   → [256x256x1]
//! ├── ...
//! ├── dummy49.tiff  → [256x256x1]
//! └── test.tif      → [1024x1024x2]
//! ```

use crate::imaging::{BackendError, Series, StackBackend, is_stack_file};
use rayon::prelude::*;
use serde::Serialize;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("No such file: {0}")]
    NotFound(PathBuf),
    #[error("Not a bare file name: {0}")]
    InvalidName(String),
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ScanOptions {
    /// Descend into subdirectories.
    pub recursive: bool,
}

/// One stack file found by a scan.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogEntry {
    pub path: PathBuf,
    /// Path relative to the scanned directory.
    pub name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub series: Vec<Series>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CatalogEntry {
    pub fn is_readable(&self) -> bool {
        self.error.is_none()
    }
}

/// Every stack file in a directory, sorted by path.
#[derive(Debug, Clone, Serialize)]
pub struct Catalog {
    pub dir: PathBuf,
    pub entries: Vec<CatalogEntry>,
}

impl Catalog {
    /// Find an entry by its relative name.
    pub fn find(&self, name: &str) -> Option<&CatalogEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn unreadable(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.iter().filter(|e| !e.is_readable())
    }

    /// Total series across all readable entries.
    pub fn series_count(&self) -> usize {
        self.entries.iter().map(|e| e.series.len()).sum()
    }
}

/// List stack files under `dir`, sorted by path.
pub fn list_stack_files(dir: &Path, options: ScanOptions) -> Result<Vec<PathBuf>, ScanError> {
    if !dir.is_dir() {
        return Err(ScanError::NotADirectory(dir.to_path_buf()));
    }
    let max_depth = if options.recursive { usize::MAX } else { 1 };

    let mut files = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(max_depth)
        .sort_by_file_name()
    {
        let entry = entry?;
        if entry.file_type().is_file() && is_stack_file(entry.path()) {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

/// Resolve every stack file under `dir`.
///
/// Files are resolved in parallel on the global rayon pool; entry order
/// follows [`list_stack_files`].
pub fn scan_directory(
    backend: &impl StackBackend,
    dir: &Path,
    options: ScanOptions,
) -> Result<Catalog, ScanError> {
    let files = list_stack_files(dir, options)?;
    debug!(dir = %dir.display(), files = files.len(), "scanning");

    let entries = files
        .into_par_iter()
        .map(|path| {
            let name = path
                .strip_prefix(dir)
                .unwrap_or(path.as_path())
                .to_string_lossy()
                .to_string();
            match backend.open_series(&path) {
                Ok(series) => CatalogEntry {
                    path,
                    name,
                    series,
                    error: None,
                },
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "unreadable stack");
                    CatalogEntry {
                        path,
                        name,
                        series: Vec::new(),
                        error: Some(e.to_string()),
                    }
                }
            }
        })
        .collect();

    Ok(Catalog {
        dir: dir.to_path_buf(),
        entries,
    })
}

/// Resolve `file_name` inside `dir` without looking at any other file.
pub fn resolve_in(
    backend: &impl StackBackend,
    dir: &Path,
    file_name: &str,
) -> Result<Vec<Series>, ScanError> {
    if Path::new(file_name).file_name() != Some(OsStr::new(file_name)) {
        return Err(ScanError::InvalidName(file_name.to_string()));
    }
    let path = dir.join(file_name);
    if !path.is_file() {
        return Err(ScanError::NotFound(path));
    }
    Ok(backend.open_series(&path)?)
}
