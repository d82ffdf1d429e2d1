//! Fixture directories.
//!
//! Setup builds two sibling directories under the fixture root:
//!
//! ```text
//! fixtures/
//! ├── lonely/
//! │   └── test.tif          # target, 1024x1024x2
//! └── cluttered/
//!     ├── test.tif          # same target
//!     ├── dummy0.tiff       # decoy, 256x256
//!     ├── ...
//!     └── dummy49.tiff
//! ```
//!
//! Both directories are deleted recursively and recreated on every call to
//! [`build_layout`], so a layout never carries files from an earlier run.
//! The target's SHA-256 digest is recorded so repeated setups can be
//! compared byte-for-byte.

use crate::config::FixtureConfig;
use crate::imaging::{BackendError, Shape, StackBackend};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

pub const LONELY_DIR: &str = "lonely";
pub const CLUTTERED_DIR: &str = "cluttered";

#[derive(Error, Debug)]
pub enum FixtureError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to write {path}: {source}")]
    Backend {
        path: PathBuf,
        #[source]
        source: BackendError,
    },
}

/// Paths of a fixture layout. [`FixtureLayout::plan`] computes them without
/// touching the filesystem; [`build_layout`] creates the files.
#[derive(Debug, Clone, Serialize)]
pub struct FixtureLayout {
    pub root: PathBuf,
    pub lonely_dir: PathBuf,
    pub cluttered_dir: PathBuf,
    pub lonely_target: PathBuf,
    pub cluttered_target: PathBuf,
    pub decoys: Vec<PathBuf>,
    /// SHA-256 of the target file; empty until built.
    pub target_digest: String,
}

impl FixtureLayout {
    pub fn plan(config: &FixtureConfig) -> Self {
        let root = config.root.clone();
        let lonely_dir = root.join(LONELY_DIR);
        let cluttered_dir = root.join(CLUTTERED_DIR);
        let decoys = (0..config.decoy_count)
            .map(|i| cluttered_dir.join(config.decoy_name(i)))
            .collect();

        Self {
            lonely_target: lonely_dir.join(&config.target_name),
            cluttered_target: cluttered_dir.join(&config.target_name),
            root,
            lonely_dir,
            cluttered_dir,
            decoys,
            target_digest: String::new(),
        }
    }
}

/// Hex SHA-256 of a file, streamed so large stacks are not read into memory.
pub fn hash_file(path: &Path) -> io::Result<String> {
    let mut hasher = Sha256::new();
    io::copy(&mut io::BufReader::new(fs::File::open(path)?), &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// Delete `dir` recursively if it exists, then create it empty.
pub fn reset_dir(dir: &Path) -> Result<(), FixtureError> {
    let io_err = |source| FixtureError::Io {
        path: dir.to_path_buf(),
        source,
    };
    match fs::remove_dir_all(dir) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(io_err(e)),
    }
    fs::create_dir_all(dir).map_err(io_err)
}

fn write(backend: &impl StackBackend, path: &Path, shape: &Shape) -> Result<(), FixtureError> {
    backend
        .write_stack(path, shape)
        .map_err(|source| FixtureError::Backend {
            path: path.to_path_buf(),
            source,
        })
}

/// Tear down and rebuild the fixture layout described by `config`.
pub fn build_layout(
    backend: &impl StackBackend,
    config: &FixtureConfig,
) -> Result<FixtureLayout, FixtureError> {
    let mut layout = FixtureLayout::plan(config);
    info!(root = %layout.root.display(), decoys = config.decoy_count, "building fixtures");

    reset_dir(&layout.lonely_dir)?;
    reset_dir(&layout.cluttered_dir)?;

    write(backend, &layout.lonely_target, &config.target_shape)?;
    write(backend, &layout.cluttered_target, &config.target_shape)?;

    for decoy in &layout.decoys {
        write(backend, decoy, &config.decoy_shape)?;
    }
    debug!(count = layout.decoys.len(), "wrote decoys");

    layout.target_digest = hash_file(&layout.lonely_target).map_err(|source| FixtureError::Io {
        path: layout.lonely_target.clone(),
        source,
    })?;
    Ok(layout)
}
