//! Stack backend trait and shared types.
//!
//! The [`StackBackend`] trait defines the three operations the rest of the
//! crate needs from an image codec: write a shaped buffer to a path, resolve
//! a path to its series list, and open a path through the legacy single-image
//! entry point.
//!
//! The production implementation is
//! [`TiffBackend`](super::tiff_backend::TiffBackend). Orchestration code
//! (fixtures, checks, rounds) only sees the trait, so it can be exercised
//! with the mock in this module's tests.

use super::shape::Shape;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Not a file: {0}")]
    NotAFile(PathBuf),
    #[error("Incompatible shape: {0}")]
    IncompatibleShape(String),
    #[error("Decode failed: {0}")]
    Decode(String),
}

/// One logical image inside a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Series {
    pub index: usize,
    pub width: u32,
    pub height: u32,
    /// Number of pages (planes) in this series.
    pub depth: u64,
    pub bits_per_sample: u8,
    pub samples_per_pixel: u8,
}

impl Series {
    pub fn dimensions(&self) -> (u32, u32, u64) {
        (self.width, self.height, self.depth)
    }
}

/// What the legacy loader reports for a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LegacyImage {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub stack_size: u64,
}

/// Trait for stack codecs.
pub trait StackBackend: Sync {
    /// Write a zero-filled 8-bit buffer of `shape` to `path`.
    fn write_stack(&self, path: &Path, shape: &Shape) -> Result<(), BackendError>;

    /// Resolve the file at `path` into its ordered series list.
    fn open_series(&self, path: &Path) -> Result<Vec<Series>, BackendError>;

    /// Open `path` as a single image with a stack size.
    fn open_image(&self, path: &Path) -> Result<LegacyImage, BackendError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Mock backend that records operations and answers from an in-memory
    /// table of written shapes instead of touching pixel data.
    ///
    /// `write_stack` still creates an empty file so directory listings see
    /// it. Uses Mutex (not RefCell) so it is Sync.
    #[derive(Default)]
    pub struct MockBackend {
        pub written: Mutex<HashMap<PathBuf, Shape>>,
        pub operations: Mutex<Vec<RecordedOp>>,
        /// Series count reported for every path, overriding the real count of 1.
        pub forced_series: Mutex<Option<usize>>,
        /// Fail `open_series` starting at this call number (0-based).
        pub fail_from_call: Mutex<Option<usize>>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        Write { path: String, shape: Vec<u64> },
        OpenSeries(String),
        OpenImage(String),
    }

    impl MockBackend {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_series_count(count: usize) -> Self {
            let backend = Self::default();
            *backend.forced_series.lock().unwrap() = Some(count);
            backend
        }

        pub fn failing_from(call: usize) -> Self {
            let backend = Self::default();
            *backend.fail_from_call.lock().unwrap() = Some(call);
            backend
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.lock().unwrap().clone()
        }

        fn open_series_calls(&self) -> usize {
            self.operations
                .lock()
                .unwrap()
                .iter()
                .filter(|op| matches!(op, RecordedOp::OpenSeries(_)))
                .count()
        }

        fn shape_of(&self, path: &Path) -> Result<Shape, BackendError> {
            self.written
                .lock()
                .unwrap()
                .get(path)
                .cloned()
                .ok_or_else(|| {
                    BackendError::Io(std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        format!("nothing written at {}", path.display()),
                    ))
                })
        }
    }

    impl StackBackend for MockBackend {
        fn write_stack(&self, path: &Path, shape: &Shape) -> Result<(), BackendError> {
            self.operations.lock().unwrap().push(RecordedOp::Write {
                path: path.to_string_lossy().to_string(),
                shape: shape.axes().to_vec(),
            });
            std::fs::write(path, b"")?;
            self.written
                .lock()
                .unwrap()
                .insert(path.to_path_buf(), shape.clone());
            Ok(())
        }

        fn open_series(&self, path: &Path) -> Result<Vec<Series>, BackendError> {
            let call = self.open_series_calls();
            self.operations
                .lock()
                .unwrap()
                .push(RecordedOp::OpenSeries(path.to_string_lossy().to_string()));

            if let Some(from) = *self.fail_from_call.lock().unwrap() {
                if call >= from {
                    return Err(BackendError::Decode(format!("mock failure on call {call}")));
                }
            }

            let shape = self.shape_of(path)?;
            let count = self.forced_series.lock().unwrap().unwrap_or(1);
            Ok((0..count)
                .map(|index| Series {
                    index,
                    width: shape.width(),
                    height: shape.height(),
                    depth: shape.depth(),
                    bits_per_sample: 8,
                    samples_per_pixel: 1,
                })
                .collect())
        }

        fn open_image(&self, path: &Path) -> Result<LegacyImage, BackendError> {
            self.operations
                .lock()
                .unwrap()
                .push(RecordedOp::OpenImage(path.to_string_lossy().to_string()));

            let shape = self.shape_of(path)?;
            Ok(LegacyImage {
                title: "mock".to_string(),
                width: shape.width(),
                height: shape.height(),
                stack_size: shape.depth(),
            })
        }
    }

    #[test]
    fn mock_answers_from_written_shapes() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("a.tif");
        let backend = MockBackend::new();
        backend
            .write_stack(&path, &Shape::new(vec![64, 32, 3]).unwrap())
            .unwrap();

        let series = backend.open_series(&path).unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].dimensions(), (64, 32, 3));

        let image = backend.open_image(&path).unwrap();
        assert_eq!(image.stack_size, 3);

        let ops = backend.get_operations();
        assert_eq!(ops.len(), 3);
        assert!(matches!(&ops[0], RecordedOp::Write { shape, .. } if shape == &vec![64, 32, 3]));
    }

    #[test]
    fn mock_fails_from_configured_call() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("a.tif");
        let backend = MockBackend::failing_from(1);
        backend
            .write_stack(&path, &Shape::new(vec![8, 8]).unwrap())
            .unwrap();

        assert!(backend.open_series(&path).is_ok());
        assert!(backend.open_series(&path).is_err());
    }

    #[test]
    fn mock_reports_missing_paths_as_io() {
        let backend = MockBackend::new();
        let err = backend.open_series(Path::new("/nowhere.tif")).unwrap_err();
        assert!(matches!(err, BackendError::Io(_)));
    }
}
