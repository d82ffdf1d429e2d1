//! Shared test utilities for the stackread test suite.
//!
//! ```ignore
//! use crate::test_helpers::*;
//!
//! let tmp = TempDir::new().unwrap();
//! let config = small_fixture_config(tmp.path(), 3);
//! let layout = build_layout(&TiffBackend::new(), &config).unwrap();
//! assert_eq!(series_dims(&backend.open_series(&layout.lonely_target).unwrap()),
//!            vec![(64, 48, 2)]);
//! ```

use std::path::Path;

use crate::config::FixtureConfig;
use crate::imaging::{Series, Shape};

// =========================================================================
// Fixture setup
// =========================================================================

/// Fixture config rooted at `root` with small shapes, so tests that write
/// real TIFFs stay fast. Names match the stock layout.
pub fn small_fixture_config(root: &Path, decoys: usize) -> FixtureConfig {
    FixtureConfig {
        root: root.to_path_buf(),
        target_shape: Shape::new(vec![64, 48, 2]).unwrap(),
        decoy_count: decoys,
        decoy_shape: Shape::new(vec![16, 16]).unwrap(),
        ..FixtureConfig::default()
    }
}

// =========================================================================
// Extractors
// =========================================================================

/// `(width, height, depth)` of every series, in order.
pub fn series_dims(series: &[Series]) -> Vec<(u32, u32, u64)> {
    series.iter().map(Series::dimensions).collect()
}
