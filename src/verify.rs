//! The three verification checks.
//!
//! | Check | Path | Entry point | Pass condition |
//! |---|---|---|---|
//! | [`Check::ClutteredSeries`] | `cluttered/test.tif` | `open_series` | exactly 1 series, target dimensions |
//! | [`Check::LonelySeries`] | `lonely/test.tif` | `open_series` | exactly 1 series, target dimensions |
//! | [`Check::LegacyDimensions`] | `lonely/test.tif` | `open_image` | width, height, stack size equal the target shape |
//!
//! Each check is pass/fail and independent of the others. A failure names
//! the check and carries the expected and actual values.

use crate::config::FixtureConfig;
use crate::fixtures::{FixtureError, FixtureLayout, build_layout};
use crate::imaging::{BackendError, Shape, StackBackend};
use serde::Serialize;
use std::fmt;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Check {
    /// Target inside the cluttered directory resolves to one series.
    ClutteredSeries,
    /// Target inside the lonely directory resolves to one series.
    LonelySeries,
    /// Legacy loader agrees with the written dimensions.
    LegacyDimensions,
}

impl Check {
    pub const ALL: [Check; 3] = [
        Check::ClutteredSeries,
        Check::LonelySeries,
        Check::LegacyDimensions,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Check::ClutteredSeries => "cluttered-series",
            Check::LonelySeries => "lonely-series",
            Check::LegacyDimensions => "legacy-dimensions",
        }
    }

    /// The file this check opens.
    pub fn target(self, layout: &FixtureLayout) -> &Path {
        match self {
            Check::ClutteredSeries => &layout.cluttered_target,
            Check::LonelySeries | Check::LegacyDimensions => &layout.lonely_target,
        }
    }
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

type Dims = (u32, u32, u64);

#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("{check}: {source}")]
    Backend {
        check: Check,
        #[source]
        source: BackendError,
    },
    #[error("{check}: expected {expected} series, found {actual}")]
    SeriesCount {
        check: Check,
        expected: usize,
        actual: usize,
    },
    #[error("{check}: expected {expected:?} (width, height, depth), found {actual:?}")]
    Dimensions {
        check: Check,
        expected: Dims,
        actual: Dims,
    },
}

fn expected_dims(shape: &Shape) -> Dims {
    (shape.width(), shape.height(), shape.depth())
}

/// Run one check against a built layout.
pub fn run_check(
    backend: &impl StackBackend,
    layout: &FixtureLayout,
    target_shape: &Shape,
    check: Check,
) -> Result<(), VerifyError> {
    let path = check.target(layout);
    let expected = expected_dims(target_shape);
    let backend_err = |source| VerifyError::Backend { check, source };

    let actual = match check {
        Check::ClutteredSeries | Check::LonelySeries => {
            let series = backend.open_series(path).map_err(backend_err)?;
            if series.len() != 1 {
                return Err(VerifyError::SeriesCount {
                    check,
                    expected: 1,
                    actual: series.len(),
                });
            }
            series[0].dimensions()
        }
        Check::LegacyDimensions => {
            let image = backend.open_image(path).map_err(backend_err)?;
            (image.width, image.height, image.stack_size)
        }
    };

    if actual != expected {
        return Err(VerifyError::Dimensions {
            check,
            expected,
            actual,
        });
    }
    Ok(())
}

/// Run every check once, collecting each outcome.
pub fn run_all(
    backend: &impl StackBackend,
    layout: &FixtureLayout,
    target_shape: &Shape,
) -> Vec<(Check, Result<(), VerifyError>)> {
    Check::ALL
        .iter()
        .map(|&check| (check, run_check(backend, layout, target_shape, check)))
        .collect()
}

/// Run every check once, each against a freshly built layout.
///
/// Fails only when setup fails; check failures are returned per check.
pub fn run_each_fresh(
    backend: &impl StackBackend,
    fixtures: &FixtureConfig,
) -> Result<Vec<(Check, Result<(), VerifyError>)>, FixtureError> {
    let mut results = Vec::with_capacity(Check::ALL.len());
    for check in Check::ALL {
        let layout = build_layout(backend, fixtures)?;
        results.push((check, run_check(backend, &layout, &fixtures.target_shape, check)));
    }
    Ok(results)
}
