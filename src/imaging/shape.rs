//! Stack shapes.
//!
//! A [`Shape`] is the ordered list of per-axis sizes of a pixel buffer:
//! `[width, height, d2, d3, ...]`. Only the first two axes are spatial; every
//! axis after that multiplies the number of planes, so `[1024, 1024, 2]` is a
//! two-page stack and `[64, 64, 3, 4]` is a twelve-page stack.
//!
//! Shapes are validated on construction. A shape that cannot be stored as a
//! classic TIFF page chain (too few axes, an empty axis, a page wider than
//! `u32`, a file past the 4 GiB offset limit, or a buffer larger than the
//! address space) is rejected with
//! [`BackendError::IncompatibleShape`].

use super::backend::BackendError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Validated per-axis sizes of a stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<u64>", into = "Vec<u64>")]
pub struct Shape(pub(crate) Vec<u64>);

/// Largest file a classic (32-bit offset) TIFF can address.
const CLASSIC_TIFF_MAX_BYTES: u64 = u32::MAX as u64;

/// Upper bound on the header, IFD and tag bytes written per page.
const PAGE_OVERHEAD_BYTES: u64 = 512;

impl Shape {
    pub fn new(axes: Vec<u64>) -> Result<Self, BackendError> {
        let shape = Self(axes);
        shape.validate()?;
        Ok(shape)
    }

    /// Check that the shape can be written as one classic TIFF page chain.
    pub fn validate(&self) -> Result<(), BackendError> {
        let axes = &self.0;
        if axes.len() < 2 {
            return Err(BackendError::IncompatibleShape(format!(
                "need at least width and height, got {} axes",
                axes.len()
            )));
        }
        if let Some(pos) = axes.iter().position(|&n| n == 0) {
            return Err(BackendError::IncompatibleShape(format!(
                "axis {pos} has size 0"
            )));
        }
        if axes[0] > u32::MAX as u64 || axes[1] > u32::MAX as u64 {
            return Err(BackendError::IncompatibleShape(format!(
                "page {}x{} exceeds the TIFF limit of {} per side",
                axes[0],
                axes[1],
                u32::MAX
            )));
        }
        let file_bytes = self.file_len_estimate();
        if file_bytes.is_none_or(|n| n > CLASSIC_TIFF_MAX_BYTES) {
            return Err(BackendError::IncompatibleShape(format!(
                "{self} exceeds the 4 GiB classic TIFF limit"
            )));
        }
        let plane_fits = usize::try_from(axes[0] * axes[1])
            .is_ok_and(|n| n <= isize::MAX as usize);
        if !plane_fits || self.byte_len().is_none() {
            return Err(BackendError::IncompatibleShape(format!(
                "{self} does not fit in memory"
            )));
        }
        Ok(())
    }

    pub fn axes(&self) -> &[u64] {
        &self.0
    }

    pub fn width(&self) -> u32 {
        self.0[0] as u32
    }

    pub fn height(&self) -> u32 {
        self.0[1] as u32
    }

    /// Number of planes: the product of every axis after width and height.
    pub fn depth(&self) -> u64 {
        self.0[2..].iter().product()
    }

    /// Bytes in one 8-bit plane.
    pub fn plane_len(&self) -> usize {
        (self.0[0] * self.0[1]) as usize
    }

    /// Pixel bytes plus per-page overhead, `None` on overflow.
    fn file_len_estimate(&self) -> Option<u64> {
        let pixels = self.0.iter().try_fold(1u64, |acc, &n| acc.checked_mul(n))?;
        let depth = self.0[2..].iter().try_fold(1u64, |acc, &n| acc.checked_mul(n))?;
        pixels.checked_add(depth.checked_mul(PAGE_OVERHEAD_BYTES)?)
    }

    /// Total bytes of the 8-bit buffer, `None` on overflow.
    fn byte_len(&self) -> Option<usize> {
        self.0
            .iter()
            .try_fold(1usize, |acc, &n| acc.checked_mul(usize::try_from(n).ok()?))
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|n| n.to_string()).collect();
        write!(f, "{}", parts.join("x"))
    }
}

/// Parses `1024x1024x2` (also accepts `,` as the separator).
impl FromStr for Shape {
    type Err = BackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let axes = s
            .split(['x', 'X', ','])
            .map(|part| {
                part.trim().parse::<u64>().map_err(|_| {
                    BackendError::IncompatibleShape(format!("invalid axis size {part:?} in {s:?}"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(axes)
    }
}

impl TryFrom<Vec<u64>> for Shape {
    type Error = BackendError;

    fn try_from(axes: Vec<u64>) -> Result<Self, Self::Error> {
        Self::new(axes)
    }
}

impl From<Shape> for Vec<u64> {
    fn from(shape: Shape) -> Self {
        shape.0
    }
}
