//! Stack I/O behind one narrow seam.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Write** shaped buffer → path | `tiff` encoder, one 8-bit page per plane |
//! | **Resolve** path → series list | `tiff` decoder IFD walk |
//! | **Legacy open** path → width/height/stack size | `image` decoder + ImageJ description |
//!
//! The module is split into:
//! - **Shape**: validated per-axis sizes ([`Shape`])
//! - **Backend**: [`StackBackend`] trait + [`TiffBackend`]
//! - **ImageJ**: the `images=`/`slices=` description block

pub mod backend;
pub(crate) mod imagej;
mod shape;
pub mod tiff_backend;

pub use backend::{BackendError, LegacyImage, Series, StackBackend};
pub use shape::Shape;
pub use tiff_backend::{TiffBackend, is_stack_file};
