//! # stackread
//!
//! Read-path harness for multi-page TIFF stacks. It writes a known stack
//! into two directories, one alone and one surrounded by unrelated stacks,
//! and checks that opening the target yields the same single series either
//! way. A legacy-style loader is checked against the same file.
//!
//! # Scenarios
//!
//! ```text
//! setup      lonely/test.tif, cluttered/test.tif + 50 decoys
//! cluttered  open_series(cluttered/test.tif)  → exactly 1 series
//! lonely     open_series(lonely/test.tif)     → exactly 1 series
//! legacy     open_image(lonely/test.tif)      → 1024 x 1024, stack of 2
//! ```
//!
//! Each check runs 2 unmeasured warmup rounds and 5 measured rounds by
//! default. Every round is recorded, so a failure in any round fails the
//! check.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`imaging`] | Shapes, the [`imaging::StackBackend`] trait, and the TIFF implementation |
//! | [`fixtures`] | Builds the lonely/cluttered directory layout from scratch |
//! | [`verify`] | The three pass/fail checks |
//! | [`bench`] | Warmup and measured rounds with timing statistics |
//! | [`scan`] | Directory catalogs and single-file resolution |
//! | [`config`] | `config.toml` loading, merging onto stock defaults, validation |
//! | [`logging`] | `tracing` subscriber setup (text or JSON) |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Series Belong to a File, Not a Directory
//!
//! A series is a run of consecutive pages in one file that share a layout.
//! Resolving a file never lists or reads its siblings, so decoys can only
//! affect the result by corrupting the target itself.
//!
//! ## Two Read Paths
//!
//! `open_series` walks the IFD chain with the `tiff` decoder. `open_image`
//! decodes the first plane through the `image` crate and takes the stack
//! size from the ImageJ description. The legacy check therefore exercises a
//! different decoder than the series checks.

pub mod bench;
pub mod config;
pub mod fixtures;
pub mod imaging;
pub mod logging;
pub mod output;
pub mod scan;
pub mod verify;

#[cfg(test)]
pub(crate) mod test_helpers;
