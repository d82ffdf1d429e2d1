//! CLI output formatting for every command.
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.
//!
//! # Output Format
//!
//! ## Open
//!
//! ```text
//! lonely/test.tif
//!     Series 0: 1024x1024x2 (8-bit, 1 sample)
//! ```
//!
//! ## Bench
//!
//! ```text
//! cluttered-series  PASS  mean 1.21ms  min 1.10ms  max 1.40ms  sd 0.10ms
//!     Source: fixtures/cluttered/test.tif
//!     Rounds: 2 warmup + 5 measured
//! ```

use crate::bench::{BenchReport, CheckReport};
use crate::config::FixtureConfig;
use crate::fixtures::FixtureLayout;
use crate::imaging::{LegacyImage, Series};
use crate::scan::Catalog;
use crate::verify::{Check, VerifyError};
use std::path::Path;

// ============================================================================
// Shared helpers
// ============================================================================

fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn series_line(series: &Series) -> String {
    let samples = if series.samples_per_pixel == 1 {
        "1 sample".to_string()
    } else {
        format!("{} samples", series.samples_per_pixel)
    };
    format!(
        "Series {}: {}x{}x{} ({}-bit, {})",
        series.index, series.width, series.height, series.depth, series.bits_per_sample, samples
    )
}

fn pass_fail(passed: bool) -> &'static str {
    if passed { "PASS" } else { "FAIL" }
}

// ============================================================================
// Open / legacy
// ============================================================================

pub fn format_series(path: &Path, series: &[Series]) -> Vec<String> {
    let mut lines = vec![path.display().to_string()];
    if series.is_empty() {
        lines.push(format!("{}(no series)", indent(1)));
    }
    for s in series {
        lines.push(format!("{}{}", indent(1), series_line(s)));
    }
    lines
}

pub fn print_series(path: &Path, series: &[Series]) {
    for line in format_series(path, series) {
        println!("{}", line);
    }
}

pub fn format_legacy(path: &Path, image: &LegacyImage) -> Vec<String> {
    vec![
        path.display().to_string(),
        format!("{}Title: {}", indent(1), image.title),
        format!(
            "{}Size: {}x{}, stack of {}",
            indent(1),
            image.width,
            image.height,
            image.stack_size
        ),
    ]
}

pub fn print_legacy(path: &Path, image: &LegacyImage) {
    for line in format_legacy(path, image) {
        println!("{}", line);
    }
}

// ============================================================================
// Scan
// ============================================================================

pub fn format_catalog(catalog: &Catalog) -> Vec<String> {
    let mut lines = vec![format!(
        "{} ({} files, {} series)",
        catalog.dir.display(),
        catalog.entries.len(),
        catalog.series_count()
    )];
    for entry in &catalog.entries {
        match &entry.error {
            None => {
                let dims: Vec<String> = entry
                    .series
                    .iter()
                    .map(|s| format!("{}x{}x{}", s.width, s.height, s.depth))
                    .collect();
                lines.push(format!("{}{} → [{}]", indent(1), entry.name, dims.join(", ")));
            }
            Some(err) => {
                lines.push(format!("{}{} → unreadable", indent(1), entry.name));
                lines.push(format!("{}{}", indent(2), err));
            }
        }
    }
    lines
}

pub fn print_catalog(catalog: &Catalog) {
    for line in format_catalog(catalog) {
        println!("{}", line);
    }
}

// ============================================================================
// Fixtures
// ============================================================================

pub fn format_layout(layout: &FixtureLayout, config: &FixtureConfig) -> Vec<String> {
    let mut lines = vec![format!("Fixtures at {}", layout.root.display())];
    lines.push(format!(
        "{}{} ({})",
        indent(1),
        layout.lonely_target.display(),
        config.target_shape
    ));
    lines.push(format!(
        "{}{} ({})",
        indent(1),
        layout.cluttered_target.display(),
        config.target_shape
    ));
    lines.push(format!(
        "{}{} decoys ({}) in {}",
        indent(1),
        layout.decoys.len(),
        config.decoy_shape,
        layout.cluttered_dir.display()
    ));
    if !layout.target_digest.is_empty() {
        lines.push(format!("{}SHA-256: {}", indent(1), layout.target_digest));
    }
    lines
}

pub fn print_layout(layout: &FixtureLayout, config: &FixtureConfig) {
    for line in format_layout(layout, config) {
        println!("{}", line);
    }
}

// ============================================================================
// Verify
// ============================================================================

pub fn format_verify(results: &[(Check, Result<(), VerifyError>)]) -> Vec<String> {
    let mut lines = Vec::new();
    for (check, result) in results {
        lines.push(format!("{:<18}{}", check.name(), pass_fail(result.is_ok())));
        if let Err(e) = result {
            lines.push(format!("{}{}", indent(1), e));
        }
    }
    let passed = results.iter().filter(|(_, r)| r.is_ok()).count();
    lines.push(format!("{passed}/{} checks passed", results.len()));
    lines
}

pub fn print_verify(results: &[(Check, Result<(), VerifyError>)]) {
    for line in format_verify(results) {
        println!("{}", line);
    }
}

// ============================================================================
// Bench
// ============================================================================

fn check_header(report: &CheckReport) -> String {
    let mut header = format!("{:<18}{}", report.check.name(), pass_fail(report.passed()));
    if let Some(s) = report.stats {
        header.push_str(&format!(
            "  mean {:.2}ms  min {:.2}ms  max {:.2}ms  sd {:.2}ms",
            s.mean_ms, s.min_ms, s.max_ms, s.stddev_ms
        ));
    }
    header
}

pub fn format_bench_report(report: &BenchReport) -> Vec<String> {
    let mut lines = Vec::new();
    for check in &report.checks {
        lines.push(check_header(check));
        lines.push(format!("{}Source: {}", indent(1), check.target.display()));
        lines.push(format!(
            "{}Rounds: {} warmup + {} measured{}",
            indent(1),
            check.warmup.len(),
            check.measured.len(),
            if report.reset_per_round {
                ", fixtures reset each round"
            } else {
                ""
            }
        ));
        for (phase, rounds) in [("warmup", &check.warmup), ("round", &check.measured)] {
            for r in rounds.iter().filter(|r| !r.passed()) {
                lines.push(format!(
                    "{}{} {}: {}",
                    indent(2),
                    phase,
                    r.round,
                    r.error.as_deref().unwrap_or_default()
                ));
            }
        }
    }
    lines
}

pub fn print_bench_report(report: &BenchReport) {
    for line in format_bench_report(report) {
        println!("{}", line);
    }
}
