//! Warmup and measured rounds.
//!
//! Each requested check gets a fresh fixture layout, then `warmup`
//! unmeasured rounds, then `measured` timed rounds. Every round's outcome is
//! kept in the report, so a failure in a late round is visible even when
//! earlier rounds passed.
//!
//! With `reset_per_round` the layout is rebuilt before every round after the
//! first; setup time is never part of a round's elapsed time.

use crate::config::{FixtureConfig, RoundsConfig};
use crate::fixtures::{FixtureError, build_layout};
use crate::imaging::StackBackend;
use crate::verify::{Check, run_check};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum BenchError {
    #[error("Fixture setup failed: {0}")]
    Fixture(#[from] FixtureError),
}

/// One execution of a check.
#[derive(Debug, Clone, Serialize)]
pub struct RoundResult {
    /// 0-based within its phase (warmup or measured).
    pub round: usize,
    pub elapsed_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RoundResult {
    pub fn passed(&self) -> bool {
        self.error.is_none()
    }
}

/// Summary of the measured rounds' elapsed times.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Stats {
    pub mean_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    /// Population standard deviation.
    pub stddev_ms: f64,
}

impl Stats {
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let n = samples.len() as f64;
        let mean = samples.iter().sum::<f64>() / n;
        let variance = samples.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
        Some(Self {
            mean_ms: mean,
            min_ms: samples.iter().copied().fold(f64::INFINITY, f64::min),
            max_ms: samples.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            stddev_ms: variance.sqrt(),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub check: Check,
    pub target: PathBuf,
    pub warmup: Vec<RoundResult>,
    pub measured: Vec<RoundResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<Stats>,
}

impl CheckReport {
    pub fn failures(&self) -> impl Iterator<Item = &RoundResult> {
        self.warmup
            .iter()
            .chain(self.measured.iter())
            .filter(|r| !r.passed())
    }

    pub fn passed(&self) -> bool {
        self.failures().next().is_none()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BenchReport {
    pub warmup: usize,
    pub measured: usize,
    pub reset_per_round: bool,
    pub checks: Vec<CheckReport>,
}

impl BenchReport {
    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(CheckReport::passed)
    }
}

/// Run `checks` with the round counts from `rounds`.
pub fn run(
    backend: &impl StackBackend,
    fixtures: &FixtureConfig,
    rounds: &RoundsConfig,
    checks: &[Check],
) -> Result<BenchReport, BenchError> {
    let mut reports = Vec::with_capacity(checks.len());

    for &check in checks {
        let mut layout = build_layout(backend, fixtures)?;
        let mut warmup = Vec::with_capacity(rounds.warmup);
        let mut measured = Vec::with_capacity(rounds.measured);

        for i in 0..rounds.warmup + rounds.measured {
            if rounds.reset_per_round && i > 0 {
                layout = build_layout(backend, fixtures)?;
            }

            let start = Instant::now();
            let outcome = run_check(backend, &layout, &fixtures.target_shape, check);
            let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

            let is_warmup = i < rounds.warmup;
            let round = if is_warmup { i } else { i - rounds.warmup };
            if let Err(e) = &outcome {
                warn!(%check, round, warmup = is_warmup, error = %e, "round failed");
            }
            let result = RoundResult {
                round,
                elapsed_ms,
                error: outcome.err().map(|e| e.to_string()),
            };
            if is_warmup {
                warmup.push(result);
            } else {
                measured.push(result);
            }
        }

        let samples: Vec<f64> = measured.iter().map(|r| r.elapsed_ms).collect();
        let stats = Stats::from_samples(&samples);
        if let Some(s) = &stats {
            info!(%check, mean_ms = s.mean_ms, stddev_ms = s.stddev_ms, "check complete");
        }

        reports.push(CheckReport {
            check,
            target: check.target(&layout).to_path_buf(),
            warmup,
            measured,
            stats,
        });
    }

    Ok(BenchReport {
        warmup: rounds.warmup,
        measured: rounds.measured,
        reset_per_round: rounds.reset_per_round,
        checks: reports,
    })
}
