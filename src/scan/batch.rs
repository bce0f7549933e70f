//! Batch classification of labelled coordinates.
//!
//! Coordinates are independent, so they are classified on a dedicated rayon
//! pool capped at the configured concurrency. Results come back in input
//! order. One coordinate failing never aborts the batch: the failure is
//! logged and the result is recorded as `Outcome::Unknown`, which is distinct
//! from a classified-but-unlivable verdict.

use rayon::prelude::*;
use serde::Serialize;

use crate::assess::ClimateComparator;
use crate::ingest::City;
use crate::logging::{self, DataSource};
use crate::model::{Coordinate, DeviationThresholds, ElevationReading, LivabilityVerdict};
use crate::scan::ScanMode;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabeledCoordinate {
    pub label: String,
    pub coordinate: Coordinate,
}

impl From<&City> for LabeledCoordinate {
    fn from(city: &City) -> Self {
        Self {
            label: city.name.clone(),
            coordinate: city.coordinate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Classified {
        verdict: LivabilityVerdict,
    },
    SeaLevel {
        elevation: ElevationReading,
        above_sea_level: bool,
    },
    Unknown {
        reason: String,
    },
}

impl Outcome {
    /// `Some(pass)` for a completed check, `None` when unknown.
    pub fn passed(&self) -> Option<bool> {
        match self {
            Outcome::Classified { verdict } => Some(verdict.livable),
            Outcome::SeaLevel { above_sea_level, .. } => Some(*above_sea_level),
            Outcome::Unknown { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanResult {
    pub label: String,
    pub coordinate: Coordinate,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ScanSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub unknown: usize,
}

impl ScanSummary {
    pub fn from_results(results: &[ScanResult]) -> Self {
        let mut summary = ScanSummary {
            total: results.len(),
            ..Default::default()
        };
        for result in results {
            match result.outcome.passed() {
                Some(true) => summary.passed += 1,
                Some(false) => summary.failed += 1,
                None => summary.unknown += 1,
            }
        }
        summary
    }
}

fn classify_one(
    comparator: &ClimateComparator<'_>,
    target: &LabeledCoordinate,
    thresholds: &DeviationThresholds,
    mode: ScanMode,
) -> ScanResult {
    let outcome = match mode {
        ScanMode::Full => match comparator.classify_livability(target.coordinate, thresholds) {
            Ok(verdict) => Outcome::Classified { verdict },
            Err(err) => {
                logging::log_fetch_failure(DataSource::Scan, &target.label, "classification", &err);
                Outcome::Unknown {
                    reason: err.to_string(),
                }
            }
        },
        ScanMode::SeaLevelOnly => {
            let (elevation, above_sea_level) = comparator.check_sea_level(target.coordinate, thresholds);
            Outcome::SeaLevel {
                elevation,
                above_sea_level,
            }
        }
    };

    ScanResult {
        label: target.label.clone(),
        coordinate: target.coordinate,
        outcome,
    }
}

/// Classify every target, at most `concurrency` at a time.
pub fn classify_all(
    comparator: &ClimateComparator<'_>,
    targets: &[LabeledCoordinate],
    thresholds: &DeviationThresholds,
    mode: ScanMode,
    concurrency: usize,
) -> Result<Vec<ScanResult>, rayon::ThreadPoolBuildError> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(concurrency.max(1))
        .build()?;

    let results: Vec<ScanResult> = pool.install(|| {
        targets
            .par_iter()
            .map(|target| classify_one(comparator, target, thresholds, mode))
            .collect()
    });

    let summary = ScanSummary::from_results(&results);
    logging::log_scan_summary(
        DataSource::Scan,
        summary.total,
        summary.passed + summary.failed,
        summary.unknown,
    );

    Ok(results)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
