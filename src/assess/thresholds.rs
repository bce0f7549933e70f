//! Deviation and sea-level threshold checks.
//!
//! All predicates here are pure. Boundary values pass: rejection happens
//! only on strict inequality, so `change == ±limit` is within limits.

use crate::model::{DeviationThresholds, ElevationReading};

/// Returns `true` if `elevation_m` stays more than the safety margin above
/// the sea level after the assumed rise.
///
///   elevation - rise >  margin  →  above
///   elevation - rise <= margin  →  not above
pub fn is_above_future_sea_level(elevation_m: f64, thresholds: &DeviationThresholds) -> bool {
    elevation_m - thresholds.sea_level_rise_m > thresholds.safety_margin_m
}

/// Sea-level check for an elevation lookup outcome.
///
/// A `Fallback` reading (provider failure) counts as above sea level: an
/// unknown elevation is assumed safe. Measured elevations, including a
/// measured 0 m, go through `is_above_future_sea_level`.
pub fn sea_level_check(elevation: &ElevationReading, thresholds: &DeviationThresholds) -> bool {
    match elevation {
        ElevationReading::Measured { meters } => is_above_future_sea_level(*meters, thresholds),
        ElevationReading::Fallback { .. } => true,
    }
}

/// Returns `true` if `change_pct` lies in `[-limit_pct, limit_pct]`.
///
/// An undefined change (`None`, zero baseline) never passes.
pub fn within_deviation(change_pct: Option<f64>, limit_pct: f64) -> bool {
    match change_pct {
        Some(change) => !(change < -limit_pct || change > limit_pct),
        None => false,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
