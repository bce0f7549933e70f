//! Livability assessment.
//!
//! Threshold predicates live in `thresholds`; the comparator that fetches,
//! reduces, and combines everything into a `LivabilityVerdict` lives in
//! `livability`.

pub mod livability;
pub mod thresholds;

pub use livability::{ClimateComparator, ClimatePeriod};
