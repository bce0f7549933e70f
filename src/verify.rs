//! Data Source Verification Module
//!
//! Queries every external provider once at a reference coordinate to tell
//! which ones are reachable and returning usable data. Run this before a
//! long batch or grid sweep, or after changing endpoints or the API key.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::time::Instant;

use crate::assess::ClimatePeriod;
use crate::config::Config;
use crate::ingest::{self, CityCatalog, ClimateProvider, ElevationProvider, Geocoder, SeriesRequest};
use crate::model::{ClimateVariable, Coordinate};

/// Berlin, the reference location for every check.
pub const REFERENCE_LATITUDE: f64 = 52.52;
pub const REFERENCE_LONGITUDE: f64 = 13.41;
pub const REFERENCE_CITY: &str = "Berlin";

/// Catalog check: the few largest cities above one million inhabitants.
const CATALOG_CHECK_POPULATION: u64 = 1_000_000;
const CATALOG_CHECK_LIMIT: usize = 5;

// ============================================================================
// Verification Results
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    pub timestamp: String,
    pub reference: Coordinate,
    pub results: Vec<SourceVerification>,
    pub summary: VerificationSummary,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct VerificationSummary {
    pub total: usize,
    pub working: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceVerification {
    pub source: String,
    pub status: VerificationStatus,
    pub sample_data_count: usize,
    /// Short human-readable note about what came back.
    pub detail: Option<String>,
    pub error_message: Option<String>,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum VerificationStatus {
    Success,
    PartialSuccess,
    Failed,
}

impl SourceVerification {
    fn failed(source: &str, started: Instant, message: String) -> Self {
        Self {
            source: source.to_string(),
            status: VerificationStatus::Failed,
            sample_data_count: 0,
            detail: None,
            error_message: Some(message),
            elapsed_ms: started.elapsed().as_millis() as u64,
        }
    }
}

// ============================================================================
// Per-source checks
// ============================================================================

/// Daily series for `period`. Partial when any variable came back empty.
pub fn verify_series(
    source: &str,
    provider: &dyn ClimateProvider,
    coordinate: Coordinate,
    period: &ClimatePeriod,
) -> SourceVerification {
    let started = Instant::now();
    let request = SeriesRequest {
        coordinate,
        start: period.start,
        end: period.end,
        model: period.model.clone(),
    };

    let series = match provider.fetch_daily_series(&request) {
        Ok(series) => series,
        Err(e) => return SourceVerification::failed(source, started, e.to_string()),
    };

    let mut empty = Vec::new();
    let mut count = 0;
    for variable in ClimateVariable::ALL {
        match series.values.get(&variable) {
            Some(values) if !values.is_empty() => count += values.len(),
            _ => empty.push(variable.api_name()),
        }
    }

    let (status, detail) = if empty.is_empty() {
        (VerificationStatus::Success, format!("{} daily values", count))
    } else {
        (VerificationStatus::PartialSuccess, format!("no values for {}", empty.join(", ")))
    };

    SourceVerification {
        source: source.to_string(),
        status,
        sample_data_count: count,
        detail: Some(detail),
        error_message: None,
        elapsed_ms: started.elapsed().as_millis() as u64,
    }
}

pub fn verify_elevation(provider: &dyn ElevationProvider, coordinate: Coordinate) -> SourceVerification {
    let started = Instant::now();
    match provider.fetch_elevation(coordinate) {
        Ok(meters) => SourceVerification {
            source: "elevation".to_string(),
            status: VerificationStatus::Success,
            sample_data_count: 1,
            detail: Some(format!("{:.1} m", meters)),
            error_message: None,
            elapsed_ms: started.elapsed().as_millis() as u64,
        },
        Err(e) => SourceVerification::failed("elevation", started, e.to_string()),
    }
}

pub fn verify_geocoding(geocoder: &dyn Geocoder, name: &str) -> SourceVerification {
    let started = Instant::now();
    match geocoder.resolve_city_name(name) {
        Ok(coordinate) => SourceVerification {
            source: "geocoding".to_string(),
            status: VerificationStatus::Success,
            sample_data_count: 1,
            detail: Some(format!("{} -> {}", name, coordinate)),
            error_message: None,
            elapsed_ms: started.elapsed().as_millis() as u64,
        },
        Err(e) => SourceVerification::failed("geocoding", started, e.to_string()),
    }
}

/// Partial when the catalog answers but lists no city.
pub fn verify_catalog(catalog: &dyn CityCatalog) -> SourceVerification {
    let started = Instant::now();
    match catalog.list_cities_above_population(CATALOG_CHECK_POPULATION, CATALOG_CHECK_LIMIT) {
        Ok(cities) => {
            let status = if cities.is_empty() {
                VerificationStatus::PartialSuccess
            } else {
                VerificationStatus::Success
            };
            let names: Vec<&str> = cities.iter().map(|c| c.name.as_str()).collect();
            SourceVerification {
                source: "catalog".to_string(),
                status,
                sample_data_count: cities.len(),
                detail: Some(names.join(", ")),
                error_message: None,
                elapsed_ms: started.elapsed().as_millis() as u64,
            }
        }
        Err(e) => SourceVerification::failed("catalog", started, e.to_string()),
    }
}

// ============================================================================
// Runner
// ============================================================================

pub struct VerificationTargets<'a> {
    pub climate: &'a dyn ClimateProvider,
    pub elevation: &'a dyn ElevationProvider,
    pub geocoder: &'a dyn Geocoder,
    pub catalog: &'a dyn CityCatalog,
}

/// Check archive, projection, elevation, geocoding, and catalog in that order.
pub fn run_verification(
    targets: &VerificationTargets<'_>,
    baseline: &ClimatePeriod,
    projection: &ClimatePeriod,
) -> Result<VerificationReport, Box<dyn Error>> {
    let reference = Coordinate::new(REFERENCE_LATITUDE, REFERENCE_LONGITUDE)?;

    let results = vec![
        verify_series("archive", targets.climate, reference, baseline),
        verify_series("projection", targets.climate, reference, projection),
        verify_elevation(targets.elevation, reference),
        verify_geocoding(targets.geocoder, REFERENCE_CITY),
        verify_catalog(targets.catalog),
    ];

    let mut summary = VerificationSummary {
        total: results.len(),
        ..Default::default()
    };
    for result in &results {
        match result.status {
            VerificationStatus::Success | VerificationStatus::PartialSuccess => summary.working += 1,
            VerificationStatus::Failed => summary.failed += 1,
        }
    }

    Ok(VerificationReport {
        timestamp: Utc::now().to_rfc3339(),
        reference,
        results,
        summary,
    })
}

/// Verify the live providers described by `config`.
pub fn run_full_verification(config: &Config) -> Result<VerificationReport, Box<dyn Error>> {
    let providers = ingest::connect(config)?;
    let targets = VerificationTargets {
        climate: &providers.open_meteo,
        elevation: &providers.open_meteo,
        geocoder: &providers.open_meteo,
        catalog: &providers.catalog,
    };
    run_verification(&targets, &config.periods.baseline, &config.periods.projection)
}

pub fn print_summary(report: &VerificationReport) {
    println!("═══════════════════════════════════════════════════════════");
    println!("📊 VERIFICATION SUMMARY  (reference {})", report.reference);
    println!("═══════════════════════════════════════════════════════════");
    for result in &report.results {
        let mark = match result.status {
            VerificationStatus::Success => "✓ OK     ",
            VerificationStatus::PartialSuccess => "⚠ Partial",
            VerificationStatus::Failed => "✗ FAILED ",
        };
        let note = result
            .error_message
            .as_deref()
            .or(result.detail.as_deref())
            .unwrap_or("");
        println!("  {:<11} {}  {:>6} ms  {}", result.source, mark, result.elapsed_ms, note);
    }
    println!();

    let success_rate = if report.summary.total > 0 {
        (report.summary.working as f64 / report.summary.total as f64) * 100.0
    } else {
        0.0
    };
    println!(
        "Overall Success Rate: {:.1}% ({}/{})",
        success_rate, report.summary.working, report.summary.total
    );
    println!("═══════════════════════════════════════════════════════════");
}

// ============================================================================
// Tests
// ============================================================================
