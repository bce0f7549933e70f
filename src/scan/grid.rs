//! Brute-force grid sweeps.
//!
//! Walks latitude in `[-90, 90)` and, for each latitude, longitude in
//! `[-180, 180)` with a fixed integer step. One JSON record is appended and
//! flushed per grid point, so a long sweep can be inspected while running and
//! resumed after an interruption: on restart every point up to and including
//! the last written coordinate is skipped.

use std::error::Error;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::analysis::statistics::round_to;
use crate::assess::ClimateComparator;
use crate::logging::{self, DataSource};
use crate::model::{Check, Coordinate, DeviationThresholds};
use crate::scan::ScanMode;

/// Progress is logged at info level every this many points.
const PROGRESS_EVERY: usize = 100;

// ---------------------------------------------------------------------------
// Grid definition
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridSpec {
    step_degrees: u32,
}

impl GridSpec {
    /// `step_degrees` must be in `1..=90`.
    pub fn new(step_degrees: u32) -> Result<Self, String> {
        if !(1..=90).contains(&step_degrees) {
            return Err(format!("grid step must be between 1 and 90 degrees, got {}", step_degrees));
        }
        Ok(Self { step_degrees })
    }

    pub fn step_degrees(&self) -> u32 {
        self.step_degrees
    }

    fn latitudes(&self) -> impl Iterator<Item = i32> {
        (-90..90).step_by(self.step_degrees as usize)
    }

    fn longitudes(&self) -> impl Iterator<Item = i32> + Clone {
        (-180..180).step_by(self.step_degrees as usize)
    }

    /// All grid points in sweep order (latitude-major).
    pub fn points(&self) -> Vec<(i32, i32)> {
        let lons: Vec<i32> = self.longitudes().collect();
        self.latitudes()
            .flat_map(|lat| lons.iter().map(move |&lon| (lat, lon)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.latitudes().count() * self.longitudes().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Position of `(lat, lon)` in sweep order, if it lies on the grid.
    pub fn index_of(&self, lat: f64, lon: f64) -> Option<usize> {
        self.points()
            .iter()
            .position(|&(p_lat, p_lon)| p_lat as f64 == lat && p_lon as f64 == lon)
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One persisted grid point.
///
/// In sea-level-only sweeps the climate fields are absent. In full sweeps a
/// failed classification keeps the elevation fields, leaves the climate
/// fields empty, and records the reason in `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridRecord {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(rename = "aboveSea")]
    pub above_sea: bool,
    pub elevation: f64,
    #[serde(rename = "elevationFallback", default)]
    pub elevation_fallback: bool,
    #[serde(rename = "tempChangeOK", default, skip_serializing_if = "Option::is_none")]
    pub temp_change_ok: Option<bool>,
    #[serde(rename = "percentageTempChange", default, skip_serializing_if = "Option::is_none")]
    pub percentage_temp_change: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub livable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GridRecord {
    /// Pass/fail for colouring: livability when known, else the sea-level check.
    /// `None` for a failed classification in a full sweep.
    pub fn passed(&self) -> Option<bool> {
        if self.error.is_some() {
            return None;
        }
        Some(self.livable.unwrap_or(self.above_sea))
    }
}

/// Read every parseable record from a JSON-lines file.
///
/// A truncated last line from an interrupted write is skipped.
pub fn read_records(path: &Path) -> Result<Vec<GridRecord>, Box<dyn Error>> {
    let file = File::open(path)?;
    let mut records = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<GridRecord>(&line) {
            Ok(record) => records.push(record),
            Err(e) => logging::warn(
                DataSource::Scan,
                None,
                &format!("skipping unreadable record in {}: {}", path.display(), e),
            ),
        }
    }
    Ok(records)
}

/// The last readable record, or `None` if the file is missing or empty.
pub fn last_record(path: &Path) -> Result<Option<GridRecord>, Box<dyn Error>> {
    if !path.exists() {
        return Ok(None);
    }
    Ok(read_records(path)?.pop())
}

/// True for a missing or empty file.
fn ends_with_newline(path: &Path) -> Result<bool, Box<dyn Error>> {
    if !path.exists() {
        return Ok(true);
    }
    let mut file = File::open(path)?;
    if file.metadata()?.len() == 0 {
        return Ok(true);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

// ---------------------------------------------------------------------------
// Sweep
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GridScanReport {
    pub total_points: usize,
    pub skipped: usize,
    pub written: usize,
    pub unknown: usize,
}

impl GridScanReport {
    pub fn is_complete(&self) -> bool {
        self.skipped + self.written == self.total_points
    }
}

pub struct GridScan<'a> {
    comparator: &'a ClimateComparator<'a>,
    thresholds: DeviationThresholds,
    grid: GridSpec,
    mode: ScanMode,
    pause: Duration,
}

impl<'a> GridScan<'a> {
    pub fn new(
        comparator: &'a ClimateComparator<'a>,
        thresholds: DeviationThresholds,
        grid: GridSpec,
        mode: ScanMode,
    ) -> Self {
        Self {
            comparator,
            thresholds,
            grid,
            mode,
            pause: Duration::ZERO,
        }
    }

    /// Wait between grid points, to stay under provider rate limits.
    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    fn record_for(&self, lat: i32, lon: i32) -> Result<GridRecord, Box<dyn Error>> {
        let coordinate = Coordinate::new(lat as f64, lon as f64)?;

        let sea_level_record = |error: Option<String>| {
            let (elevation, above_sea) = self.comparator.check_sea_level(coordinate, &self.thresholds);
            GridRecord {
                latitude: coordinate.latitude(),
                longitude: coordinate.longitude(),
                above_sea,
                elevation: elevation.meters(),
                elevation_fallback: elevation.is_fallback(),
                temp_change_ok: None,
                percentage_temp_change: None,
                livable: None,
                error,
            }
        };

        if self.mode == ScanMode::SeaLevelOnly {
            return Ok(sea_level_record(None));
        }

        match self.comparator.classify_livability(coordinate, &self.thresholds) {
            Ok(verdict) => Ok(GridRecord {
                latitude: coordinate.latitude(),
                longitude: coordinate.longitude(),
                above_sea: verdict.above_sea_level,
                elevation: verdict.elevation_meters(),
                elevation_fallback: verdict.elevation.is_fallback(),
                temp_change_ok: Some(!verdict.failed(Check::Temperature)),
                percentage_temp_change: verdict.temp_change_pct.map(|v| round_to(v, 3)),
                livable: Some(verdict.livable),
                error: None,
            }),
            Err(err) => {
                logging::log_fetch_failure(
                    DataSource::Scan,
                    &coordinate.to_string(),
                    "classification",
                    &err,
                );
                Ok(sea_level_record(Some(err.to_string())))
            }
        }
    }

    /// Sweep the grid, appending to `output`. Resumes after the last record
    /// already present in `output`.
    pub fn run(&self, output: &Path) -> Result<GridScanReport, Box<dyn Error>> {
        let points = self.grid.points();
        let total_points = points.len();

        let start = match last_record(output)? {
            Some(last) => {
                let index = self.grid.index_of(last.latitude, last.longitude).ok_or_else(|| {
                    format!(
                        "last record ({}, {}) in {} is not on a {}° grid",
                        last.latitude,
                        last.longitude,
                        output.display(),
                        self.grid.step_degrees()
                    )
                })?;
                index + 1
            }
            None => 0,
        };

        let mut report = GridScanReport {
            total_points,
            skipped: start,
            ..Default::default()
        };

        if start >= total_points {
            logging::info(DataSource::Scan, None, "Grid already complete, nothing to do");
            return Ok(report);
        }
        if start > 0 {
            logging::info(
                DataSource::Scan,
                None,
                &format!("Resuming grid scan at point {} of {}", start + 1, total_points),
            );
        }

        let mut file = OpenOptions::new().create(true).append(true).open(output)?;
        if !ends_with_newline(output)? {
            // Terminate a line cut off by an interrupted write.
            writeln!(file)?;
        }

        for (index, &(lat, lon)) in points.iter().enumerate().skip(start) {
            let record = self.record_for(lat, lon)?;
            if record.error.is_some() {
                report.unknown += 1;
            }

            writeln!(file, "{}", serde_json::to_string(&record)?)?;
            file.flush()?;
            report.written += 1;

            let done = index + 1;
            let message = format!(
                "Status: {} / {} ({:.3}%)",
                done,
                total_points,
                done as f64 / total_points as f64 * 100.0
            );
            if done % PROGRESS_EVERY == 0 || done == total_points {
                logging::info(DataSource::Scan, None, &message);
            } else {
                logging::debug(DataSource::Scan, None, &message);
            }

            if !self.pause.is_zero() && done < total_points {
                std::thread::sleep(self.pause);
            }
        }

        logging::log_scan_summary(
            DataSource::Scan,
            report.written,
            report.written - report.unknown,
            report.unknown,
        );
        Ok(report)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_covers_half_open_ranges() {
        let spec = GridSpec::new(90).unwrap();
        // lat: -90, 0 ; lon: -180, -90, 0, 90
        assert_eq!(spec.len(), 8);
        let points = spec.points();
        assert_eq!(points.first(), Some(&(-90, -180)));
        assert_eq!(points.last(), Some(&(0, 90)));
        assert!(!points.contains(&(90, 180)));
    }

    #[test]
    fn test_ten_degree_grid_size() {
        let spec = GridSpec::new(10).unwrap();
        assert_eq!(spec.len(), 18 * 36);
        assert_eq!(spec.points().len(), spec.len());
    }

    #[test]
    fn test_grid_step_must_be_reasonable() {
        assert!(GridSpec::new(0).is_err());
        assert!(GridSpec::new(91).is_err());
    }

    #[test]
    fn test_index_of_follows_sweep_order() {
        let spec = GridSpec::new(90).unwrap();
        assert_eq!(spec.index_of(-90.0, -180.0), Some(0));
        assert_eq!(spec.index_of(-90.0, 90.0), Some(3));
        assert_eq!(spec.index_of(0.0, -180.0), Some(4));
        assert_eq!(spec.index_of(45.0, 0.0), None);
    }

    #[test]
    fn test_record_uses_camel_case_column_names() {
        let record = GridRecord {
            latitude: -90.0,
            longitude: -180.0,
            above_sea: true,
            elevation: 2835.0,
            elevation_fallback: false,
            temp_change_ok: Some(true),
            percentage_temp_change: Some(4.2),
            livable: None,
            error: None,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["aboveSea"], true);
        assert_eq!(json["tempChangeOK"], true);
        assert_eq!(json["percentageTempChange"], 4.2);
        assert!(json.get("livable").is_none());
    }

    #[test]
    fn test_sea_level_only_record_round_trips_without_climate_fields() {
        let line = r#"{"latitude":10.0,"longitude":20.0,"aboveSea":false,"elevation":0.5}"#;
        let record: GridRecord = serde_json::from_str(line).unwrap();
        assert!(!record.above_sea);
        assert!(!record.elevation_fallback);
        assert_eq!(record.temp_change_ok, None);
        assert_eq!(record.passed(), Some(false));
    }

    #[test]
    fn test_failed_record_has_unknown_pass_state() {
        let line = r#"{"latitude":10.0,"longitude":20.0,"aboveSea":true,"elevation":0.0,"elevationFallback":true,"error":"HTTP error: 503"}"#;
        let record: GridRecord = serde_json::from_str(line).unwrap();
        assert_eq!(record.passed(), None);
    }
}
