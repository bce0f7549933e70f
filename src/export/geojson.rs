//! GeoJSON map export.
//!
//! Batch results become Point features, grid records become square cell
//! Polygons centred on the grid point. Every feature carries simplestyle
//! colour properties:
//!
//!   pass    → green
//!   fail    → red
//!   unknown → grey

use std::error::Error;
use std::path::Path;

use serde_json::{Map, Value, json};

use crate::scan::batch::{Outcome, ScanResult};
use crate::scan::grid::GridRecord;

pub const PASS_COLOR: &str = "#2ecc71";
pub const FAIL_COLOR: &str = "#e74c3c";
pub const UNKNOWN_COLOR: &str = "#95a5a6";

pub fn color_for(passed: Option<bool>) -> &'static str {
    match passed {
        Some(true) => PASS_COLOR,
        Some(false) => FAIL_COLOR,
        None => UNKNOWN_COLOR,
    }
}

fn feature_collection(features: Vec<Value>) -> Value {
    json!({
        "type": "FeatureCollection",
        "features": features,
    })
}

/// One Point feature per batch result.
pub fn verdict_points(results: &[ScanResult]) -> Value {
    let features = results
        .iter()
        .map(|result| {
            let passed = result.outcome.passed();
            let color = color_for(passed);

            let mut properties = Map::new();
            properties.insert("name".into(), json!(result.label));
            properties.insert("marker-color".into(), json!(color));
            properties.insert("marker-size".into(), json!("medium"));

            match &result.outcome {
                Outcome::Classified { verdict } => {
                    if let Ok(Value::Object(fields)) = serde_json::to_value(verdict) {
                        for (key, value) in fields {
                            if key != "coordinate" {
                                properties.insert(key, value);
                            }
                        }
                    }
                }
                Outcome::SeaLevel { elevation, above_sea_level } => {
                    properties.insert("elevation".into(), json!(elevation.meters()));
                    properties.insert("elevation_fallback".into(), json!(elevation.is_fallback()));
                    properties.insert("above_sea_level".into(), json!(above_sea_level));
                }
                Outcome::Unknown { reason } => {
                    properties.insert("status".into(), json!("unknown"));
                    properties.insert("reason".into(), json!(reason));
                }
            }

            json!({
                "type": "Feature",
                "geometry": {
                    "type": "Point",
                    "coordinates": [result.coordinate.longitude(), result.coordinate.latitude()],
                },
                "properties": Value::Object(properties),
            })
        })
        .collect();

    feature_collection(features)
}

/// One square Polygon per grid record, `step_degrees` wide, clipped to the
/// valid coordinate range.
pub fn grid_cells(records: &[GridRecord], step_degrees: f64) -> Value {
    let half = step_degrees / 2.0;
    let features = records
        .iter()
        .map(|record| {
            let west = (record.longitude - half).max(-180.0);
            let east = (record.longitude + half).min(180.0);
            let south = (record.latitude - half).max(-90.0);
            let north = (record.latitude + half).min(90.0);
            let color = color_for(record.passed());

            json!({
                "type": "Feature",
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[
                        [west, south],
                        [east, south],
                        [east, north],
                        [west, north],
                        [west, south],
                    ]],
                },
                "properties": {
                    "fill": color,
                    "fill-opacity": 0.4,
                    "stroke": color,
                    "stroke-width": 0,
                    "aboveSea": record.above_sea,
                    "elevation": record.elevation,
                    "elevationFallback": record.elevation_fallback,
                    "tempChangeOK": record.temp_change_ok,
                    "percentageTempChange": record.percentage_temp_change,
                    "livable": record.livable,
                    "error": record.error,
                },
            })
        })
        .collect();

    feature_collection(features)
}

pub fn write_feature_collection(path: &Path, collection: &Value) -> Result<(), Box<dyn Error>> {
    let body = serde_json::to_string_pretty(collection)?;
    std::fs::write(path, body)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Check, Coordinate, ElevationReading, LivabilityVerdict};

    fn classified(label: &str, livable: bool) -> ScanResult {
        let coordinate = Coordinate::new(52.52, 13.41).unwrap();
        ScanResult {
            label: label.to_string(),
            coordinate,
            outcome: Outcome::Classified {
                verdict: LivabilityVerdict {
                    coordinate,
                    rain_change_pct: Some(10.0),
                    temp_change_pct: Some(5.0),
                    wind_change_pct: Some(-2.0),
                    elevation: ElevationReading::Measured { meters: 34.0 },
                    above_sea_level: true,
                    livable,
                    failed_checks: if livable { vec![] } else { vec![Check::Rain] },
                },
            },
        }
    }

    #[test]
    fn test_points_use_lon_lat_order_and_colour_by_verdict() {
        let results = vec![
            classified("Berlin", true),
            classified("Hamburg", false),
            ScanResult {
                label: "Atlantis".to_string(),
                coordinate: Coordinate::new(0.0, -30.0).unwrap(),
                outcome: Outcome::Unknown { reason: "HTTP error: 503".to_string() },
            },
        ];
        let collection = verdict_points(&results);
        let features = collection["features"].as_array().unwrap();
        assert_eq!(features.len(), 3);

        assert_eq!(features[0]["geometry"]["coordinates"][0], 13.41);
        assert_eq!(features[0]["geometry"]["coordinates"][1], 52.52);
        assert_eq!(features[0]["properties"]["marker-color"], PASS_COLOR);
        assert_eq!(features[0]["properties"]["rain_change_pct"], 10.0);
        assert!(features[0]["properties"].get("coordinate").is_none());

        assert_eq!(features[1]["properties"]["marker-color"], FAIL_COLOR);
        assert_eq!(features[1]["properties"]["failed_checks"][0], "rain");

        assert_eq!(features[2]["properties"]["marker-color"], UNKNOWN_COLOR);
        assert_eq!(features[2]["properties"]["status"], "unknown");
    }

    #[test]
    fn test_grid_cells_are_closed_squares_clipped_to_range() {
        let records = vec![GridRecord {
            latitude: -90.0,
            longitude: -180.0,
            above_sea: true,
            elevation: 2835.0,
            elevation_fallback: false,
            temp_change_ok: None,
            percentage_temp_change: None,
            livable: None,
            error: None,
        }];
        let collection = grid_cells(&records, 10.0);
        let ring = &collection["features"][0]["geometry"]["coordinates"][0];
        assert_eq!(ring.as_array().unwrap().len(), 5);
        assert_eq!(ring[0], json!([-180.0, -90.0]));
        assert_eq!(ring[2], json!([-175.0, -85.0]));
        assert_eq!(ring[0], ring[4]);
        assert_eq!(collection["features"][0]["properties"]["fill"], PASS_COLOR);
    }
}
