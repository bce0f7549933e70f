/// City catalog client (GeoNames via OpenDataSoft).
///
/// Uses the public "all cities with a population > 1000" dataset:
/// https://public.opendatasoft.com/explore/dataset/geonames-all-cities-with-a-population-1000/

use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;

use crate::ingest::http::HttpClient;
use crate::ingest::{City, CityCatalog};
use crate::model::{ClimateError, Coordinate};

pub const DEFAULT_CATALOG_URL: &str = "https://public.opendatasoft.com/api/explore/v2.1/catalog/datasets/geonames-all-cities-with-a-population-1000/records";

/// The records endpoint refuses page sizes above this.
pub const MAX_PAGE_SIZE: usize = 100;

// ============================================================================
// API Response Structures
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CatalogResponse {
    #[serde(default)]
    pub results: Vec<CatalogRecord>,
}

#[derive(Debug, Deserialize)]
pub struct CatalogRecord {
    pub name: String,
    pub population: Option<u64>,
    pub coordinates: Option<CatalogPoint>,
}

#[derive(Debug, Deserialize)]
pub struct CatalogPoint {
    pub lat: f64,
    pub lon: f64,
}

// ============================================================================
// Client
// ============================================================================

pub struct GeoNamesCatalog {
    http: HttpClient,
    base_url: String,
}

impl GeoNamesCatalog {
    pub fn new(http: HttpClient, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.to_string(),
        }
    }
}

pub fn build_catalog_url(base_url: &str, min_population: u64, limit: usize) -> Result<Url, ClimateError> {
    let limit = limit.clamp(1, MAX_PAGE_SIZE);
    Url::parse_with_params(
        base_url,
        &[
            ("select", "name,population,coordinates".to_string()),
            ("where", format!("population > {}", min_population)),
            ("order_by", "population desc".to_string()),
            ("limit", limit.to_string()),
        ],
    )
    .map_err(|e| ClimateError::InvalidInput(format!("bad catalog url '{}': {}", base_url, e)))
}

impl CityCatalog for GeoNamesCatalog {
    fn list_cities_above_population(
        &self,
        min_population: u64,
        limit: usize,
    ) -> Result<Vec<City>, ClimateError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let url = build_catalog_url(&self.base_url, min_population, limit)?;
        let json = self.http.get_json(url.as_str())?;
        parse_catalog_response(json, min_population)
    }
}

/// Convert catalog records into `City` values.
///
/// Records without coordinates, with an out-of-range coordinate, or at or
/// below `min_population` are skipped.
pub fn parse_catalog_response(json: Value, min_population: u64) -> Result<Vec<City>, ClimateError> {
    let response: CatalogResponse = serde_json::from_value(json)
        .map_err(|e| ClimateError::MalformedResponse(format!("catalog response: {}", e)))?;

    let cities = response
        .results
        .into_iter()
        .filter_map(|record| {
            let population = record.population?;
            if population <= min_population {
                return None;
            }
            let point = record.coordinates?;
            let coordinate = Coordinate::new(point.lat, point.lon).ok()?;
            Some(City {
                name: record.name,
                population,
                coordinate,
            })
        })
        .collect();

    Ok(cities)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_catalog_url_encodes_filter_and_order() {
        let url = build_catalog_url(DEFAULT_CATALOG_URL, 100_000, 50).unwrap();
        let query: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(query.contains(&("where".to_string(), "population > 100000".to_string())));
        assert!(query.contains(&("order_by".to_string(), "population desc".to_string())));
        assert!(query.contains(&("limit".to_string(), "50".to_string())));
    }

    #[test]
    fn test_catalog_url_clamps_limit() {
        let url = build_catalog_url(DEFAULT_CATALOG_URL, 0, 5000).unwrap();
        assert!(url.as_str().contains("limit=100"));
    }

    #[test]
    fn test_parse_catalog_response_skips_incomplete_records() {
        let body = json!({
            "total_count": 3,
            "results": [
                {"name": "Tokyo", "population": 8336599, "coordinates": {"lon": 139.69171, "lat": 35.6895}},
                {"name": "Nowhere", "population": 500000, "coordinates": null},
                {"name": "Small", "population": 900, "coordinates": {"lon": 1.0, "lat": 1.0}}
            ]
        });
        let cities = parse_catalog_response(body, 1000).unwrap();
        assert_eq!(cities.len(), 1);
        assert_eq!(cities[0].name, "Tokyo");
        assert_eq!(cities[0].coordinate.latitude(), 35.6895);
    }

    #[test]
    fn test_parse_catalog_response_rejects_wrong_shape() {
        let result = parse_catalog_response(json!({"results": "nope"}), 0);
        assert!(matches!(result, Err(ClimateError::MalformedResponse(_))));
    }
}
