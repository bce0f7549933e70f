/// Open-Meteo API Client
///
/// Retrieves daily climate series, point elevation, and geocoding results
/// from the free Open-Meteo APIs:
///
/// - Historical archive:   https://archive-api.open-meteo.com/v1/archive
/// - Climate projections:  https://climate-api.open-meteo.com/v1/climate
/// - Elevation (DEM 90 m): https://api.open-meteo.com/v1/elevation
/// - Geocoding:            https://geocoding-api.open-meteo.com/v1/search
///
/// API Documentation: https://open-meteo.com/en/docs

use std::collections::HashMap;

use reqwest::Url;
use serde_json::Value;

use crate::ingest::http::HttpClient;
use crate::ingest::{ClimateProvider, DailySeries, ElevationProvider, Geocoder, SeriesRequest};
use crate::model::{ClimateError, ClimateVariable, Coordinate};

// ============================================================================
// Endpoints
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct OpenMeteoEndpoints {
    pub archive: String,
    pub climate: String,
    pub elevation: String,
    pub geocoding: String,
}

impl Default for OpenMeteoEndpoints {
    fn default() -> Self {
        Self {
            archive: "https://archive-api.open-meteo.com/v1/archive".to_string(),
            climate: "https://climate-api.open-meteo.com/v1/climate".to_string(),
            elevation: "https://api.open-meteo.com/v1/elevation".to_string(),
            geocoding: "https://geocoding-api.open-meteo.com/v1/search".to_string(),
        }
    }
}

// ============================================================================
// Client
// ============================================================================

pub struct OpenMeteoClient {
    http: HttpClient,
    endpoints: OpenMeteoEndpoints,
    /// Timezone used to align daily aggregation windows.
    timezone: String,
    /// Commercial API key, sent as `apikey` when present.
    api_key: Option<String>,
}

impl OpenMeteoClient {
    pub fn new(http: HttpClient, endpoints: OpenMeteoEndpoints, timezone: &str) -> Self {
        Self {
            http,
            endpoints,
            timezone: timezone.to_string(),
            api_key: None,
        }
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    fn url(&self, base: &str, mut params: Vec<(&str, String)>) -> Result<Url, ClimateError> {
        if let Some(key) = &self.api_key {
            params.push(("apikey", key.clone()));
        }
        Url::parse_with_params(base, &params)
            .map_err(|e| ClimateError::InvalidInput(format!("bad endpoint '{}': {}", base, e)))
    }
}

/// Build the query for a daily-series request.
///
/// Requests that name a model go to the climate projection endpoint;
/// everything else goes to the historical archive.
pub fn build_daily_url(
    endpoints: &OpenMeteoEndpoints,
    request: &SeriesRequest,
    timezone: &str,
) -> (String, Vec<(&'static str, String)>) {
    let daily = ClimateVariable::ALL
        .iter()
        .map(|v| v.api_name())
        .collect::<Vec<_>>()
        .join(",");

    let mut params = vec![
        ("latitude", request.coordinate.latitude().to_string()),
        ("longitude", request.coordinate.longitude().to_string()),
        ("start_date", request.start.format("%Y-%m-%d").to_string()),
        ("end_date", request.end.format("%Y-%m-%d").to_string()),
        ("daily", daily),
        ("timezone", timezone.to_string()),
    ];

    let base = match &request.model {
        Some(model) => {
            params.push(("models", model.clone()));
            endpoints.climate.clone()
        }
        None => endpoints.archive.clone(),
    };

    (base, params)
}

impl ClimateProvider for OpenMeteoClient {
    fn fetch_daily_series(&self, request: &SeriesRequest) -> Result<DailySeries, ClimateError> {
        let (base, params) = build_daily_url(&self.endpoints, request, &self.timezone);
        let url = self.url(&base, params)?;
        let json = self.http.get_json(url.as_str())?;
        parse_daily_response(&json, request.model.as_deref())
    }
}

impl ElevationProvider for OpenMeteoClient {
    fn fetch_elevation(&self, coordinate: Coordinate) -> Result<f64, ClimateError> {
        let url = self.url(
            &self.endpoints.elevation,
            vec![
                ("latitude", coordinate.latitude().to_string()),
                ("longitude", coordinate.longitude().to_string()),
            ],
        )?;

        // Single attempt: the caller recovers failures into the sentinel.
        let json = self
            .http
            .get_json_once(url.as_str())
            .map_err(|e| ClimateError::ElevationUnavailable(e.to_string()))?;
        parse_elevation_response(&json)
    }
}

impl Geocoder for OpenMeteoClient {
    fn resolve_city_name(&self, name: &str) -> Result<Coordinate, ClimateError> {
        let url = self.url(
            &self.endpoints.geocoding,
            vec![
                ("name", name.to_string()),
                ("count", "1".to_string()),
                ("language", "de".to_string()),
                ("format", "json".to_string()),
            ],
        )?;
        let json = self.http.get_json(url.as_str())?;
        parse_geocoding_response(&json, name)
    }
}

// ============================================================================
// Response parsing
// ============================================================================

fn api_error_reason(json: &Value) -> Option<String> {
    if json.get("error").and_then(Value::as_bool) == Some(true) {
        let reason = json
            .get("reason")
            .and_then(Value::as_str)
            .unwrap_or("unspecified API error");
        return Some(reason.to_string());
    }
    None
}

/// Parse an archive or climate API response into a `DailySeries`.
///
/// Variables may be keyed plainly (`precipitation_sum`) or suffixed with the
/// model name (`precipitation_sum_MRI_AGCM3_2_S`). `null` entries are dropped.
/// Variables absent from the response are absent from the result.
pub fn parse_daily_response(json: &Value, model: Option<&str>) -> Result<DailySeries, ClimateError> {
    if let Some(reason) = api_error_reason(json) {
        return Err(ClimateError::DataUnavailable(reason));
    }

    let daily = json
        .get("daily")
        .and_then(Value::as_object)
        .ok_or_else(|| ClimateError::MalformedResponse("response has no 'daily' block".to_string()))?;

    let mut values = HashMap::new();
    for variable in ClimateVariable::ALL {
        let plain = variable.api_name();
        let suffixed = model.map(|m| format!("{}_{}", plain, m));

        let entry = daily
            .get(plain)
            .or_else(|| suffixed.as_deref().and_then(|key| daily.get(key)));

        let Some(entry) = entry else {
            continue;
        };
        let array = entry.as_array().ok_or_else(|| {
            ClimateError::MalformedResponse(format!("daily.{} is not an array", plain))
        })?;

        let series: Vec<f64> = array.iter().filter_map(Value::as_f64).collect();
        values.insert(variable, series);
    }

    Ok(DailySeries {
        latitude: json.get("latitude").and_then(Value::as_f64).unwrap_or_default(),
        longitude: json.get("longitude").and_then(Value::as_f64).unwrap_or_default(),
        elevation: json.get("elevation").and_then(Value::as_f64),
        values,
    })
}

/// Parse `{"elevation": [123.0]}`.
pub fn parse_elevation_response(json: &Value) -> Result<f64, ClimateError> {
    if let Some(reason) = api_error_reason(json) {
        return Err(ClimateError::ElevationUnavailable(reason));
    }

    json.get("elevation")
        .and_then(Value::as_array)
        .and_then(|arr| arr.first())
        .and_then(Value::as_f64)
        .ok_or_else(|| ClimateError::ElevationUnavailable("response has no elevation value".to_string()))
}

/// Parse the first geocoding match.
pub fn parse_geocoding_response(json: &Value, name: &str) -> Result<Coordinate, ClimateError> {
    if let Some(reason) = api_error_reason(json) {
        return Err(ClimateError::DataUnavailable(reason));
    }

    let first = json
        .get("results")
        .and_then(Value::as_array)
        .and_then(|arr| arr.first())
        .ok_or_else(|| ClimateError::NotFound(format!("no geocoding match for '{}'", name)))?;

    let lat = first.get("latitude").and_then(Value::as_f64);
    let lon = first.get("longitude").and_then(Value::as_f64);
    match (lat, lon) {
        (Some(lat), Some(lon)) => Coordinate::new(lat, lon),
        _ => Err(ClimateError::MalformedResponse(format!(
            "geocoding match for '{}' has no coordinates",
            name
        ))),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::http::canned::CannedServer;
    use crate::ingest::http::{HttpSettings, RetryPolicy};
    use chrono::NaiveDate;
    use serde_json::json;
    use std::time::Duration;

    fn berlin() -> Coordinate {
        Coordinate::new(52.52, 13.41).unwrap()
    }

    fn request(model: Option<&str>) -> SeriesRequest {
        SeriesRequest {
            coordinate: berlin(),
            start: NaiveDate::from_ymd_opt(2050, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2050, 12, 31).unwrap(),
            model: model.map(String::from),
        }
    }

    // --- URL construction ---------------------------------------------------

    #[test]
    fn test_request_with_model_targets_climate_endpoint() {
        let endpoints = OpenMeteoEndpoints::default();
        let (base, params) = build_daily_url(&endpoints, &request(Some("MRI_AGCM3_2_S")), "Europe/Berlin");
        assert_eq!(base, endpoints.climate);
        assert!(params.contains(&("models", "MRI_AGCM3_2_S".to_string())));
        assert!(params.contains(&("start_date", "2050-01-01".to_string())));
        assert!(params.contains(&("end_date", "2050-12-31".to_string())));
    }

    #[test]
    fn test_request_without_model_targets_archive_endpoint() {
        let endpoints = OpenMeteoEndpoints::default();
        let (base, params) = build_daily_url(&endpoints, &request(None), "Europe/Berlin");
        assert_eq!(base, endpoints.archive);
        assert!(params.iter().all(|(k, _)| *k != "models"));
        assert!(params.contains(&(
            "daily",
            "precipitation_sum,temperature_2m_max,wind_speed_10m_max".to_string()
        )));
    }

    // --- Daily series -------------------------------------------------------

    #[test]
    fn test_parse_daily_response_drops_nulls() {
        let body = json!({
            "latitude": 52.5, "longitude": 13.4, "elevation": 38.0,
            "daily": {
                "time": ["2020-01-01", "2020-01-02", "2020-01-03"],
                "temperature_2m_max": [3.1, null, 4.2],
                "precipitation_sum": [0.0, 1.5, 2.5],
                "wind_speed_10m_max": [12.0, 15.5, null]
            }
        });
        let series = parse_daily_response(&body, None).expect("well-formed response");
        assert_eq!(series.values[&ClimateVariable::MaxTemperature], vec![3.1, 4.2]);
        assert_eq!(series.values[&ClimateVariable::Precipitation], vec![0.0, 1.5, 2.5]);
        assert_eq!(series.values[&ClimateVariable::MaxWindSpeed], vec![12.0, 15.5]);
        assert_eq!(series.elevation, Some(38.0));
    }

    #[test]
    fn test_parse_daily_response_accepts_model_suffixed_keys() {
        let body = json!({
            "latitude": 24.0, "longitude": 90.0,
            "daily": {
                "temperature_2m_max_MRI_AGCM3_2_S": [30.0],
                "precipitation_sum_MRI_AGCM3_2_S": [120.0],
                "wind_speed_10m_max_MRI_AGCM3_2_S": [18.0]
            }
        });
        let series = parse_daily_response(&body, Some("MRI_AGCM3_2_S")).unwrap();
        assert_eq!(series.values.len(), 3);
        assert_eq!(series.values[&ClimateVariable::Precipitation], vec![120.0]);
    }

    #[test]
    fn test_parse_daily_response_leaves_missing_variable_absent() {
        let body = json!({
            "daily": {
                "temperature_2m_max": [30.0],
                "precipitation_sum": [120.0]
            }
        });
        let series = parse_daily_response(&body, None).unwrap();
        assert!(!series.values.contains_key(&ClimateVariable::MaxWindSpeed));
    }

    #[test]
    fn test_parse_daily_response_without_daily_block_is_malformed() {
        let result = parse_daily_response(&json!({"latitude": 1.0}), None);
        assert!(matches!(result, Err(ClimateError::MalformedResponse(_))));
    }

    #[test]
    fn test_parse_daily_response_api_error_is_data_unavailable() {
        let body = json!({"error": true, "reason": "Latitude must be in range of -90 to 90°."});
        match parse_daily_response(&body, None) {
            Err(ClimateError::DataUnavailable(reason)) => assert!(reason.contains("Latitude")),
            other => panic!("expected DataUnavailable, got {:?}", other),
        }
    }

    // --- Elevation ----------------------------------------------------------

    #[test]
    fn test_parse_elevation_response() {
        assert_eq!(parse_elevation_response(&json!({"elevation": [38.0]})).unwrap(), 38.0);
        assert_eq!(parse_elevation_response(&json!({"elevation": [0.0]})).unwrap(), 0.0);
    }

    #[test]
    fn test_parse_elevation_response_missing_field() {
        let result = parse_elevation_response(&json!({"elevation": []}));
        assert!(matches!(result, Err(ClimateError::ElevationUnavailable(_))));
        let result = parse_elevation_response(&json!({}));
        assert!(matches!(result, Err(ClimateError::ElevationUnavailable(_))));
    }

    // --- Geocoding ----------------------------------------------------------

    #[test]
    fn test_parse_geocoding_takes_first_match() {
        let body = json!({
            "results": [
                {"name": "Berlin", "latitude": 52.52437, "longitude": 13.41053},
                {"name": "Berlin", "latitude": 39.79, "longitude": -74.93}
            ]
        });
        let c = parse_geocoding_response(&body, "Berlin").unwrap();
        assert_eq!(c.latitude(), 52.52437);
        assert_eq!(c.longitude(), 13.41053);
    }

    #[test]
    fn test_parse_geocoding_no_results_is_not_found() {
        let result = parse_geocoding_response(&json!({"generationtime_ms": 0.5}), "Atlantis");
        assert!(matches!(result, Err(ClimateError::NotFound(_))));
    }

    // --- Against a local server ---------------------------------------------

    fn client_for(server: &CannedServer) -> OpenMeteoClient {
        let http = HttpClient::new(HttpSettings {
            timeout: Duration::from_secs(5),
            retry: RetryPolicy {
                max_retries: 5,
                backoff_factor: 0.0,
            },
            cache_ttl: Duration::ZERO,
        })
        .unwrap();
        let endpoints = OpenMeteoEndpoints {
            archive: format!("{}/v1/archive", server.base_url),
            climate: format!("{}/v1/climate", server.base_url),
            elevation: format!("{}/v1/elevation", server.base_url),
            geocoding: format!("{}/v1/search", server.base_url),
        };
        OpenMeteoClient::new(http, endpoints, "GMT")
    }

    #[test]
    fn test_elevation_lookup_is_attempted_once() {
        let server = CannedServer::start("503 Service Unavailable", "");
        let result = client_for(&server).fetch_elevation(berlin());

        assert!(matches!(result, Err(ClimateError::ElevationUnavailable(_))));
        assert_eq!(server.requests(), 1);
    }

    #[test]
    fn test_climate_series_retries_transient_failures() {
        let server = CannedServer::start("502 Bad Gateway", "");
        let result = client_for(&server).fetch_daily_series(&request(None));

        assert_eq!(result, Err(ClimateError::Http(502)));
        assert_eq!(server.requests(), 6);
    }

    #[test]
    fn test_bad_request_reason_becomes_data_unavailable() {
        let server = CannedServer::start(
            "400 Bad Request",
            r#"{"error":true,"reason":"No data is available for this location"}"#,
        );
        let result = client_for(&server).fetch_daily_series(&request(Some("MRI_AGCM3_2_S")));

        match result {
            Err(ClimateError::DataUnavailable(reason)) => assert!(reason.contains("No data is available")),
            other => panic!("expected DataUnavailable, got {:?}", other),
        }
        assert_eq!(server.requests(), 1);
    }
}
