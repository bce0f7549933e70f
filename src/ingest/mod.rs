/// External data providers.
///
/// The classification core only sees the traits defined here; concrete
/// clients are constructed once and passed in.
///
/// Submodules:
/// - `http`      : blocking client with retry and an in-memory response cache.
/// - `open_meteo`: archive, climate projection, elevation, and geocoding APIs.
/// - `cities`    : city catalog (GeoNames via OpenDataSoft).

pub mod cities;
pub mod http;
pub mod open_meteo;

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::model::{ClimateError, ClimateVariable, Coordinate};

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// A daily-series request for one coordinate over `[start, end]`.
///
/// `model` pins the request to a named downscaled climate model; requests
/// without a model target the historical archive.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesRequest {
    pub coordinate: Coordinate,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub model: Option<String>,
}

/// Daily values per variable, as returned by a climate provider.
///
/// Missing values (`null` in the API) are already dropped. A variable the
/// provider did not return is absent from `values`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DailySeries {
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: Option<f64>,
    pub values: HashMap<ClimateVariable, Vec<f64>>,
}

/// A populated place from the city catalog.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct City {
    pub name: String,
    pub population: u64,
    pub coordinate: Coordinate,
}

// ---------------------------------------------------------------------------
// Provider traits
// ---------------------------------------------------------------------------

pub trait ClimateProvider: Send + Sync {
    fn fetch_daily_series(&self, request: &SeriesRequest) -> Result<DailySeries, ClimateError>;
}

pub trait ElevationProvider: Send + Sync {
    /// Elevation in meters. Failures surface as `ElevationUnavailable`.
    fn fetch_elevation(&self, coordinate: Coordinate) -> Result<f64, ClimateError>;
}

pub trait Geocoder: Send + Sync {
    /// First match only.
    fn resolve_city_name(&self, name: &str) -> Result<Coordinate, ClimateError>;
}

pub trait CityCatalog: Send + Sync {
    /// Cities with more than `min_population` inhabitants, largest first.
    fn list_cities_above_population(
        &self,
        min_population: u64,
        limit: usize,
    ) -> Result<Vec<City>, ClimateError>;
}

// ---------------------------------------------------------------------------
// Construction from configuration
// ---------------------------------------------------------------------------

/// The live clients, built once per process.
pub struct Providers {
    pub open_meteo: open_meteo::OpenMeteoClient,
    pub catalog: cities::GeoNamesCatalog,
}

/// Build the live clients from configuration. Each client owns its own
/// HTTP connection pool and response cache.
pub fn connect(config: &crate::config::Config) -> Result<Providers, reqwest::Error> {
    let settings = config.http.settings();

    let open_meteo = open_meteo::OpenMeteoClient::new(
        http::HttpClient::new(settings)?,
        config.endpoints.open_meteo(),
        &config.periods.timezone,
    )
    .with_api_key(config.api_key.clone());

    let catalog = cities::GeoNamesCatalog::new(http::HttpClient::new(settings)?, &config.endpoints.cities);

    Ok(Providers { open_meteo, catalog })
}
