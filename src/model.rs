/// Core data types for the climate livability service.
///
/// This module defines the shared domain model imported by all other modules.
/// It contains no logic beyond construction-time validation, and no I/O.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Coordinates
// ---------------------------------------------------------------------------

/// A WGS84 coordinate in decimal degrees.
///
/// Out-of-range values are rejected at construction, so every `Coordinate`
/// in circulation satisfies `latitude ∈ [-90, 90]` and
/// `longitude ∈ [-180, 180]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCoordinate")]
pub struct Coordinate {
    latitude: f64,
    longitude: f64,
}

#[derive(Deserialize)]
struct RawCoordinate {
    latitude: f64,
    longitude: f64,
}

impl TryFrom<RawCoordinate> for Coordinate {
    type Error = ClimateError;

    fn try_from(raw: RawCoordinate) -> Result<Self, Self::Error> {
        Coordinate::new(raw.latitude, raw.longitude)
    }
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, ClimateError> {
        let lat_ok = latitude.is_finite() && (-90.0..=90.0).contains(&latitude);
        let lon_ok = longitude.is_finite() && (-180.0..=180.0).contains(&longitude);
        if !lat_ok || !lon_ok {
            return Err(ClimateError::InvalidCoordinate { latitude, longitude });
        }
        Ok(Self { latitude, longitude })
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.4},{:.4}", self.latitude, self.longitude)
    }
}

// ---------------------------------------------------------------------------
// Climate variables and samples
// ---------------------------------------------------------------------------

/// The three daily variables requested from the climate provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ClimateVariable {
    Precipitation,
    MaxTemperature,
    MaxWindSpeed,
}

impl ClimateVariable {
    pub const ALL: [ClimateVariable; 3] = [
        ClimateVariable::Precipitation,
        ClimateVariable::MaxTemperature,
        ClimateVariable::MaxWindSpeed,
    ];

    /// Daily variable name as used by the Open-Meteo APIs.
    pub fn api_name(&self) -> &'static str {
        match self {
            ClimateVariable::Precipitation => "precipitation_sum",
            ClimateVariable::MaxTemperature => "temperature_2m_max",
            ClimateVariable::MaxWindSpeed => "wind_speed_10m_max",
        }
    }
}

/// Top-ten medians of the three daily variables for one coordinate and
/// one period. Recomputed per query, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClimateSample {
    pub max_temperature: f64,
    pub total_precipitation: f64,
    pub max_wind_speed: f64,
}

// ---------------------------------------------------------------------------
// Thresholds
// ---------------------------------------------------------------------------

/// Required clearance above the adjusted sea level, shared by every preset.
pub const DEFAULT_SAFETY_MARGIN_M: f64 = 1.0;

/// Allowed deviations between the baseline and the projected period.
///
/// Percentages are symmetric: a change of `c` percent passes when
/// `-pct <= c <= pct`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeviationThresholds {
    pub rain_pct: f64,
    pub temp_pct: f64,
    pub wind_pct: f64,
    pub sea_level_rise_m: f64,
    #[serde(default = "default_safety_margin")]
    pub safety_margin_m: f64,
}

fn default_safety_margin() -> f64 {
    DEFAULT_SAFETY_MARGIN_M
}

// ---------------------------------------------------------------------------
// Elevation
// ---------------------------------------------------------------------------

/// Elevation reported when the elevation provider could not be reached.
pub const SENTINEL_ELEVATION_M: f64 = 0.0;

/// Outcome of an elevation lookup.
///
/// `Fallback` is the recovered failure path: it reports
/// `SENTINEL_ELEVATION_M` as its elevation and is treated as "unknown,
/// assume safe" by the sea-level check. A coordinate that really sits at
/// 0 m comes back as `Measured(0.0)` and is evaluated normally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum ElevationReading {
    Measured { meters: f64 },
    Fallback { reason: String },
}

impl ElevationReading {
    pub fn meters(&self) -> f64 {
        match self {
            ElevationReading::Measured { meters } => *meters,
            ElevationReading::Fallback { .. } => SENTINEL_ELEVATION_M,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, ElevationReading::Fallback { .. })
    }
}

// ---------------------------------------------------------------------------
// Verdict
// ---------------------------------------------------------------------------

/// The four independent checks, in the order they are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Check {
    Rain,
    Temperature,
    Wind,
    SeaLevel,
}

impl std::fmt::Display for Check {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Check::Rain => write!(f, "rain"),
            Check::Temperature => write!(f, "temperature"),
            Check::Wind => write!(f, "wind"),
            Check::SeaLevel => write!(f, "sea level"),
        }
    }
}

/// Full classification record for one coordinate.
///
/// Percentage changes are `None` when the baseline was zero and the change
/// is undefined; such a check always fails. Values are stored unrounded and
/// rounded to three decimals only when serialized.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LivabilityVerdict {
    pub coordinate: Coordinate,
    #[serde(serialize_with = "serialize_rounded")]
    pub rain_change_pct: Option<f64>,
    #[serde(serialize_with = "serialize_rounded")]
    pub temp_change_pct: Option<f64>,
    #[serde(serialize_with = "serialize_rounded")]
    pub wind_change_pct: Option<f64>,
    pub elevation: ElevationReading,
    pub above_sea_level: bool,
    pub livable: bool,
    /// Every failing check, in rain → temperature → wind → sea-level order.
    pub failed_checks: Vec<Check>,
}

impl LivabilityVerdict {
    pub fn elevation_meters(&self) -> f64 {
        self.elevation.meters()
    }

    /// The first failing check in evaluation order.
    pub fn first_failure(&self) -> Option<Check> {
        self.failed_checks.first().copied()
    }

    pub fn failed(&self, check: Check) -> bool {
        self.failed_checks.contains(&check)
    }
}

fn serialize_rounded<S>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match value {
        Some(v) => serializer.serialize_some(&crate::analysis::statistics::round_to(*v, 3)),
        None => serializer.serialize_none(),
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can arise while fetching or classifying climate data.
#[derive(Debug, Clone, PartialEq)]
pub enum ClimateError {
    /// An observation series passed to a reduction was empty.
    InvalidInput(String),
    /// The provider returned no usable response for a coordinate/period.
    DataUnavailable(String),
    /// The response succeeded but an expected field or variable is missing.
    MalformedResponse(String),
    /// The elevation provider failed. Recovered locally into the sentinel.
    ElevationUnavailable(String),
    /// Percentage change against a zero baseline.
    DivisionByZero,
    /// Latitude or longitude outside the WGS84 range.
    InvalidCoordinate { latitude: f64, longitude: f64 },
    /// A geocoding or catalog lookup matched nothing.
    NotFound(String),
    /// Non-2xx HTTP response after retries were exhausted.
    Http(u16),
    /// No response at all: connection refused, timeout, TLS failure.
    Transport(String),
}

impl std::fmt::Display for ClimateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClimateError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            ClimateError::DataUnavailable(msg) => write!(f, "No data available: {}", msg),
            ClimateError::MalformedResponse(msg) => write!(f, "Malformed response: {}", msg),
            ClimateError::ElevationUnavailable(msg) => write!(f, "Elevation unavailable: {}", msg),
            ClimateError::DivisionByZero => write!(f, "Percentage change undefined for zero baseline"),
            ClimateError::InvalidCoordinate { latitude, longitude } => {
                write!(f, "Coordinate out of range: ({}, {})", latitude, longitude)
            }
            ClimateError::NotFound(what) => write!(f, "Not found: {}", what),
            ClimateError::Http(code) => write!(f, "HTTP error: {}", code),
            ClimateError::Transport(msg) => write!(f, "Request failed: {}", msg),
        }
    }
}

impl std::error::Error for ClimateError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
