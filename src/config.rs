//! Runtime configuration.
//!
//! Loaded from an optional TOML file (`--config` or `LIVABILITY_CONFIG`),
//! then overridden from the environment (`.env` is read first):
//!
//! - `OPEN_METEO_API_KEY` : commercial Open-Meteo key, sent as `apikey`
//! - `LIVABILITY_LOG_LEVEL`: debug | info | warn | error
//! - `LIVABILITY_LOG_FILE` : append log entries to this file
//!
//! Every section has defaults, so an empty file (or none) is valid.
//!
//! ```toml
//! [thresholds]
//! preset = "city-survey"
//! sea_level_rise_m = 3.0      # overrides the preset field
//!
//! [periods.projection]
//! start = "2050-01-01"
//! end = "2050-12-31"
//! model = "MRI_AGCM3_2_S"
//!
//! [http]
//! timeout_secs = 30
//! retries = 5
//! backoff_factor = 0.2
//! cache_ttl_secs = 3600
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::assess::ClimatePeriod;
use crate::ingest::cities::DEFAULT_CATALOG_URL;
use crate::ingest::http::{HttpSettings, MAX_BACKOFF_SECS, RetryPolicy};
use crate::ingest::open_meteo::OpenMeteoEndpoints;
use crate::logging::LogLevel;
use crate::model::DeviationThresholds;
use crate::presets::{self, DEFAULT_PRESET};

pub const CONFIG_PATH_ENV: &str = "LIVABILITY_CONFIG";
pub const API_KEY_ENV: &str = "OPEN_METEO_API_KEY";
pub const LOG_LEVEL_ENV: &str = "LIVABILITY_LOG_LEVEL";
pub const LOG_FILE_ENV: &str = "LIVABILITY_LOG_FILE";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum ConfigError {
    Io(String),
    Parse(String),
    UnknownPreset(String),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(msg) => write!(f, "Config read error: {}", msg),
            ConfigError::Parse(msg) => write!(f, "Config parse error: {}", msg),
            ConfigError::UnknownPreset(name) => write!(
                f,
                "Unknown threshold preset '{}' (known: {})",
                name,
                presets::preset_names().join(", ")
            ),
            ConfigError::Invalid(msg) => write!(f, "Invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Threshold selection: a preset plus optional per-field overrides.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    pub preset: Option<String>,
    pub rain_pct: Option<f64>,
    pub temp_pct: Option<f64>,
    pub wind_pct: Option<f64>,
    pub sea_level_rise_m: Option<f64>,
    pub safety_margin_m: Option<f64>,
}

impl ThresholdConfig {
    /// Resolve against the preset registry. `preset_override` (e.g. from the
    /// CLI) takes precedence over the configured preset name.
    pub fn resolve(&self, preset_override: Option<&str>) -> Result<DeviationThresholds, ConfigError> {
        let name = preset_override
            .or(self.preset.as_deref())
            .unwrap_or(DEFAULT_PRESET);
        let preset = presets::find_preset(name)
            .ok_or_else(|| ConfigError::UnknownPreset(name.to_string()))?;

        let mut t = preset.thresholds;
        if let Some(v) = self.rain_pct {
            t.rain_pct = v;
        }
        if let Some(v) = self.temp_pct {
            t.temp_pct = v;
        }
        if let Some(v) = self.wind_pct {
            t.wind_pct = v;
        }
        if let Some(v) = self.sea_level_rise_m {
            t.sea_level_rise_m = v;
        }
        if let Some(v) = self.safety_margin_m {
            t.safety_margin_m = v;
        }

        for (label, value) in [("rain_pct", t.rain_pct), ("temp_pct", t.temp_pct), ("wind_pct", t.wind_pct)] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::Invalid(format!("{} must be a non-negative number, got {}", label, value)));
            }
        }
        Ok(t)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PeriodConfig {
    pub baseline: ClimatePeriod,
    pub projection: ClimatePeriod,
    /// Timezone used by the API to align daily windows.
    pub timezone: String,
}

impl Default for PeriodConfig {
    fn default() -> Self {
        Self {
            baseline: ClimatePeriod::baseline(),
            projection: ClimatePeriod::projection(),
            timezone: "Europe/Berlin".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub retries: u32,
    pub backoff_factor: f64,
    pub cache_ttl_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            retries: 5,
            backoff_factor: 0.2,
            cache_ttl_secs: 3600,
        }
    }
}

impl HttpConfig {
    pub fn settings(&self) -> HttpSettings {
        HttpSettings {
            timeout: Duration::from_secs(self.timeout_secs),
            retry: RetryPolicy {
                max_retries: self.retries,
                backoff_factor: self.backoff_factor,
            },
            cache_ttl: Duration::from_secs(self.cache_ttl_secs),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    pub archive: String,
    pub climate: String,
    pub elevation: String,
    pub geocoding: String,
    pub cities: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        let open_meteo = OpenMeteoEndpoints::default();
        Self {
            archive: open_meteo.archive,
            climate: open_meteo.climate,
            elevation: open_meteo.elevation,
            geocoding: open_meteo.geocoding,
            cities: DEFAULT_CATALOG_URL.to_string(),
        }
    }
}

impl EndpointConfig {
    pub fn open_meteo(&self) -> OpenMeteoEndpoints {
        OpenMeteoEndpoints {
            archive: self.archive.clone(),
            climate: self.climate.clone(),
            elevation: self.elevation.clone(),
            geocoding: self.geocoding.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Upper bound on concurrently classified coordinates.
    pub concurrency: usize,
    /// Pause between grid points, to stay under provider rate limits.
    pub pause_ms: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            pause_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: Option<String>,
    pub file: Option<String>,
    pub timestamps: bool,
}

// ---------------------------------------------------------------------------
// Top level
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub thresholds: ThresholdConfig,
    pub periods: PeriodConfig,
    pub http: HttpConfig,
    pub endpoints: EndpointConfig,
    pub scan: ScanConfig,
    pub logging: LoggingConfig,
    /// Not read from the file; populated from `OPEN_METEO_API_KEY`.
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Config {
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if given, otherwise the path in `LIVABILITY_CONFIG`,
    /// otherwise defaults; then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let env_path = std::env::var(CONFIG_PATH_ENV).ok();
        let path = path.map(Path::to_path_buf).or_else(|| env_path.map(Into::into));

        let mut config = match path {
            Some(p) => {
                let contents = std::fs::read_to_string(&p)
                    .map_err(|e| ConfigError::Io(format!("{}: {}", p.display(), e)))?;
                Self::from_toml_str(&contents)?
            }
            None => Config::default(),
        };

        let env: HashMap<String, String> = std::env::vars().collect();
        config.apply_env(&env);
        Ok(config)
    }

    /// Apply overrides from an environment snapshot.
    pub fn apply_env(&mut self, env: &HashMap<String, String>) {
        if let Some(key) = env.get(API_KEY_ENV).filter(|k| !k.trim().is_empty()) {
            self.api_key = Some(key.trim().to_string());
        }
        if let Some(level) = env.get(LOG_LEVEL_ENV) {
            self.logging.level = Some(level.clone());
        }
        if let Some(file) = env.get(LOG_FILE_ENV) {
            self.logging.file = Some(file.clone());
        }
    }

    pub fn log_level(&self) -> Result<LogLevel, ConfigError> {
        match &self.logging.level {
            Some(level) => level.parse::<LogLevel>().map_err(ConfigError::Invalid),
            None => Ok(LogLevel::Info),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (label, period) in [("baseline", &self.periods.baseline), ("projection", &self.periods.projection)] {
            if period.end < period.start {
                return Err(ConfigError::Invalid(format!(
                    "{} period ends ({}) before it starts ({})",
                    label, period.end, period.start
                )));
            }
        }
        if self.scan.concurrency == 0 {
            return Err(ConfigError::Invalid("scan.concurrency must be at least 1".to_string()));
        }
        if !(0.0..=MAX_BACKOFF_SECS).contains(&self.http.backoff_factor) {
            return Err(ConfigError::Invalid(format!(
                "http.backoff_factor must be between 0 and {} seconds, got {}",
                MAX_BACKOFF_SECS, self.http.backoff_factor
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
