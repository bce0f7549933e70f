//! Climate comparison and livability classification.
//!
//! A coordinate is classified by fetching a baseline and a projected
//! `ClimateSample`, computing the relative change of each variable, looking
//! up the elevation, and combining four independent checks:
//!
//!   rain → temperature → wind → sea level
//!
//! Every check is evaluated and every failure is recorded in order; the
//! coordinate is livable only if none failed.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::analysis::statistics::{percentage_change, round_to, summarize_top_ten};
use crate::assess::thresholds::{sea_level_check, within_deviation};
use crate::ingest::{ClimateProvider, ElevationProvider, SeriesRequest};
use crate::logging::{self, DataSource};
use crate::model::{
    Check, ClimateError, ClimateSample, ClimateVariable, Coordinate, DeviationThresholds,
    ElevationReading, LivabilityVerdict,
};

/// Downscaled model used for the 2050 projection.
pub const DEFAULT_PROJECTION_MODEL: &str = "MRI_AGCM3_2_S";

// ---------------------------------------------------------------------------
// Periods
// ---------------------------------------------------------------------------

/// A fixed date window, optionally pinned to a named climate model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClimatePeriod {
    pub start: NaiveDate,
    pub end: NaiveDate,
    #[serde(default)]
    pub model: Option<String>,
}

impl ClimatePeriod {
    /// January 1st through December 31st of `year`.
    pub fn calendar_year(year: i32, model: Option<&str>) -> Option<Self> {
        Some(Self {
            start: NaiveDate::from_ymd_opt(year, 1, 1)?,
            end: NaiveDate::from_ymd_opt(year, 12, 31)?,
            model: model.map(String::from),
        })
    }

    /// Historical reference year, no model.
    pub fn baseline() -> Self {
        Self::calendar_year(2020, None).unwrap_or_else(|| unreachable!("2020 is a valid year"))
    }

    /// Projected year under the default downscaled model.
    pub fn projection() -> Self {
        Self::calendar_year(2050, Some(DEFAULT_PROJECTION_MODEL))
            .unwrap_or_else(|| unreachable!("2050 is a valid year"))
    }

    fn source(&self) -> DataSource {
        if self.model.is_some() {
            DataSource::Projection
        } else {
            DataSource::Archive
        }
    }
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Fetch one period's daily series and reduce each variable to its
/// top-ten median.
///
/// A variable missing from the response is `MalformedResponse`; a variable
/// present but without a single value is `DataUnavailable`. Neither is
/// replaced by a default.
pub fn fetch_climate_sample(
    provider: &dyn ClimateProvider,
    coordinate: Coordinate,
    period: &ClimatePeriod,
) -> Result<ClimateSample, ClimateError> {
    let request = SeriesRequest {
        coordinate,
        start: period.start,
        end: period.end,
        model: period.model.clone(),
    };
    let series = provider.fetch_daily_series(&request)?;

    let reduce = |variable: ClimateVariable| -> Result<f64, ClimateError> {
        let values = series.values.get(&variable).ok_or_else(|| {
            ClimateError::MalformedResponse(format!(
                "missing daily.{} for {}",
                variable.api_name(),
                coordinate
            ))
        })?;
        if values.is_empty() {
            return Err(ClimateError::DataUnavailable(format!(
                "daily.{} has no values for {} ({}..{})",
                variable.api_name(),
                coordinate,
                period.start,
                period.end
            )));
        }
        summarize_top_ten(values)
    };

    Ok(ClimateSample {
        total_precipitation: reduce(ClimateVariable::Precipitation)?,
        max_temperature: reduce(ClimateVariable::MaxTemperature)?,
        max_wind_speed: reduce(ClimateVariable::MaxWindSpeed)?,
    })
}

/// Look up the elevation, recovering any provider failure into
/// `ElevationReading::Fallback`.
pub fn query_elevation(provider: &dyn ElevationProvider, coordinate: Coordinate) -> ElevationReading {
    match provider.fetch_elevation(coordinate) {
        Ok(meters) => ElevationReading::Measured { meters },
        Err(err) => {
            let label = coordinate.to_string();
            logging::warn(
                DataSource::Elevation,
                Some(&label),
                &format!("lookup failed, using sentinel elevation: {}", err),
            );
            ElevationReading::Fallback {
                reason: err.to_string(),
            }
        }
    }
}

/// Combine two samples and an elevation into a verdict. No I/O.
pub fn evaluate_verdict(
    coordinate: Coordinate,
    baseline: &ClimateSample,
    projected: &ClimateSample,
    elevation: ElevationReading,
    thresholds: &DeviationThresholds,
) -> LivabilityVerdict {
    let rain = percentage_change(baseline.total_precipitation, projected.total_precipitation).ok();
    let temp = percentage_change(baseline.max_temperature, projected.max_temperature).ok();
    let wind = percentage_change(baseline.max_wind_speed, projected.max_wind_speed).ok();
    let above_sea_level = sea_level_check(&elevation, thresholds);

    let mut failed_checks = Vec::new();
    if !within_deviation(rain, thresholds.rain_pct) {
        failed_checks.push(Check::Rain);
    }
    if !within_deviation(temp, thresholds.temp_pct) {
        failed_checks.push(Check::Temperature);
    }
    if !within_deviation(wind, thresholds.wind_pct) {
        failed_checks.push(Check::Wind);
    }
    if !above_sea_level {
        failed_checks.push(Check::SeaLevel);
    }

    LivabilityVerdict {
        coordinate,
        rain_change_pct: rain,
        temp_change_pct: temp,
        wind_change_pct: wind,
        elevation,
        above_sea_level,
        livable: failed_checks.is_empty(),
        failed_checks,
    }
}

// ---------------------------------------------------------------------------
// Comparator
// ---------------------------------------------------------------------------

/// Runs classifications against injected providers and fixed periods.
///
/// Holds no state between calls beyond its configuration.
pub struct ClimateComparator<'a> {
    climate: &'a dyn ClimateProvider,
    elevation: &'a dyn ElevationProvider,
    baseline: ClimatePeriod,
    projection: ClimatePeriod,
}

impl<'a> ClimateComparator<'a> {
    pub fn new(climate: &'a dyn ClimateProvider, elevation: &'a dyn ElevationProvider) -> Self {
        Self {
            climate,
            elevation,
            baseline: ClimatePeriod::baseline(),
            projection: ClimatePeriod::projection(),
        }
    }

    pub fn with_periods(mut self, baseline: ClimatePeriod, projection: ClimatePeriod) -> Self {
        self.baseline = baseline;
        self.projection = projection;
        self
    }

    pub fn baseline(&self) -> &ClimatePeriod {
        &self.baseline
    }

    pub fn projection(&self) -> &ClimatePeriod {
        &self.projection
    }

    /// Classify one coordinate.
    ///
    /// Climate failures abort the classification; elevation failures are
    /// recovered into the sentinel.
    pub fn classify_livability(
        &self,
        coordinate: Coordinate,
        thresholds: &DeviationThresholds,
    ) -> Result<LivabilityVerdict, ClimateError> {
        let label = coordinate.to_string();

        let baseline = fetch_climate_sample(self.climate, coordinate, &self.baseline)?;
        logging::debug(
            self.baseline.source(),
            Some(&label),
            &format!("baseline sample {:?}", baseline),
        );

        let projected = fetch_climate_sample(self.climate, coordinate, &self.projection)?;
        logging::debug(
            self.projection.source(),
            Some(&label),
            &format!("projected sample {:?}", projected),
        );

        let elevation = query_elevation(self.elevation, coordinate);
        let verdict = evaluate_verdict(coordinate, &baseline, &projected, elevation, thresholds);

        logging::debug(
            DataSource::System,
            Some(&label),
            &format!(
                "livable={} rain={:?}% temp={:?}% wind={:?}% elevation={}m",
                verdict.livable,
                verdict.rain_change_pct.map(|v| round_to(v, 3)),
                verdict.temp_change_pct.map(|v| round_to(v, 3)),
                verdict.wind_change_pct.map(|v| round_to(v, 3)),
                verdict.elevation_meters()
            ),
        );

        Ok(verdict)
    }

    /// Sea-level check only, without any climate requests.
    pub fn check_sea_level(
        &self,
        coordinate: Coordinate,
        thresholds: &DeviationThresholds,
    ) -> (ElevationReading, bool) {
        let elevation = query_elevation(self.elevation, coordinate);
        let above = sea_level_check(&elevation, thresholds);
        (elevation, above)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
