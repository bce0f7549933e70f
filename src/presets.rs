/// Named threshold presets.
///
/// Each entry captures one set of deviation limits and sea-level assumptions
/// that has been used for livability runs, so results can be reproduced and
/// compared by name. This is the single source of truth for preset names:
/// config files and the CLI reference presets from here rather than
/// repeating the numbers.

use crate::model::{DEFAULT_SAFETY_MARGIN_M, DeviationThresholds};

/// Preset used when neither the config nor the CLI names one.
pub const DEFAULT_PRESET: &str = "city-survey";

/// A named, documented set of thresholds.
pub struct ThresholdPreset {
    pub name: &'static str,
    pub description: &'static str,
    pub thresholds: DeviationThresholds,
}

pub static PRESET_REGISTRY: &[ThresholdPreset] = &[
    ThresholdPreset {
        name: "city-survey",
        description: "Large-city survey: tolerant of rainfall swings, strict on \
                      heat and wind, assumes a worst-case 10 m sea-level rise.",
        thresholds: DeviationThresholds {
            rain_pct: 50.0,
            temp_pct: 20.0,
            wind_pct: 20.0,
            sea_level_rise_m: 10.0,
            safety_margin_m: DEFAULT_SAFETY_MARGIN_M,
        },
    },
    ThresholdPreset {
        name: "strict",
        description: "Uniform 20 % limit on every variable with a 10 m rise.",
        thresholds: DeviationThresholds {
            rain_pct: 20.0,
            temp_pct: 20.0,
            wind_pct: 20.0,
            sea_level_rise_m: 10.0,
            safety_margin_m: DEFAULT_SAFETY_MARGIN_M,
        },
    },
    ThresholdPreset {
        name: "moderate-rise",
        description: "Uniform 30 % limit with a 3 m rise; the setting used for \
                      single-coordinate spot checks.",
        thresholds: DeviationThresholds {
            rain_pct: 30.0,
            temp_pct: 30.0,
            wind_pct: 30.0,
            sea_level_rise_m: 3.0,
            safety_margin_m: DEFAULT_SAFETY_MARGIN_M,
        },
    },
    ThresholdPreset {
        name: "lenient",
        description: "Uniform 50 % limit with a 0.5 m rise, close to mid-range \
                      sea-level projections for 2050.",
        thresholds: DeviationThresholds {
            rain_pct: 50.0,
            temp_pct: 50.0,
            wind_pct: 50.0,
            sea_level_rise_m: 0.5,
            safety_margin_m: DEFAULT_SAFETY_MARGIN_M,
        },
    },
    ThresholdPreset {
        name: "elevation-scan",
        description: "Grid sweeps that only care about the sea-level check; \
                      climate limits match city-survey.",
        thresholds: DeviationThresholds {
            rain_pct: 50.0,
            temp_pct: 20.0,
            wind_pct: 20.0,
            sea_level_rise_m: 3.0,
            safety_margin_m: DEFAULT_SAFETY_MARGIN_M,
        },
    },
];

/// Looks up a preset by name. Returns `None` if not found.
pub fn find_preset(name: &str) -> Option<&'static ThresholdPreset> {
    PRESET_REGISTRY.iter().find(|p| p.name == name)
}

/// Returns all preset names, in registry order.
pub fn preset_names() -> Vec<&'static str> {
    PRESET_REGISTRY.iter().map(|p| p.name).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
