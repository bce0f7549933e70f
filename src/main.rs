//! Livability CLI.
//!
//! Classify single coordinates, named cities, or the largest cities of the
//! catalog; sweep a global grid; render results as GeoJSON; and check that
//! the external data sources respond.

use clap::{Parser, Subcommand};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::time::Duration;

use livability_service::assess::ClimateComparator;
use livability_service::config::Config;
use livability_service::export::{grid_cells, verdict_points, write_feature_collection};
use livability_service::ingest::{self, CityCatalog, Geocoder};
use livability_service::logging::{self, DataSource};
use livability_service::model::{Coordinate, DeviationThresholds, LivabilityVerdict};
use livability_service::presets::PRESET_REGISTRY;
use livability_service::scan::ScanMode;
use livability_service::scan::batch::{LabeledCoordinate, Outcome, ScanResult, ScanSummary, classify_all};
use livability_service::scan::grid::{GridScan, GridSpec, read_records};
use livability_service::verify;

/// Climate livability classifier.
#[derive(Parser)]
#[command(name = "livability")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// TOML config file (defaults to $LIVABILITY_CONFIG, then built-in defaults).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Threshold preset; overrides `thresholds.preset` in the config file.
    #[arg(short, long, global = true)]
    preset: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify a single coordinate.
    Classify {
        /// Latitude in degrees (-90 to 90).
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,

        /// Longitude in degrees (-180 to 180).
        #[arg(long, allow_negative_numbers = true)]
        lon: f64,
    },

    /// Resolve a place name and classify it.
    City {
        /// Place name, e.g. "Berlin".
        name: String,
    },

    /// Classify the largest cities of the catalog.
    Cities {
        /// Only cities with more inhabitants than this.
        #[arg(long, default_value = "1000000")]
        min_population: u64,

        /// Maximum number of cities, largest first.
        #[arg(long, default_value = "100")]
        limit: usize,

        /// Sea-level check only; no climate requests.
        #[arg(long)]
        sea_level_only: bool,

        /// Write the results as JSON.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write the results as a GeoJSON point map.
        #[arg(long)]
        map: Option<PathBuf>,
    },

    /// Sweep a global lat/lon grid, appending JSON lines (resumable).
    Scan {
        /// Grid step in whole degrees (1-90).
        #[arg(short, long, default_value = "10")]
        step: u32,

        /// JSON-lines output; an existing file is resumed.
        #[arg(short, long, default_value = "grid.jsonl")]
        output: PathBuf,

        /// Elevation and sea-level check only.
        #[arg(long)]
        elevation_only: bool,

        /// Pause between points in milliseconds (defaults to `scan.pause_ms`).
        #[arg(long)]
        pause_ms: Option<u64>,
    },

    /// Render a grid-scan file as GeoJSON cells.
    Map {
        /// JSON-lines file written by `scan`.
        #[arg(short, long)]
        input: PathBuf,

        /// GeoJSON output file.
        #[arg(short, long, default_value = "grid.geojson")]
        output: PathBuf,

        /// Grid step the input was scanned with.
        #[arg(short, long, default_value = "10")]
        step: u32,
    },

    /// List the threshold presets.
    Presets,

    /// Query every external data source once.
    Verify {
        /// Also write the report as JSON.
        #[arg(long)]
        json: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let config = Config::load(cli.config.as_deref())?;
    logging::init_logger(
        config.log_level()?,
        config.logging.file.as_deref(),
        config.logging.timestamps,
    );

    match cli.command {
        Commands::Presets => {
            print_presets();
            return Ok(());
        }
        Commands::Map { input, output, step } => {
            let grid = GridSpec::new(step)?;
            let records = read_records(&input)?;
            write_feature_collection(&output, &grid_cells(&records, grid.step_degrees() as f64))?;
            println!("Wrote {} cells to {}", records.len(), output.display());
            return Ok(());
        }
        Commands::Verify { json } => {
            let report = verify::run_full_verification(&config)?;
            verify::print_summary(&report);
            if let Some(path) = json {
                std::fs::write(&path, serde_json::to_string_pretty(&report)?)?;
            }
            return Ok(());
        }
        _ => {}
    }

    let thresholds = config.thresholds.resolve(cli.preset.as_deref())?;
    let providers = ingest::connect(&config)?;
    let comparator = ClimateComparator::new(&providers.open_meteo, &providers.open_meteo)
        .with_periods(config.periods.baseline.clone(), config.periods.projection.clone());

    match cli.command {
        Commands::Classify { lat, lon } => {
            let coordinate = Coordinate::new(lat, lon)?;
            let verdict = comparator.classify_livability(coordinate, &thresholds)?;
            print_verdict(&coordinate.to_string(), &verdict);
        }

        Commands::City { name } => {
            let coordinate = providers.open_meteo.resolve_city_name(&name)?;
            let verdict = comparator.classify_livability(coordinate, &thresholds)?;
            print_verdict(&format!("{} ({})", name, coordinate), &verdict);
        }

        Commands::Cities {
            min_population,
            limit,
            sea_level_only,
            output,
            map,
        } => {
            let cities = providers.catalog.list_cities_above_population(min_population, limit)?;
            logging::info(
                DataSource::Catalog,
                None,
                &format!("{} cities above {} inhabitants", cities.len(), min_population),
            );

            let targets: Vec<LabeledCoordinate> = cities.iter().map(LabeledCoordinate::from).collect();
            let mode = if sea_level_only { ScanMode::SeaLevelOnly } else { ScanMode::Full };
            let results = classify_all(&comparator, &targets, &thresholds, mode, config.scan.concurrency)?;

            print_results(&results);
            if let Some(path) = output {
                std::fs::write(&path, serde_json::to_string_pretty(&results)?)?;
            }
            if let Some(path) = map {
                write_feature_collection(&path, &verdict_points(&results))?;
            }
        }

        Commands::Scan {
            step,
            output,
            elevation_only,
            pause_ms,
        } => {
            run_scan(&comparator, thresholds, step, &output, elevation_only, pause_ms.unwrap_or(config.scan.pause_ms))?;
        }

        Commands::Presets | Commands::Map { .. } | Commands::Verify { .. } => {}
    }

    Ok(())
}

fn run_scan(
    comparator: &ClimateComparator<'_>,
    thresholds: DeviationThresholds,
    step: u32,
    output: &Path,
    elevation_only: bool,
    pause_ms: u64,
) -> Result<(), Box<dyn Error>> {
    let grid = GridSpec::new(step)?;
    let mode = if elevation_only { ScanMode::SeaLevelOnly } else { ScanMode::Full };

    let report = GridScan::new(comparator, thresholds, grid, mode)
        .with_pause(Duration::from_millis(pause_ms))
        .run(output)?;

    println!(
        "Grid {}°: {} points, {} already done, {} written ({} unknown){}",
        grid.step_degrees(),
        report.total_points,
        report.skipped,
        report.written,
        report.unknown,
        if report.is_complete() { ", complete" } else { "" }
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

fn fmt_pct(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:+.3}%", v),
        None => "undefined".to_string(),
    }
}

fn print_verdict(label: &str, verdict: &LivabilityVerdict) {
    println!("{}", label);
    println!("  rain change:        {}", fmt_pct(verdict.rain_change_pct));
    println!("  temperature change: {}", fmt_pct(verdict.temp_change_pct));
    println!("  wind change:        {}", fmt_pct(verdict.wind_change_pct));
    println!(
        "  elevation:          {:.1} m{}",
        verdict.elevation_meters(),
        if verdict.elevation.is_fallback() { " (lookup failed)" } else { "" }
    );
    match verdict.first_failure() {
        None => println!("  livable:            yes"),
        Some(check) => {
            let failed: Vec<String> = verdict.failed_checks.iter().map(|c| c.to_string()).collect();
            println!("  livable:            no ({} check failed; all failures: {})", check, failed.join(", "));
        }
    }
}

fn print_results(results: &[ScanResult]) {
    for result in results {
        let status = match &result.outcome {
            Outcome::Classified { verdict } => match verdict.first_failure() {
                None => "livable".to_string(),
                Some(check) => format!("not livable ({})", check),
            },
            Outcome::SeaLevel { elevation, above_sea_level } => format!(
                "{} ({:.1} m)",
                if *above_sea_level { "above future sea level" } else { "below future sea level" },
                elevation.meters()
            ),
            Outcome::Unknown { reason } => format!("unknown: {}", reason),
        };
        println!("{:<28} {:>20}  {}", result.label, result.coordinate.to_string(), status);
    }

    let summary = ScanSummary::from_results(results);
    println!(
        "\n{} total: {} pass, {} fail, {} unknown",
        summary.total, summary.passed, summary.failed, summary.unknown
    );
}

fn print_presets() {
    for preset in PRESET_REGISTRY {
        let t = &preset.thresholds;
        println!(
            "{:<15} rain ±{}%  temp ±{}%  wind ±{}%  rise {} m (+{} m margin)",
            preset.name, t.rain_pct, t.temp_pct, t.wind_pct, t.sea_level_rise_m, t.safety_margin_m
        );
        println!("{:<15} {}", "", preset.description);
    }
}
