/// Structured logging for the livability service
///
/// Provides context-rich logging with data-source tags, coordinate or city
/// labels, timestamps, and severity levels. Supports both console output
/// and file-based logging for long-running grid scans.

use chrono::Utc;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Mutex;

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Data Source Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    Archive,
    Projection,
    Elevation,
    Geocoding,
    Catalog,
    Scan,
    System,
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::Archive => write!(f, "ARCHIVE"),
            DataSource::Projection => write!(f, "PROJECTION"),
            DataSource::Elevation => write!(f, "ELEVATION"),
            DataSource::Geocoding => write!(f, "GEOCODE"),
            DataSource::Catalog => write!(f, "CATALOG"),
            DataSource::Scan => write!(f, "SCAN"),
            DataSource::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Expected failure - e.g. an ocean coordinate with no land data
    Expected,
    /// Unexpected failure - indicates service degradation or an API change
    Unexpected,
    /// Unknown - cannot determine if this is expected or not
    Unknown,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
            FailureType::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

// ---------------------------------------------------------------------------
// Logger Configuration
// ---------------------------------------------------------------------------

/// Global logger instance
static LOGGER: Mutex<Option<Logger>> = Mutex::new(None);

pub struct Logger {
    /// Minimum log level to display
    min_level: LogLevel,
    /// Optional file path for logging
    log_file: Option<String>,
    /// Whether to include timestamps in console output
    console_timestamps: bool,
}

impl Logger {
    /// Initialize the global logger
    pub fn init(min_level: LogLevel, log_file: Option<String>, console_timestamps: bool) {
        let logger = Logger {
            min_level,
            log_file,
            console_timestamps,
        };

        if let Ok(mut guard) = LOGGER.lock() {
            *guard = Some(logger);
        }
    }

    fn log(&self, level: LogLevel, source: &DataSource, label: Option<&str>, message: &str) {
        if level < self.min_level {
            return;
        }

        let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");

        let label_part = label.map(|s| format!(" [{}]", s)).unwrap_or_default();
        let log_entry = format_entry(&timestamp.to_string(), level, source, &label_part, message);

        // Console output
        if self.console_timestamps {
            match level {
                LogLevel::Error => eprintln!("{}", log_entry),
                LogLevel::Warning => eprintln!("   {}", log_entry),
                LogLevel::Info => println!("   {}", message),
                LogLevel::Debug => println!("   [DEBUG] {}", message),
            }
        } else {
            match level {
                LogLevel::Error => eprintln!("   ✗ {}{}: {}", source, label_part, message),
                LogLevel::Warning => eprintln!("   ⚠ {}{}: {}", source, label_part, message),
                LogLevel::Info => println!("   {}", message),
                LogLevel::Debug => {}
            }
        }

        // File output
        if let Some(ref path) = self.log_file {
            if let Err(e) = Self::append_to_file(path, &log_entry) {
                eprintln!("Failed to write to log file {}: {}", path, e);
            }
        }
    }

    fn append_to_file(path: &str, entry: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        writeln!(file, "{}", entry)?;
        Ok(())
    }
}

fn format_entry(
    timestamp: &str,
    level: LogLevel,
    source: &DataSource,
    label_part: &str,
    message: &str,
) -> String {
    format!("{} {} {}{}: {}", timestamp, level, source, label_part, message)
}

fn with_logger(f: impl FnOnce(&Logger)) {
    if let Ok(guard) = LOGGER.lock() {
        if let Some(logger) = guard.as_ref() {
            f(logger);
        }
    }
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

/// Initialize the global logger
pub fn init_logger(min_level: LogLevel, log_file: Option<&str>, console_timestamps: bool) {
    Logger::init(min_level, log_file.map(String::from), console_timestamps);
}

/// Log a general informational message
pub fn info(source: DataSource, label: Option<&str>, message: &str) {
    with_logger(|logger| logger.log(LogLevel::Info, &source, label, message));
}

/// Log a warning message
pub fn warn(source: DataSource, label: Option<&str>, message: &str) {
    with_logger(|logger| logger.log(LogLevel::Warning, &source, label, message));
}

/// Log an error message
pub fn error(source: DataSource, label: Option<&str>, message: &str) {
    with_logger(|logger| logger.log(LogLevel::Error, &source, label, message));
}

/// Log a debug message
pub fn debug(source: DataSource, label: Option<&str>, message: &str) {
    with_logger(|logger| logger.log(LogLevel::Debug, &source, label, message));
}

// ---------------------------------------------------------------------------
// Failure Classification Helpers
// ---------------------------------------------------------------------------

/// Classify a provider failure from its rendered error message.
pub fn classify_fetch_failure(error_message: &str) -> FailureType {
    // No response at all: timeouts, refused connections
    if error_message.contains("Request failed")
        || error_message.contains("error sending request")
        || error_message.contains("timed out")
    {
        FailureType::Unexpected
    }
    // Open-Meteo answers points without land data with an explicit reason
    else if error_message.contains("No data available") {
        FailureType::Expected
    }
    // HTTP errors indicate service issues
    else if error_message.contains("HTTP error") {
        FailureType::Unexpected
    }
    // Missing variables suggest an API change or a bug
    else if error_message.contains("Malformed response") {
        FailureType::Unexpected
    }
    else {
        FailureType::Unknown
    }
}

// ---------------------------------------------------------------------------
// Structured Failure Logging
// ---------------------------------------------------------------------------

/// Log a data source failure with automatic classification
pub fn log_fetch_failure(source: DataSource, label: &str, operation: &str, err: &dyn std::error::Error) {
    let error_msg = err.to_string();
    let failure_type = classify_fetch_failure(&error_msg);

    let message = format!(
        "{} failed [{}]: {}",
        operation,
        failure_type,
        error_msg
    );

    match failure_type {
        FailureType::Expected => debug(source, Some(label), &message),
        FailureType::Unexpected => error(source, Some(label), &message),
        FailureType::Unknown => warn(source, Some(label), &message),
    }
}

// ---------------------------------------------------------------------------
// Batch Summary Logging
// ---------------------------------------------------------------------------

/// Log a summary of a batch or grid scan
pub fn log_scan_summary(source: DataSource, total: usize, classified: usize, unknown: usize) {
    let message = format!(
        "Scan complete: {}/{} classified, {} unknown",
        classified,
        total,
        unknown
    );

    if unknown == 0 {
        info(source, None, &message);
    } else if classified == 0 {
        error(source, None, &message);
    } else {
        warn(source, None, &message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::http::FetchError;
    use crate::model::ClimateError;

    #[test]
    fn test_log_level_ordering() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warning);
        assert!(LogLevel::Warning < LogLevel::Error);
    }

    #[test]
    fn test_log_level_parses_config_spellings() {
        assert_eq!("warn".parse::<LogLevel>(), Ok(LogLevel::Warning));
        assert_eq!(" INFO ".parse::<LogLevel>(), Ok(LogLevel::Info));
        assert!("verbose".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_failure_classification() {
        let no_data = ClimateError::DataUnavailable("no land data at 0.0000,-140.0000".into());
        assert_eq!(classify_fetch_failure(&no_data.to_string()), FailureType::Expected);

        let http = ClimateError::Http(500);
        assert_eq!(classify_fetch_failure(&http.to_string()), FailureType::Unexpected);

        let malformed = ClimateError::MalformedResponse("missing daily.precipitation_sum".into());
        assert_eq!(classify_fetch_failure(&malformed.to_string()), FailureType::Unexpected);

        assert_eq!(classify_fetch_failure("something odd"), FailureType::Unknown);
    }

    #[test]
    fn test_timeouts_are_unexpected_not_missing_data() {
        let timeout = ClimateError::from(FetchError::Transport(
            "error sending request for url (https://archive-api.open-meteo.com/v1/archive): operation timed out"
                .into(),
        ));
        assert_eq!(classify_fetch_failure(&timeout.to_string()), FailureType::Unexpected);

        let refused = ClimateError::from(FetchError::Transport("connection refused".into()));
        assert_eq!(classify_fetch_failure(&refused.to_string()), FailureType::Unexpected);
    }

    #[test]
    fn test_entry_format_includes_label_once() {
        let entry = format_entry(
            "2026-01-01 00:00:00 UTC",
            LogLevel::Warning,
            &DataSource::Elevation,
            " [Berlin]",
            "fallback",
        );
        assert_eq!(entry, "2026-01-01 00:00:00 UTC WARN ELEVATION [Berlin]: fallback");
    }
}
