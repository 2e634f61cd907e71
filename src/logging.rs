/// Structured logging for the water availability pipeline
///
/// Provides context-rich logging tagged with the pipeline stage and, where
/// relevant, a station id. Supports console output and an optional
/// append-only log file for unattended batch runs.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Mutex;

use crate::model::WaterError;

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
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

// ---------------------------------------------------------------------------
// Pipeline Stages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    Loader,
    Aggregator,
    Features,
    Index,
    Gaps,
    Forecast,
    Report,
    System,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Loader => write!(f, "LOAD"),
            Stage::Aggregator => write!(f, "AGG"),
            Stage::Features => write!(f, "FEAT"),
            Stage::Index => write!(f, "INDEX"),
            Stage::Gaps => write!(f, "GAPS"),
            Stage::Forecast => write!(f, "FCST"),
            Stage::Report => write!(f, "REPORT"),
            Stage::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Expected failure - the station simply has no export in the data directory
    Expected,
    /// Unexpected failure - unreadable or structurally broken export
    Unexpected,
    /// Unknown - the file parsed but produced nothing usable
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

        if let Ok(mut slot) = LOGGER.lock() {
            *slot = Some(logger);
        }
    }

    fn log(&self, level: LogLevel, stage: &Stage, station: Option<&str>, message: &str) {
        if level < self.min_level {
            return;
        }

        let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
        let station_part = station.map(|s| format!(" [{}]", s)).unwrap_or_default();
        let log_entry = format!("{} {} {}{}: {}", timestamp, level, stage, station_part, message);

        if self.console_timestamps {
            match level {
                LogLevel::Error | LogLevel::Warning => eprintln!("{}", log_entry),
                LogLevel::Info | LogLevel::Debug => println!("{}", log_entry),
            }
        } else {
            match level {
                LogLevel::Error => eprintln!("   ✗ {}{}: {}", stage, station_part, message),
                LogLevel::Warning => eprintln!("   ⚠ {}{}: {}", stage, station_part, message),
                LogLevel::Info => println!("   {}", message),
                LogLevel::Debug => println!("   [DEBUG] {}{}: {}", stage, station_part, message),
            }
        }

        if let Some(ref path) = self.log_file {
            if let Err(e) = Self::append_to_file(path, &log_entry) {
                eprintln!("Failed to write to log file {}: {}", path, e);
            }
        }
    }

    fn append_to_file(path: &str, entry: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", entry)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

/// Initialize the global logger
pub fn init_logger(min_level: LogLevel, log_file: Option<&str>, console_timestamps: bool) {
    Logger::init(min_level, log_file.map(String::from), console_timestamps);
}

fn emit(level: LogLevel, stage: Stage, station: Option<&str>, message: &str) {
    if let Ok(guard) = LOGGER.lock() {
        if let Some(logger) = guard.as_ref() {
            logger.log(level, &stage, station, message);
        }
    }
}

/// Log a general informational message
pub fn info(stage: Stage, station: Option<&str>, message: &str) {
    emit(LogLevel::Info, stage, station, message);
}

/// Log a warning message
pub fn warn(stage: Stage, station: Option<&str>, message: &str) {
    emit(LogLevel::Warning, stage, station, message);
}

/// Log an error message
pub fn error(stage: Stage, station: Option<&str>, message: &str) {
    emit(LogLevel::Error, stage, station, message);
}

/// Log a debug message
pub fn debug(stage: Stage, station: Option<&str>, message: &str) {
    emit(LogLevel::Debug, stage, station, message);
}

// ---------------------------------------------------------------------------
// Failure Classification Helpers
// ---------------------------------------------------------------------------

/// Classify a station load failure by error kind.
pub fn classify_station_failure(err: &WaterError) -> FailureType {
    match err {
        // Not every configured station has an export for every study period
        WaterError::StationFileMissing { .. } => FailureType::Expected,
        WaterError::Io { .. } | WaterError::Csv { .. } | WaterError::MissingColumn { .. } => {
            FailureType::Unexpected
        }
        _ => FailureType::Unknown,
    }
}

/// Log a station load failure with automatic classification.
///
/// Missing files are the common case and are logged as warnings rather
/// than debug lines, since a skipped station changes the index.
pub fn log_station_failure(station_id: &str, operation: &str, err: &WaterError) {
    let failure_type = classify_station_failure(err);
    let message = format!("{} failed [{}]: {}", operation, failure_type, err);

    match failure_type {
        FailureType::Expected | FailureType::Unknown => {
            warn(Stage::Loader, Some(station_id), &message)
        }
        FailureType::Unexpected => error(Stage::Loader, Some(station_id), &message),
    }
}

// ---------------------------------------------------------------------------
// Load Summary Logging
// ---------------------------------------------------------------------------

/// Log a summary of station loading.
pub fn log_load_summary(total: usize, loaded: usize, skipped: usize) {
    let message = format!(
        "Station load complete: {}/{} loaded, {} skipped",
        loaded, total, skipped
    );

    if skipped == 0 {
        info(Stage::Loader, None, &message);
    } else if loaded == 0 {
        error(Stage::Loader, None, &message);
    } else {
        warn(Stage::Loader, None, &message);
    }
}
