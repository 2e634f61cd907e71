/// Core data types for the Central Valley water availability service.
///
/// This module defines the shared domain model imported by all other modules:
/// station categories, raw readings, daily station series, column names for
/// derived features, and the crate-wide error type. It contains no I/O.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// CDEC CSV layout
// ---------------------------------------------------------------------------

/// Header of the timestamp column in a CDEC station export.
pub const COL_DATE_TIME: &str = "DATE TIME";

/// Header of the measurement column in a CDEC station export.
pub const COL_VALUE: &str = "VALUE";

/// Timestamp format used by CDEC exports, e.g. `20230115 0800`.
pub const DATE_TIME_FORMAT: &str = "%Y%m%d %H%M";

// ---------------------------------------------------------------------------
// Derived column names
// ---------------------------------------------------------------------------

pub const AVG_RIVER_STAGE: &str = "avg_river_stage";
pub const AVG_FLOW: &str = "avg_flow";
pub const SNOW_WATER_RATIO: &str = "snow_water_ratio";
pub const DAY_OF_YEAR: &str = "dayofyear";
pub const MONTH: &str = "month";
pub const AG_WATER_INDEX: &str = "ag_water_index";
pub const SUSTAINABLE_FARMING_DAYS: &str = "sustainable_farming_days";

/// Column name used for a station's daily values in the combined table.
pub fn station_column(station_id: &str) -> String {
    format!("{}_value", station_id)
}

// ---------------------------------------------------------------------------
// Station categories
// ---------------------------------------------------------------------------

/// What a station measures. Determines which group average it feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StationCategory {
    RiverStage,
    Flow,
    Groundwater,
    Snow,
    Precipitation,
}

impl StationCategory {
    pub const ALL: [StationCategory; 5] = [
        StationCategory::RiverStage,
        StationCategory::Flow,
        StationCategory::Groundwater,
        StationCategory::Snow,
        StationCategory::Precipitation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StationCategory::RiverStage => "river_stage",
            StationCategory::Flow => "flow",
            StationCategory::Groundwater => "groundwater",
            StationCategory::Snow => "snow",
            StationCategory::Precipitation => "precipitation",
        }
    }
}

impl std::fmt::Display for StationCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Reading types
// ---------------------------------------------------------------------------

/// A single parsed row of a station export.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StationReading {
    pub timestamp: NaiveDateTime,
    pub value: f64,
}

/// One station's readings resampled to one value per calendar day.
///
/// The daily value is the arithmetic mean of every reading that fell on
/// that day. Days with no readings are simply absent.
#[derive(Debug, Clone, PartialEq)]
pub struct StationSeries {
    pub station_id: String,
    daily: BTreeMap<NaiveDate, f64>,
}

impl StationSeries {
    /// Resamples raw readings to daily means. Reading order does not matter.
    pub fn from_readings(station_id: &str, readings: &[StationReading]) -> Self {
        let mut sums: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
        for reading in readings {
            let entry = sums.entry(reading.timestamp.date()).or_insert((0.0, 0));
            entry.0 += reading.value;
            entry.1 += 1;
        }

        let daily = sums
            .into_iter()
            .map(|(day, (sum, count))| (day, sum / count as f64))
            .collect();

        Self {
            station_id: station_id.to_string(),
            daily,
        }
    }

    /// Builds a series directly from daily values.
    pub fn from_daily(station_id: &str, daily: BTreeMap<NaiveDate, f64>) -> Self {
        Self {
            station_id: station_id.to_string(),
            daily,
        }
    }

    pub fn column_name(&self) -> String {
        station_column(&self.station_id)
    }

    /// Days in ascending order.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.daily.keys().copied()
    }

    pub fn value_on(&self, day: NaiveDate) -> Option<f64> {
        self.daily.get(&day).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.daily.iter().map(|(d, v)| (*d, *v))
    }

    pub fn first_day(&self) -> Option<NaiveDate> {
        self.daily.keys().next().copied()
    }

    pub fn last_day(&self) -> Option<NaiveDate> {
        self.daily.keys().next_back().copied()
    }

    pub fn len(&self) -> usize {
        self.daily.len()
    }

    pub fn is_empty(&self) -> bool {
        self.daily.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, WaterError>;

/// Errors that can arise while loading, transforming or forecasting.
#[derive(Debug, Error)]
pub enum WaterError {
    /// The station's CSV file does not exist.
    #[error("station file not found: {}", path.display())]
    StationFileMissing { station: String, path: PathBuf },

    /// Any other filesystem failure, tagged with the offending path.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The CSV reader rejected the file.
    #[error("CSV error in {}: {message}", path.display())]
    Csv { path: PathBuf, message: String },

    /// A required header is absent from a station export.
    #[error("station {station} is missing required column '{column}'")]
    MissingColumn { station: String, column: String },

    /// Every row of a station export was dropped during coercion.
    #[error("no usable rows for station {0}")]
    NoUsableRows(String),

    /// Configuration could not be read or is inconsistent.
    #[error("configuration error: {0}")]
    Config(String),

    /// Not enough observations for the requested operation.
    #[error("insufficient data: need at least {needed}, got {got}")]
    InsufficientData { needed: usize, got: usize },

    /// A parameter is outside its valid range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// A column has the wrong number of rows for the table it joins.
    #[error("column '{column}' has {got} rows, table has {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        got: usize,
    },

    /// The forecasting library rejected the series or failed to fit.
    #[error("forecast model error: {0}")]
    Forecast(#[from] anofox_forecast::error::ForecastError),

    /// A model checkpoint could not be encoded or decoded.
    #[error("checkpoint error: {0}")]
    Checkpoint(String),

    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl WaterError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        WaterError::Io {
            path: path.into(),
            source,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
