//! Run configuration.
//!
//! Every constant the pipeline depends on lives in one immutable
//! [`RunConfig`], deserialized from TOML. All fields have defaults, so an
//! empty file (or no file at all) reproduces the standard Central Valley run.
//! Paths can be overridden from the environment or a `.env` file:
//!
//! - `CVWATER_CONFIG`: config file to read when `--config` is not given
//! - `CVWATER_DATA_DIR`: directory holding `<STATION>.csv` exports
//! - `CVWATER_OUTPUT_DIR`: directory for generated artifacts

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::forecast::scenario::BASELINE_SCENARIO;
use crate::logging::LogLevel;
use crate::model::{
    station_column, Result, StationCategory, WaterError, AG_WATER_INDEX, AVG_FLOW,
    AVG_RIVER_STAGE,
};
use crate::stations::stations_in_category;

pub const ENV_CONFIG: &str = "CVWATER_CONFIG";
pub const ENV_DATA_DIR: &str = "CVWATER_DATA_DIR";
pub const ENV_OUTPUT_DIR: &str = "CVWATER_OUTPUT_DIR";

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Top-level run configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Divisor turning the composite index into sustainable farming days.
    pub water_requirement_per_day: f64,
    pub stations: StationLists,
    pub features: FeatureConfig,
    pub lstm: LstmConfig,
    pub additive: AdditiveConfig,
    pub decomposition: DecompositionConfig,
    pub scenarios: ScenarioConfig,
    pub logging: LoggingConfig,
}

/// Station ids per category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StationLists {
    pub river_stage: Vec<String>,
    pub flow: Vec<String>,
    pub groundwater: Vec<String>,
    pub snow: Vec<String>,
    pub precipitation: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Candidate columns for the composite index.
    pub index_components: Vec<String>,
    pub rolling_window_days: usize,
    pub rolling_columns: Vec<String>,
    /// Station whose column is the numerator of the snow-water ratio.
    pub snow_water_numerator: String,
    pub snow_water_denominator: String,
    pub correlation_columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LstmConfig {
    pub sequence_length: usize,
    pub hidden_size: usize,
    pub layers: usize,
    pub epochs: usize,
    pub learning_rate: f64,
    pub validation_split: f64,
    pub test_size: f64,
    pub seed: u64,
    pub checkpoint_file: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdditiveConfig {
    pub horizon_days: usize,
    /// Candidate seasonal periods in days; the longest one the history covers is used.
    pub seasonal_periods: Vec<usize>,
    /// Boosting rounds for the trend/seasonality fit.
    pub max_rounds: usize,
    pub interval_width: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecompositionConfig {
    pub period_days: usize,
    /// Full periods the contiguous segment must span.
    pub min_periods: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    pub cutoff: NaiveDate,
    pub variants: Vec<ScenarioVariant>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioVariant {
    pub name: String,
    pub factor: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub file: Option<String>,
    pub timestamps: bool,
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            output_dir: PathBuf::from("output"),
            water_requirement_per_day: 0.1,
            stations: StationLists::default(),
            features: FeatureConfig::default(),
            lstm: LstmConfig::default(),
            additive: AdditiveConfig::default(),
            decomposition: DecompositionConfig::default(),
            scenarios: ScenarioConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

fn registry_ids(category: StationCategory) -> Vec<String> {
    stations_in_category(category)
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for StationLists {
    fn default() -> Self {
        Self {
            river_stage: registry_ids(StationCategory::RiverStage),
            flow: registry_ids(StationCategory::Flow),
            groundwater: registry_ids(StationCategory::Groundwater),
            snow: registry_ids(StationCategory::Snow),
            precipitation: registry_ids(StationCategory::Precipitation),
        }
    }
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            index_components: vec![
                AVG_RIVER_STAGE.to_string(),
                AVG_FLOW.to_string(),
                station_column("YR1"),
                station_column("YBP3"),
            ],
            rolling_window_days: 30,
            rolling_columns: vec![
                AVG_RIVER_STAGE.to_string(),
                AVG_FLOW.to_string(),
                station_column("YR1"),
                station_column("WWS"),
            ],
            snow_water_numerator: "YBP3".to_string(),
            snow_water_denominator: "YBP18".to_string(),
            correlation_columns: vec![
                AVG_RIVER_STAGE.to_string(),
                AVG_FLOW.to_string(),
                station_column("YR1"),
                station_column("YBP3"),
                station_column("WWS"),
                AG_WATER_INDEX.to_string(),
            ],
        }
    }
}

impl Default for LstmConfig {
    fn default() -> Self {
        Self {
            sequence_length: 30,
            hidden_size: 50,
            layers: 2,
            epochs: 100,
            learning_rate: 0.001,
            validation_split: 0.1,
            test_size: 0.2,
            seed: 42,
            checkpoint_file: "lstm_checkpoint.json".to_string(),
        }
    }
}

impl Default for AdditiveConfig {
    fn default() -> Self {
        Self {
            horizon_days: 365,
            seasonal_periods: vec![365, 7],
            max_rounds: 50,
            interval_width: 0.8,
        }
    }
}

impl Default for DecompositionConfig {
    fn default() -> Self {
        Self {
            period_days: 365,
            min_periods: 2,
        }
    }
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            cutoff: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default(),
            variants: vec![
                ScenarioVariant { name: "dry".to_string(), factor: 0.8 },
                ScenarioVariant { name: "wet".to_string(), factor: 1.2 },
            ],
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            file: None,
            timestamps: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl StationLists {
    pub fn for_category(&self, category: StationCategory) -> &[String] {
        match category {
            StationCategory::RiverStage => &self.river_stage,
            StationCategory::Flow => &self.flow,
            StationCategory::Groundwater => &self.groundwater,
            StationCategory::Snow => &self.snow,
            StationCategory::Precipitation => &self.precipitation,
        }
    }

    /// Every configured (category, station id) pair in category order.
    pub fn all(&self) -> Vec<(StationCategory, &str)> {
        StationCategory::ALL
            .iter()
            .flat_map(|&c| self.for_category(c).iter().map(move |id| (c, id.as_str())))
            .collect()
    }
}

impl ScenarioConfig {
    /// Variant names become CSV column prefixes next to the baseline, so
    /// they must be unique and must not reuse the baseline's name.
    fn validate(&self) -> Result<()> {
        let mut seen: Vec<&str> = Vec::with_capacity(self.variants.len());
        for variant in &self.variants {
            let name = variant.name.as_str();
            if name.is_empty() || name == BASELINE_SCENARIO {
                return Err(WaterError::Config(format!(
                    "scenario name '{}' is reserved or empty",
                    name
                )));
            }
            if seen.contains(&name) {
                return Err(WaterError::Config(format!("duplicate scenario name '{}'", name)));
            }
            if !variant.factor.is_finite() {
                return Err(WaterError::Config(format!(
                    "scenario '{}' factor must be finite",
                    name
                )));
            }
            seen.push(name);
        }
        Ok(())
    }
}

impl RunConfig {
    /// Parses a TOML document. Missing fields take their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: RunConfig =
            toml::from_str(text).map_err(|e| WaterError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| WaterError::io(path, e))?;
        Self::from_toml_str(&text)
    }

    /// Resolves the effective configuration for a run.
    ///
    /// Order: explicit path, then `CVWATER_CONFIG`, then built-in defaults.
    /// Directory overrides from the environment are applied last.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        dotenv::dotenv().ok();

        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => match env::var(ENV_CONFIG) {
                Ok(path) => Self::from_file(Path::new(&path))?,
                Err(_) => Self::default(),
            },
        };

        if let Ok(dir) = env::var(ENV_DATA_DIR) {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = env::var(ENV_OUTPUT_DIR) {
            config.output_dir = PathBuf::from(dir);
        }

        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| WaterError::Config(e.to_string()))
    }

    pub fn station_path(&self, station_id: &str) -> PathBuf {
        self.data_dir.join(format!("{}.csv", station_id))
    }

    pub fn output_path(&self, file_name: &str) -> PathBuf {
        self.output_dir.join(file_name)
    }

    fn validate(&self) -> Result<()> {
        if !(self.water_requirement_per_day.is_finite() && self.water_requirement_per_day > 0.0) {
            return Err(WaterError::Config(
                "water_requirement_per_day must be a positive number".to_string(),
            ));
        }
        if self.lstm.sequence_length == 0 || self.lstm.layers == 0 || self.lstm.epochs == 0 {
            return Err(WaterError::Config(
                "lstm sequence_length, layers and epochs must be positive".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.lstm.test_size)
            || !(0.0..1.0).contains(&self.lstm.validation_split)
        {
            return Err(WaterError::Config(
                "lstm test_size and validation_split must be in [0, 1)".to_string(),
            ));
        }
        if !(0.0 < self.additive.interval_width && self.additive.interval_width < 1.0) {
            return Err(WaterError::Config(
                "additive interval_width must be in (0, 1)".to_string(),
            ));
        }
        if self.additive.max_rounds == 0 || !self.additive.seasonal_periods.iter().any(|&p| p >= 2) {
            return Err(WaterError::Config(
                "additive max_rounds must be positive and some seasonal period at least 2".to_string(),
            ));
        }
        self.scenarios.validate()?;
        if self.decomposition.period_days < 2 {
            return Err(WaterError::Config(
                "decomposition period_days must be at least 2".to_string(),
            ));
        }
        if self.features.rolling_window_days == 0 {
            return Err(WaterError::Config(
                "rolling_window_days must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
