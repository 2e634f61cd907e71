/// Feature engineering over the combined station table.
///
/// Runs after the table has been brought to daily frequency:
/// 1. every column is gap-filled by time-weighted interpolation
/// 2. category averages (`avg_river_stage`, `avg_flow`)
/// 3. the snow-water ratio
/// 4. calendar features (`dayofyear`, `month`)
/// 5. trailing rolling means of selected columns
///
/// Features whose inputs are absent are skipped with a warning; the caller
/// gets the list back so the report can say what was left out.

use chrono::Datelike;

use crate::analysis::aggregate::{add_group_average, add_ratio};
use crate::analysis::gaps::interpolate_time;
use crate::config::RunConfig;
use crate::logging::{self, Stage};
use crate::model::{Result, AVG_FLOW, AVG_RIVER_STAGE, DAY_OF_YEAR, MONTH, SNOW_WATER_RATIO};
use crate::table::{Column, CombinedTable};

/// The feature table plus what could not be built.
#[derive(Debug, Clone)]
pub struct FeatureSet {
    pub table: CombinedTable,
    pub skipped: Vec<String>,
}

/// Mean of the trailing `window` cells ending at each row. A row is missing
/// unless all `window` cells are present.
pub fn rolling_mean(values: &[Option<f64>], window: usize) -> Column {
    let mut out = vec![None; values.len()];
    if window == 0 {
        return out;
    }
    for end in window - 1..values.len() {
        let slice = &values[end + 1 - window..=end];
        if slice.iter().all(|v| v.is_some()) {
            out[end] = Some(slice.iter().flatten().sum::<f64>() / window as f64);
        }
    }
    out
}

/// Gap-fills every column of the table in place of the original values.
pub fn interpolate_all(table: &CombinedTable) -> Result<CombinedTable> {
    let mut filled = table.clone();
    let names: Vec<String> = table.column_names().map(String::from).collect();
    for name in names {
        if let Some(values) = table.column(&name) {
            let interpolated = interpolate_time(table.days(), values);
            filled.insert_column(&name, interpolated)?;
        }
    }
    Ok(filled)
}

/// Builds every derived feature. `daily` should already be at daily frequency.
pub fn engineer_features(daily: &CombinedTable, config: &RunConfig) -> Result<FeatureSet> {
    let mut table = interpolate_all(daily)?;
    let mut skipped = Vec::new();

    for (ids, column, label) in [
        (&config.stations.river_stage, AVG_RIVER_STAGE, "river stage"),
        (&config.stations.flow, AVG_FLOW, "flow"),
    ] {
        let used = add_group_average(&mut table, ids, column)?;
        if used == 0 {
            logging::warn(
                Stage::Features,
                None,
                &format!("No {} stations available for averaging", label),
            );
            skipped.push(column.to_string());
        } else {
            logging::info(
                Stage::Features,
                None,
                &format!("Averaged {} from {} stations", label, used),
            );
        }
    }

    let features = &config.features;
    if add_ratio(
        &mut table,
        &features.snow_water_numerator,
        &features.snow_water_denominator,
        SNOW_WATER_RATIO,
    )? {
        logging::info(Stage::Features, None, "Calculated snow water ratio");
    } else {
        logging::warn(
            Stage::Features,
            None,
            &format!(
                "Unable to calculate snow water ratio: {} or {} missing",
                features.snow_water_numerator, features.snow_water_denominator
            ),
        );
        skipped.push(SNOW_WATER_RATIO.to_string());
    }

    let day_of_year = table.days().iter().map(|d| Some(d.ordinal() as f64)).collect();
    let month = table.days().iter().map(|d| Some(d.month() as f64)).collect();
    table.insert_column(DAY_OF_YEAR, day_of_year)?;
    table.insert_column(MONTH, month)?;

    let window = features.rolling_window_days;
    for column in &features.rolling_columns {
        let out_name = format!("{}_{}d_avg", column, window);
        match table.column(column) {
            Some(values) => {
                let rolled = rolling_mean(values, window);
                table.insert_column(&out_name, rolled)?;
                logging::debug(
                    Stage::Features,
                    None,
                    &format!("Calculated {}-day rolling average for {}", window, column),
                );
            }
            None => {
                logging::warn(
                    Stage::Features,
                    None,
                    &format!("Unable to calculate rolling average for {}: column missing", column),
                );
                skipped.push(out_name);
            }
        }
    }

    Ok(FeatureSet { table, skipped })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
