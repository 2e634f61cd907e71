//! End-to-end water availability run.
//!
//! Stages hand their results to the next stage explicitly; the only shared
//! input is the immutable [`RunConfig`]. Optional stages degrade by
//! omission: a missing station, feature or index never aborts the run.
//! Failing to write a required output does.

use std::fs;
use std::path::PathBuf;

use chrono::NaiveDate;

use crate::analysis::aggregate::combine_stations;
use crate::analysis::features::engineer_features;
use crate::analysis::gaps::{handle_gaps, ContiguousSegment};
use crate::analysis::index::build_index;
use crate::analysis::stats::{correlation_matrix, describe, ColumnSummary};
use crate::config::RunConfig;
use crate::forecast::additive::AdditiveModel;
use crate::forecast::decompose::{seasonal_decompose, Decomposition};
use crate::forecast::lstm::{run_lstm, LstmOutcome};
use crate::forecast::scenario::{build_scenarios, scenarios_table, Scenario};
use crate::forecast::ForecastPoint;
use crate::ingest::load_all_stations;
use crate::logging::{self, Stage};
use crate::model::{Result, WaterError, AG_WATER_INDEX};
use crate::report::{build_report, ReportInputs, StationRow, Step, REPORT_FILE};
use crate::table::CombinedTable;

pub const PROCESSED_DATA_FILE: &str = "processed_data.csv";
pub const SCENARIOS_FILE: &str = "forecast_scenarios.csv";

/// What a run produced.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub stations_loaded: usize,
    pub stations_skipped: usize,
    pub days: usize,
    pub index_components: Vec<String>,
    pub segment_days: usize,
    pub decomposition_ran: bool,
    pub lstm_ran: bool,
    pub additive_ran: bool,
    pub scenarios: Vec<String>,
    pub outputs: Vec<PathBuf>,
}

pub fn run(config: &RunConfig) -> Result<RunSummary> {
    logging::info(
        Stage::System,
        None,
        &format!("Starting water availability run (data: {})", config.data_dir.display()),
    );
    let mut summary = RunSummary::default();

    // Load and combine
    let load = load_all_stations(config);
    summary.stations_loaded = load.loaded.len();
    summary.stations_skipped = load.skipped.len();

    let daily = combine_stations(&load.series())?.to_daily_frequency();
    summary.days = daily.len();
    logging::info(
        Stage::Aggregator,
        None,
        &format!("Combined table: {} days x {} columns", daily.len(), daily.column_count()),
    );

    fs::create_dir_all(&config.output_dir).map_err(|e| WaterError::io(&config.output_dir, e))?;
    let processed_path = config.output_path(PROCESSED_DATA_FILE);
    daily.write_csv(&processed_path)?;
    logging::info(
        Stage::Aggregator,
        None,
        &format!("Processed data saved to {}", processed_path.display()),
    );
    summary.outputs.push(processed_path);

    // Features and index
    let features = engineer_features(&daily, config)?;
    let mut table = features.table;

    let components = build_index(
        &mut table,
        &config.features.index_components,
        config.water_requirement_per_day,
    )?;
    match &components {
        Some(c) => {
            for missing in &c.missing {
                logging::warn(
                    Stage::Index,
                    None,
                    &format!("{} not available for the water availability index", missing),
                );
            }
            logging::info(
                Stage::Index,
                None,
                &format!("Calculated water availability index from {}", c.used.join(", ")),
            );
            summary.index_components = c.used.clone();
        }
        None => logging::error(
            Stage::Index,
            None,
            "Unable to calculate water availability index: no components available",
        ),
    }

    // Forecasting
    let mut segment = None;
    let mut decomposition: Step<Decomposition> = Step::Skipped("index unavailable".to_string());
    let mut lstm: Step<LstmOutcome> = Step::Skipped("index unavailable".to_string());
    let mut additive: Step<Vec<ForecastPoint>> = Step::Skipped("index unavailable".to_string());
    let mut scenarios: Vec<Scenario> = Vec::new();

    if let Some(index) = table.column(AG_WATER_INDEX).map(|c| c.to_vec()) {
        let gaps = handle_gaps(table.days(), &index);
        logging::info(
            Stage::Gaps,
            None,
            &format!(
                "Index has {} missing days ({} left unfilled)",
                gaps.missing_count, gaps.unfilled_count
            ),
        );

        match &gaps.segment {
            Some(seg) => {
                summary.segment_days = seg.len();
                segment = Some((seg.start, seg.end, seg.len()));
                logging::info(
                    Stage::Gaps,
                    None,
                    &format!("Longest contiguous segment: {} to {} ({} days)", seg.start, seg.end, seg.len()),
                );

                decomposition = run_decomposition(seg, config);
                lstm = run_lstm_step(&seg.values, config)?;
            }
            None => {
                decomposition = Step::Skipped("index has no present values".to_string());
                lstm = Step::Skipped("index has no present values".to_string());
            }
        }

        additive = run_additive(table.days(), &index, config);
        if let Step::Ran(forecast) = &additive {
            scenarios = build_scenarios(forecast, &config.scenarios);
            let scenario_path = config.output_path(SCENARIOS_FILE);
            scenarios_table(&scenarios)?.write_csv(&scenario_path)?;
            logging::info(
                Stage::Forecast,
                None,
                &format!("Scenario forecasts saved to {}", scenario_path.display()),
            );
            summary.outputs.push(scenario_path);
        }
    }

    summary.decomposition_ran = decomposition.ran().is_some();
    summary.lstm_ran = lstm.ran().is_some();
    summary.additive_ran = additive.ran().is_some();
    summary.scenarios = scenarios.iter().map(|s| s.name.clone()).collect();
    if summary.lstm_ran {
        summary.outputs.push(config.output_path(&config.lstm.checkpoint_file));
    }

    // Statistics and report
    let summaries: Vec<ColumnSummary> = table
        .column_names()
        .filter_map(|name| table.column(name).and_then(|values| describe(name, values)))
        .collect();
    let correlation_columns: Vec<(&str, &[Option<f64>])> = config
        .features
        .correlation_columns
        .iter()
        .filter_map(|name| table.column(name).map(|values| (name.as_str(), values)))
        .collect();
    let correlation = correlation_matrix(&correlation_columns);

    let stations: Vec<StationRow> = load
        .loaded
        .iter()
        .map(|(category, loaded)| StationRow {
            station_id: loaded.series.station_id.clone(),
            category: *category,
            days: loaded.series.len(),
            first_day: loaded.series.first_day(),
            last_day: loaded.series.last_day(),
        })
        .collect();

    let inputs = ReportInputs {
        stations,
        skipped_stations: &load.skipped,
        skipped_features: &features.skipped,
        day_range: day_range(&table),
        index_components: &summary.index_components,
        water_requirement_per_day: config.water_requirement_per_day,
        summaries: &summaries,
        segment,
        decomposition: &decomposition,
        lstm: &lstm,
        additive: &additive,
        scenarios: &scenarios,
        scenario_cutoff: config.scenarios.cutoff,
        correlation: Some(&correlation),
    };
    let report_path = config.output_path(REPORT_FILE);
    build_report(&inputs).write_to(&report_path)?;
    logging::info(
        Stage::Report,
        None,
        &format!("Report written to {}", report_path.display()),
    );
    summary.outputs.push(report_path);

    Ok(summary)
}

fn day_range(table: &CombinedTable) -> Option<(NaiveDate, NaiveDate)> {
    Some((*table.days().first()?, *table.days().last()?))
}

fn run_decomposition(seg: &ContiguousSegment, config: &RunConfig) -> Step<Decomposition> {
    let period = config.decomposition.period_days;
    let periods = config.decomposition.min_periods;
    if !seg.covers_periods(period, periods) {
        let reason = format!(
            "contiguous segment has {} days, {} needed for {} full periods",
            seg.len(),
            period * periods,
            periods
        );
        logging::warn(Stage::Forecast, None, &format!("Seasonal decomposition skipped: {}", reason));
        return Step::Skipped(reason);
    }
    let values = &seg.values;
    match seasonal_decompose(values, period) {
        Ok(d) => {
            logging::info(Stage::Forecast, None, &format!("Seasonal decomposition over {} days", values.len()));
            Step::Ran(d)
        }
        Err(e) => {
            logging::warn(Stage::Forecast, None, &format!("Seasonal decomposition skipped: {}", e));
            Step::Skipped(e.to_string())
        }
    }
}

/// Trains the LSTM and writes its checkpoint. Only the checkpoint write is fatal.
fn run_lstm_step(values: &[f64], config: &RunConfig) -> Result<Step<LstmOutcome>> {
    let outcome = match run_lstm(values, &config.lstm) {
        Ok(outcome) => outcome,
        Err(e) => {
            logging::warn(Stage::Forecast, None, &format!("LSTM skipped: {}", e));
            return Ok(Step::Skipped(e.to_string()));
        }
    };

    let path = config.output_path(&config.lstm.checkpoint_file);
    outcome.save_checkpoint(&path)?;
    logging::info(
        Stage::Forecast,
        None,
        &format!(
            "LSTM trained on {} samples (test RMSE {}); checkpoint saved to {}",
            outcome.train_samples,
            outcome
                .test_metrics
                .map(|m| format!("{:.4}", m.rmse))
                .unwrap_or_else(|| "n/a".to_string()),
            path.display()
        ),
    );
    Ok(Step::Ran(outcome))
}

fn run_additive(days: &[NaiveDate], index: &[Option<f64>], config: &RunConfig) -> Step<Vec<ForecastPoint>> {
    let history: Vec<(NaiveDate, f64)> = days
        .iter()
        .zip(index)
        .filter_map(|(day, value)| value.map(|v| (*day, v)))
        .collect();

    match AdditiveModel::fit(&history, &config.additive).and_then(|model| {
        let forecast = model.forecast()?;
        Ok((model.season_length(), forecast))
    }) {
        Ok((season_length, forecast)) => {
            logging::info(
                Stage::Forecast,
                None,
                &format!(
                    "Additive model fit on {} days ({}-day season), forecast through {}",
                    history.len(),
                    season_length,
                    forecast.last().map(|p| p.date.to_string()).unwrap_or_default()
                ),
            );
            Step::Ran(forecast)
        }
        Err(e) => {
            logging::warn(Stage::Forecast, None, &format!("Additive forecast skipped: {}", e));
            Step::Skipped(e.to_string())
        }
    }
}
