//! Markdown water availability report.
//!
//! Sections are rendered from whatever the pipeline produced. A step that
//! was skipped still gets its section, with the reason in place of results.

use std::fs;
use std::path::Path;

use chrono::NaiveDate;

use crate::analysis::stats::{ColumnSummary, CorrelationMatrix};
use crate::analysis::index::sustainable_farming_days;
use crate::forecast::decompose::Decomposition;
use crate::forecast::lstm::LstmOutcome;
use crate::forecast::scenario::Scenario;
use crate::forecast::ForecastPoint;
use crate::model::{Result, StationCategory, WaterError};

pub const REPORT_FILE: &str = "water_availability_report.md";

/// How many trailing forecast days the additive section lists.
const FORECAST_TAIL_DAYS: usize = 30;

// ---------------------------------------------------------------------------
// Markdown builder
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MarkdownDocument {
    body: String,
}

impl MarkdownDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn heading(&mut self, level: usize, text: &str) -> &mut Self {
        self.body.push_str(&format!("{} {}\n\n", "#".repeat(level.clamp(1, 6)), text));
        self
    }

    pub fn paragraph(&mut self, text: &str) -> &mut Self {
        self.body.push_str(text);
        self.body.push_str("\n\n");
        self
    }

    pub fn bullets<S: AsRef<str>>(&mut self, items: &[S]) -> &mut Self {
        for item in items {
            self.body.push_str(&format!("- {}\n", item.as_ref()));
        }
        self.body.push('\n');
        self
    }

    pub fn table<S: AsRef<str>>(&mut self, headers: &[&str], rows: &[Vec<S>]) -> &mut Self {
        self.body.push_str(&format!("| {} |\n", headers.join(" | ")));
        self.body
            .push_str(&format!("|{}\n", headers.iter().map(|_| "---|").collect::<String>()));
        for row in rows {
            let cells: Vec<&str> = row.iter().map(|c| c.as_ref()).collect();
            self.body.push_str(&format!("| {} |\n", cells.join(" | ")));
        }
        self.body.push('\n');
        self
    }

    pub fn as_str(&self) -> &str {
        &self.body
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        fs::write(path, &self.body).map_err(|e| WaterError::io(path, e))
    }
}

fn num(value: f64) -> String {
    format!("{:.4}", value)
}

fn opt_num(value: Option<f64>) -> String {
    value.map(num).unwrap_or_else(|| "n/a".to_string())
}

fn opt_day(day: Option<NaiveDate>) -> String {
    day.map(|d| d.to_string()).unwrap_or_else(|| "n/a".to_string())
}

// ---------------------------------------------------------------------------
// Report inputs
// ---------------------------------------------------------------------------

/// Result of an optional pipeline step.
#[derive(Debug, Clone)]
pub enum Step<T> {
    Ran(T),
    Skipped(String),
}

impl<T> Step<T> {
    pub fn ran(&self) -> Option<&T> {
        match self {
            Step::Ran(value) => Some(value),
            Step::Skipped(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StationRow {
    pub station_id: String,
    pub category: StationCategory,
    pub days: usize,
    pub first_day: Option<NaiveDate>,
    pub last_day: Option<NaiveDate>,
}

/// Everything the report renders.
pub struct ReportInputs<'a> {
    pub stations: Vec<StationRow>,
    pub skipped_stations: &'a [(String, String)],
    pub skipped_features: &'a [String],
    pub day_range: Option<(NaiveDate, NaiveDate)>,
    pub index_components: &'a [String],
    pub water_requirement_per_day: f64,
    pub summaries: &'a [ColumnSummary],
    pub segment: Option<(NaiveDate, NaiveDate, usize)>,
    pub decomposition: &'a Step<Decomposition>,
    pub lstm: &'a Step<LstmOutcome>,
    pub additive: &'a Step<Vec<ForecastPoint>>,
    pub scenarios: &'a [Scenario],
    pub scenario_cutoff: NaiveDate,
    pub correlation: Option<&'a CorrelationMatrix>,
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

pub fn build_report(inputs: &ReportInputs) -> MarkdownDocument {
    let mut doc = MarkdownDocument::new();
    doc.heading(1, "Central Valley Agricultural Water Availability Report");

    introduction(&mut doc, inputs);
    data_description(&mut doc, inputs);
    summary_statistics(&mut doc, inputs);
    decomposition_section(&mut doc, inputs);
    lstm_section(&mut doc, inputs);
    additive_section(&mut doc, inputs);
    scenario_section(&mut doc, inputs);
    correlation_section(&mut doc, inputs);

    doc
}

fn introduction(doc: &mut MarkdownDocument, inputs: &ReportInputs) {
    doc.heading(2, "Introduction");
    doc.paragraph(
        "This report combines river stage, flow, groundwater, snow and precipitation \
         station records into a single agricultural water availability index, then \
         forecasts that index with an LSTM regressor and an additive trend and \
         seasonality model.",
    );
    if inputs.index_components.is_empty() {
        doc.paragraph("No index component was available, so the index was not built.");
    } else {
        doc.paragraph(&format!(
            "The index is the row-wise mean of the z-scored columns {}. Sustainable \
             farming days are the index divided by a daily requirement of {}, floored at zero.",
            inputs
                .index_components
                .iter()
                .map(|c| format!("`{}`", c))
                .collect::<Vec<_>>()
                .join(", "),
            inputs.water_requirement_per_day
        ));
    }
}

fn data_description(doc: &mut MarkdownDocument, inputs: &ReportInputs) {
    doc.heading(2, "Data Description");
    match inputs.day_range {
        Some((first, last)) => doc.paragraph(&format!(
            "{} stations loaded, covering {} to {}.",
            inputs.stations.len(),
            first,
            last
        )),
        None => doc.paragraph("No station data was loaded."),
    };

    if !inputs.stations.is_empty() {
        let rows: Vec<Vec<String>> = inputs
            .stations
            .iter()
            .map(|s| {
                vec![
                    s.station_id.clone(),
                    s.category.to_string(),
                    s.days.to_string(),
                    opt_day(s.first_day),
                    opt_day(s.last_day),
                ]
            })
            .collect();
        doc.table(&["Station", "Category", "Days", "First", "Last"], &rows);
    }

    if !inputs.skipped_stations.is_empty() {
        doc.heading(3, "Skipped stations");
        let items: Vec<String> = inputs
            .skipped_stations
            .iter()
            .map(|(id, reason)| format!("{}: {}", id, reason))
            .collect();
        doc.bullets(&items);
    }

    if !inputs.skipped_features.is_empty() {
        doc.heading(3, "Features not built");
        doc.bullets(inputs.skipped_features);
    }
}

fn summary_statistics(doc: &mut MarkdownDocument, inputs: &ReportInputs) {
    doc.heading(2, "Summary Statistics");
    if inputs.summaries.is_empty() {
        doc.paragraph("No columns to summarize.");
        return;
    }
    let rows: Vec<Vec<String>> = inputs
        .summaries
        .iter()
        .map(|s| {
            vec![
                s.name.clone(),
                s.count.to_string(),
                num(s.mean),
                num(s.std),
                num(s.min),
                num(s.q25),
                num(s.median),
                num(s.q75),
                num(s.max),
            ]
        })
        .collect();
    doc.table(
        &["Column", "Count", "Mean", "Std", "Min", "25%", "50%", "75%", "Max"],
        &rows,
    );
}

fn decomposition_section(doc: &mut MarkdownDocument, inputs: &ReportInputs) {
    doc.heading(2, "Seasonal Decomposition");
    if let Some((start, end, len)) = inputs.segment {
        doc.paragraph(&format!(
            "Longest contiguous index segment: {} to {} ({} days).",
            start, end, len
        ));
    }
    match inputs.decomposition {
        Step::Ran(d) => {
            doc.bullets(&[
                format!("Period: {} days", d.period),
                format!("Seasonal strength: {}", num(d.seasonal_strength)),
                format!("Trend strength: {}", num(d.trend_strength)),
                format!("Seasonal amplitude: {}", num(d.seasonal_amplitude())),
                format!("Trend change over segment: {}", opt_num(d.trend_change())),
                format!("Residual std: {}", opt_num(d.resid_std())),
            ]);
        }
        Step::Skipped(reason) => {
            doc.paragraph(&format!("Skipped: {}.", reason));
        }
    }
}

fn lstm_section(doc: &mut MarkdownDocument, inputs: &ReportInputs) {
    doc.heading(2, "LSTM Model");
    let outcome = match inputs.lstm {
        Step::Ran(outcome) => outcome,
        Step::Skipped(reason) => {
            doc.paragraph(&format!("Skipped: {}.", reason));
            return;
        }
    };

    let config = outcome.model.config();
    doc.paragraph(&format!(
        "{} LSTM layers of {} units over {}-day windows, trained for {} epochs \
         on {} samples and tested on {}.",
        config.layers,
        config.hidden_size,
        config.sequence_length,
        config.epochs,
        outcome.train_samples,
        outcome.test_samples
    ));

    let mut rows = vec![vec![
        "train".to_string(),
        num(outcome.train_metrics.rmse),
        num(outcome.train_metrics.mae),
    ]];
    if let Some(test) = &outcome.test_metrics {
        rows.push(vec!["test".to_string(), num(test.rmse), num(test.mae)]);
    }
    doc.table(&["Set", "RMSE", "MAE"], &rows);

    let loss = &outcome.loss;
    doc.paragraph(&format!(
        "Final scaled MSE: {} (validation {}).",
        num(loss.loss),
        opt_num(loss.val_loss)
    ));

    doc.paragraph(&format!("Next-day index prediction: {}", num(outcome.next_value)));
}

fn additive_section(doc: &mut MarkdownDocument, inputs: &ReportInputs) {
    doc.heading(2, "Additive Forecast");
    let forecast = match inputs.additive {
        Step::Ran(points) => points,
        Step::Skipped(reason) => {
            doc.paragraph(&format!("Skipped: {}.", reason));
            return;
        }
    };
    doc.paragraph(&format!("Last {} forecast days:", FORECAST_TAIL_DAYS.min(forecast.len())));
    let rows: Vec<Vec<String>> = forecast
        .iter()
        .skip(forecast.len().saturating_sub(FORECAST_TAIL_DAYS))
        .map(|p| vec![p.date.to_string(), num(p.yhat), num(p.yhat_lower), num(p.yhat_upper)])
        .collect();
    doc.table(&["Date", "Forecast", "Lower", "Upper"], &rows);
}

fn scenario_section(doc: &mut MarkdownDocument, inputs: &ReportInputs) {
    doc.heading(2, "Water Availability Scenarios");
    if inputs.scenarios.is_empty() {
        doc.paragraph("No forecast was available to build scenarios from.");
        return;
    }
    doc.paragraph(&format!(
        "Each scenario scales the additive point forecast from {} onward by its factor; \
         the uncertainty bounds are kept as forecast.",
        inputs.scenario_cutoff
    ));

    let rows: Vec<Vec<String>> = inputs
        .scenarios
        .iter()
        .map(|s| {
            let after: Vec<f64> = s
                .points
                .iter()
                .filter(|p| p.date >= inputs.scenario_cutoff)
                .map(|p| p.yhat)
                .collect();
            let mean_index = if after.is_empty() {
                None
            } else {
                Some(after.iter().sum::<f64>() / after.len() as f64)
            };
            let mean_days = mean_index
                .map(|m| sustainable_farming_days(m, inputs.water_requirement_per_day));
            vec![
                s.name.clone(),
                format!("{}", s.factor),
                after.len().to_string(),
                opt_num(mean_index),
                opt_num(mean_days),
            ]
        })
        .collect();
    doc.table(
        &["Scenario", "Factor", "Days after cutoff", "Mean index", "Farming days at mean"],
        &rows,
    );
}

fn correlation_section(doc: &mut MarkdownDocument, inputs: &ReportInputs) {
    doc.heading(2, "Correlation Matrix");
    let matrix = match inputs.correlation {
        Some(m) if !m.columns.is_empty() => m,
        _ => {
            doc.paragraph("None of the correlation columns were available.");
            return;
        }
    };

    let mut headers = vec![""];
    headers.extend(matrix.columns.iter().map(String::as_str));
    let rows: Vec<Vec<String>> = matrix
        .columns
        .iter()
        .enumerate()
        .map(|(r, name)| {
            let mut row = vec![name.clone()];
            row.extend((0..matrix.columns.len()).map(|c| opt_num(matrix.get(r, c))));
            row
        })
        .collect();
    doc.table(&headers, &rows);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markdown_table_layout() {
        let mut doc = MarkdownDocument::new();
        doc.table(&["a", "b"], &[vec!["1", "2"]]);
        assert_eq!(doc.as_str(), "| a | b |\n|---|---|\n| 1 | 2 |\n\n");
    }

    #[test]
    fn test_skipped_steps_are_reported_not_fatal() {
        let skipped_stations = vec![("SUT".to_string(), "file not found".to_string())];
        let decomposition = Step::Skipped("segment shorter than 730 days".to_string());
        let lstm = Step::Skipped("index unavailable".to_string());
        let additive = Step::Skipped("index unavailable".to_string());
        let inputs = ReportInputs {
            stations: Vec::new(),
            skipped_stations: &skipped_stations,
            skipped_features: &[],
            day_range: None,
            index_components: &[],
            water_requirement_per_day: 0.1,
            summaries: &[],
            segment: None,
            decomposition: &decomposition,
            lstm: &lstm,
            additive: &additive,
            scenarios: &[],
            scenario_cutoff: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            correlation: None,
        };

        let text = build_report(&inputs).as_str().to_string();
        for section in [
            "## Introduction",
            "## Data Description",
            "## Summary Statistics",
            "## Seasonal Decomposition",
            "## LSTM Model",
            "## Additive Forecast",
            "## Water Availability Scenarios",
            "## Correlation Matrix",
        ] {
            assert!(text.contains(section), "missing section {}", section);
        }
        assert!(text.contains("SUT: file not found"));
        assert!(text.contains("Skipped: segment shorter than 730 days."));
    }

    #[test]
    fn test_scenario_rows_use_post_cutoff_points() {
        let cutoff = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let point = |date: NaiveDate, yhat: f64| ForecastPoint {
            date,
            yhat,
            yhat_lower: yhat,
            yhat_upper: yhat,
        };
        let scenarios = vec![Scenario {
            name: "dry".to_string(),
            factor: 0.8,
            points: vec![
                point(NaiveDate::from_ymd_opt(2023, 12, 31).unwrap(), 9.0),
                point(cutoff, 0.5),
                point(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(), 1.5),
            ],
        }];
        let decomposition = Step::Skipped(String::new());
        let lstm = Step::Skipped(String::new());
        let additive = Step::Skipped(String::new());
        let inputs = ReportInputs {
            stations: Vec::new(),
            skipped_stations: &[],
            skipped_features: &[],
            day_range: None,
            index_components: &[],
            water_requirement_per_day: 0.1,
            summaries: &[],
            segment: None,
            decomposition: &decomposition,
            lstm: &lstm,
            additive: &additive,
            scenarios: &scenarios,
            scenario_cutoff: cutoff,
            correlation: None,
        };

        let text = build_report(&inputs).as_str().to_string();
        assert!(text.contains("| dry | 0.8 | 2 | 1.0000 | 10.0000 |"), "{}", text);
    }
}
