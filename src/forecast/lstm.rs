//! LSTM sequence regressor.
//!
//! Predicts the next value of a scalar series from the previous
//! `sequence_length` values. The network and its training loop come from
//! `rust_lstm`: each window is fed one value per timestep and trained
//! against the value that follows every step, so the last step's output is
//! the one-step-ahead prediction.
//!
//! This module owns the parts around the network: min-max scaling, the
//! seeded train/test split, accuracy in index units and a JSON checkpoint of
//! the run.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use ndarray::{arr2, Array2};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rust_lstm::loss::MSELoss;
use rust_lstm::models::lstm_network::LSTMNetwork;
use rust_lstm::optimizers::Adam;
use rust_lstm::training::{LSTMTrainer, TrainingConfig};
use serde::{Deserialize, Serialize};

use crate::config::LstmConfig;
use crate::forecast::{accuracy, create_sequences, AccuracyMetrics, MinMaxScaler};
use crate::model::{Result, WaterError};

/// Fewest training windows worth fitting.
pub const MIN_SAMPLES: usize = 10;

/// Per-step inputs and per-step targets for one window.
type Sequence = (Vec<Array2<f64>>, Vec<Array2<f64>>);

fn step_inputs(window: &[f64]) -> Vec<Array2<f64>> {
    window.iter().map(|v| arr2(&[[*v]])).collect()
}

/// Targets are the window shifted by one step; the final target is `next`.
fn to_sequence(window: &[f64], next: f64) -> Sequence {
    let targets = window
        .iter()
        .skip(1)
        .chain(std::iter::once(&next))
        .map(|v| arr2(&[[*v]]))
        .collect();
    (step_inputs(window), targets)
}

/// Seeded shuffle of `0..n`, returned as `(test, train)`.
///
/// The test share is `ceil(n * test_size)`, capped so at least one window is
/// left to train on.
pub fn split_indices(n: usize, test_size: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(&mut rng);
    let test_count = ((n as f64) * test_size).ceil() as usize;
    let test_count = test_count.min(n.saturating_sub(1));
    let train = indices.split_off(test_count);
    (indices, train)
}

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

/// Mean squared error on the scaled training and validation windows after fitting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingLoss {
    pub loss: f64,
    pub val_loss: Option<f64>,
}

pub struct LstmRegressor {
    config: LstmConfig,
    trainer: LSTMTrainer<MSELoss, Adam>,
}

impl LstmRegressor {
    pub fn new(config: &LstmConfig) -> Self {
        let network = LSTMNetwork::new(1, config.hidden_size, config.layers.max(1));

        let mut training = TrainingConfig::default();
        training.epochs = config.epochs;
        training.print_every = config.epochs.max(1);

        let trainer = LSTMTrainer::new(network, MSELoss, Adam::new(config.learning_rate))
            .with_config(training);
        Self {
            config: config.clone(),
            trainer,
        }
    }

    pub fn config(&self) -> &LstmConfig {
        &self.config
    }

    /// Trains on `(x, y)` windows. The trailing `validation_split` share of
    /// the windows is held out as validation data.
    pub fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<TrainingLoss> {
        if x.len() != y.len() {
            return Err(WaterError::InvalidParameter(format!(
                "{} windows but {} targets",
                x.len(),
                y.len()
            )));
        }
        if x.is_empty() {
            return Err(WaterError::InsufficientData { needed: 1, got: 0 });
        }

        let val_count = ((x.len() as f64) * self.config.validation_split).floor() as usize;
        let split = x.len() - val_count.min(x.len() - 1);

        let sequences: Vec<Sequence> = x
            .iter()
            .zip(y)
            .map(|(window, next)| to_sequence(window, *next))
            .collect();
        let (train, validation) = sequences.split_at(split);
        self.trainer
            .train(train, if validation.is_empty() { None } else { Some(validation) });

        let loss = self.mse(&x[..split], &y[..split]);
        let val_loss = (split < x.len()).then(|| self.mse(&x[split..], &y[split..]));
        Ok(TrainingLoss { loss, val_loss })
    }

    /// Predicts one value per input window.
    pub fn predict(&mut self, windows: &[Vec<f64>]) -> Vec<f64> {
        windows
            .iter()
            .map(|window| {
                self.trainer
                    .predict(&step_inputs(window))
                    .last()
                    .map(|output| output[[0, 0]])
                    .unwrap_or(f64::NAN)
            })
            .collect()
    }

    fn mse(&mut self, x: &[Vec<f64>], y: &[f64]) -> f64 {
        if x.is_empty() {
            return 0.0;
        }
        self.predict(x)
            .iter()
            .zip(y)
            .map(|(p, t)| (p - t).powi(2))
            .sum::<f64>()
            / x.len() as f64
    }
}

// ---------------------------------------------------------------------------
// End-to-end run on an index series
// ---------------------------------------------------------------------------

/// Everything the pipeline and the report need from one LSTM run.
pub struct LstmOutcome {
    pub model: LstmRegressor,
    pub scaler: MinMaxScaler,
    pub loss: TrainingLoss,
    pub train_samples: usize,
    pub test_samples: usize,
    /// Accuracy in original index units.
    pub train_metrics: AccuracyMetrics,
    pub test_metrics: Option<AccuracyMetrics>,
    /// Final scaled window of the series.
    pub last_window: Vec<f64>,
    /// One-step-ahead prediction from `last_window`.
    pub next_value: f64,
}

/// Scales `series`, builds windows, shuffle-splits train/test with the
/// configured seed, trains and evaluates.
pub fn run_lstm(series: &[f64], config: &LstmConfig) -> Result<LstmOutcome> {
    let (x_all, _) = create_sequences(series, config.sequence_length);
    if x_all.len() < MIN_SAMPLES {
        return Err(WaterError::InsufficientData {
            needed: config.sequence_length + MIN_SAMPLES,
            got: series.len(),
        });
    }

    let scaler = MinMaxScaler::fit(series)?;
    let scaled: Vec<f64> = series.iter().map(|v| scaler.transform(*v)).collect();
    let (x, y) = create_sequences(&scaled, config.sequence_length);

    let (test_idx, train_idx) = split_indices(x.len(), config.test_size, config.seed);
    let pick = |idx: &[usize]| -> (Vec<Vec<f64>>, Vec<f64>) {
        idx.iter().map(|&i| (x[i].clone(), y[i])).unzip()
    };
    let (train_x, train_y) = pick(&train_idx);
    let (test_x, test_y) = pick(&test_idx);

    let mut model = LstmRegressor::new(config);
    let loss = model.fit(&train_x, &train_y)?;

    let unscale = |values: &[f64]| -> Vec<f64> { values.iter().map(|v| scaler.inverse(*v)).collect() };
    let train_metrics = accuracy(&unscale(&train_y), &unscale(&model.predict(&train_x)))?;
    let test_metrics = if test_x.is_empty() {
        None
    } else {
        Some(accuracy(&unscale(&test_y), &unscale(&model.predict(&test_x)))?)
    };

    let last_window = scaled[scaled.len() - config.sequence_length..].to_vec();
    let next_value = scaler.inverse(model.predict(std::slice::from_ref(&last_window))[0]);

    Ok(LstmOutcome {
        model,
        scaler,
        loss,
        train_samples: train_x.len(),
        test_samples: test_x.len(),
        train_metrics,
        test_metrics,
        last_window,
        next_value,
    })
}

// ---------------------------------------------------------------------------
// Checkpoints
// ---------------------------------------------------------------------------

/// What a finished run leaves on disk: the settings, the scaler needed to
/// map new windows into model space, and the run's results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LstmCheckpoint {
    pub config: LstmConfig,
    pub scaler: MinMaxScaler,
    pub loss: TrainingLoss,
    pub train_samples: usize,
    pub test_samples: usize,
    pub train_metrics: AccuracyMetrics,
    pub test_metrics: Option<AccuracyMetrics>,
    pub last_window: Vec<f64>,
    pub next_value: f64,
}

impl LstmCheckpoint {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| WaterError::io(path, e))?;
        serde_json::from_reader(BufReader::new(file))
            .map_err(|e| WaterError::Checkpoint(e.to_string()))
    }
}

impl LstmOutcome {
    pub fn checkpoint(&self) -> LstmCheckpoint {
        LstmCheckpoint {
            config: self.model.config().clone(),
            scaler: self.scaler,
            loss: self.loss,
            train_samples: self.train_samples,
            test_samples: self.test_samples,
            train_metrics: self.train_metrics,
            test_metrics: self.test_metrics,
            last_window: self.last_window.clone(),
            next_value: self.next_value,
        }
    }

    pub fn save_checkpoint(&self, path: &Path) -> Result<()> {
        let file = File::create(path).map_err(|e| WaterError::io(path, e))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &self.checkpoint())
            .map_err(|e| WaterError::Checkpoint(e.to_string()))?;
        writer.flush().map_err(|e| WaterError::io(path, e))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> LstmConfig {
        LstmConfig {
            sequence_length: 5,
            hidden_size: 6,
            layers: 1,
            epochs: 5,
            learning_rate: 0.01,
            validation_split: 0.1,
            test_size: 0.2,
            seed: 7,
            checkpoint_file: "lstm.json".to_string(),
        }
    }

    fn wave(n: usize) -> Vec<f64> {
        (0..n).map(|i| (i as f64 * 0.3).sin()).collect()
    }

    #[test]
    fn test_sequence_targets_are_shifted_inputs() {
        let (inputs, targets) = to_sequence(&[0.1, 0.2, 0.3], 0.4);
        assert_eq!(inputs.len(), 3);
        assert_eq!(targets.len(), 3);
        assert_eq!(inputs[0].shape(), &[1, 1]);
        assert_eq!(inputs[2][[0, 0]], 0.3);
        assert_eq!(targets[0][[0, 0]], 0.2);
        assert_eq!(targets[2][[0, 0]], 0.4);
    }

    #[test]
    fn test_split_is_seeded_and_disjoint() {
        let (test_a, train_a) = split_indices(100, 0.2, 42);
        let (test_b, train_b) = split_indices(100, 0.2, 42);
        assert_eq!(test_a, test_b);
        assert_eq!(train_a, train_b);
        assert_eq!(test_a.len(), 20);
        assert_eq!(train_a.len(), 80);

        let mut all: Vec<usize> = test_a.iter().chain(&train_a).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..100).collect::<Vec<_>>());

        let (test_c, _) = split_indices(100, 0.2, 43);
        assert_ne!(test_a, test_c);
    }

    #[test]
    fn test_split_keeps_one_training_window() {
        let (test, train) = split_indices(3, 0.99, 1);
        assert_eq!(test.len(), 2);
        assert_eq!(train.len(), 1);
    }

    #[test]
    fn test_run_reports_split_sizes_and_finite_results() {
        let outcome = run_lstm(&wave(105), &small_config()).unwrap();
        // 100 windows, 20% held out
        assert_eq!(outcome.test_samples, 20);
        assert_eq!(outcome.train_samples, 80);
        assert!(outcome.next_value.is_finite());
        assert!(outcome.loss.loss.is_finite());
        assert!(outcome.loss.val_loss.is_some());
        assert!(outcome.train_metrics.rmse.is_finite());
        assert!(outcome.test_metrics.is_some());
        assert_eq!(outcome.last_window.len(), 5);
    }

    #[test]
    fn test_too_short_series_is_insufficient() {
        let result = run_lstm(&wave(8), &small_config());
        assert!(matches!(result, Err(WaterError::InsufficientData { .. })));
    }

    #[test]
    fn test_fit_rejects_mismatched_targets() {
        let mut model = LstmRegressor::new(&small_config());
        let result = model.fit(&[vec![0.0; 5], vec![0.1; 5]], &[0.2]);
        assert!(matches!(result, Err(WaterError::InvalidParameter(_))));
    }

    #[test]
    fn test_checkpoint_round_trip() {
        let outcome = run_lstm(&wave(60), &small_config()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lstm.json");

        outcome.save_checkpoint(&path).unwrap();
        let checkpoint = LstmCheckpoint::load(&path).unwrap();

        assert_eq!(checkpoint.config.sequence_length, 5);
        assert_eq!(checkpoint.config.checkpoint_file, "lstm.json");
        assert!((checkpoint.scaler.min - outcome.scaler.min).abs() < 1e-12);
        assert!((checkpoint.scaler.max - outcome.scaler.max).abs() < 1e-12);
        assert!((checkpoint.next_value - outcome.next_value).abs() < 1e-9);
        assert_eq!(checkpoint.train_samples, outcome.train_samples);
    }

    #[test]
    fn test_corrupt_checkpoint_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lstm.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            LstmCheckpoint::load(&path),
            Err(WaterError::Checkpoint(_))
        ));
    }
}
