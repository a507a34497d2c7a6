//! Forecast model families.
//!
//! Every family shares one shape: a fixed, seeded encoder turns a window of
//! scaled feature rows into a feature vector, and a linear readout trained by
//! mini-batch Adam maps it to the scaled next-step target. Families differ
//! only in the encoder:
//!
//! - **Recurrent**: a contractive Elman reservoir; encoding is the final
//!   hidden state plus the last input row
//! - **Dense**: the last few rows flattened plus per-feature window means
//! - **Attention**: dot-product attention of every row against the last row;
//!   encoding is the attended context plus the last row
//!
//! Training keeps the weights with the lowest validation loss and stops
//! after `patience` epochs without improvement.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use super::dataset::SequenceDataset;
use crate::error::{PipelineError, PipelineResult};
use borsa_common::config::TrainingConfig;

// ============================================================================
// Model Family
// ============================================================================

/// Ensemble member kind, in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    Recurrent,
    Dense,
    Attention,
}

impl ModelFamily {
    pub const ALL: [ModelFamily; 3] = [Self::Recurrent, Self::Dense, Self::Attention];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Recurrent => "recurrent",
            Self::Dense => "dense",
            Self::Attention => "attention",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == s)
    }

    fn seed_offset(&self) -> u64 {
        match self {
            Self::Recurrent => 0x9E37_79B9,
            Self::Dense => 0x7F4A_7C15,
            Self::Attention => 0x94D0_49BB,
        }
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Training Parameters & Metrics
// ============================================================================

/// Gradient descent settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingParams {
    pub max_epochs: usize,
    pub patience: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub seed: u64,
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self::from(&TrainingConfig::default())
    }
}

impl From<&TrainingConfig> for TrainingParams {
    fn from(config: &TrainingConfig) -> Self {
        Self {
            max_epochs: config.max_epochs,
            patience: config.patience,
            batch_size: config.batch_size,
            learning_rate: config.learning_rate,
            seed: config.seed,
        }
    }
}

/// Fit quality on the test split, in scaled space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub mse: f64,
    pub mae: f64,
    /// Share of test examples where prediction and actual have the same sign
    pub directional_accuracy: f64,
    pub epochs_run: usize,
}

fn sign(v: f64) -> i8 {
    if v > 0.0 {
        1
    } else if v < 0.0 {
        -1
    } else {
        0
    }
}

impl ModelMetrics {
    pub fn evaluate(predicted: &[f64], actual: &[f64], epochs_run: usize) -> Self {
        let n = predicted.len().max(1) as f64;
        let mut se = 0.0;
        let mut ae = 0.0;
        let mut same = 0usize;
        for (p, a) in predicted.iter().zip(actual) {
            se += (p - a).powi(2);
            ae += (p - a).abs();
            if sign(*p) == sign(*a) {
                same += 1;
            }
        }
        Self {
            mse: se / n,
            mae: ae / n,
            directional_accuracy: same as f64 / n,
            epochs_run,
        }
    }
}

// ============================================================================
// Traits
// ============================================================================

/// A trained ensemble member.
pub trait FittedForecaster: Send + Sync {
    fn family(&self) -> ModelFamily;

    /// Scaled next-step prediction for one window.
    fn predict(&self, window: &[Vec<f64>]) -> PipelineResult<f64>;
}

/// An untrained ensemble member.
pub trait Forecaster: Send + Sync {
    fn family(&self) -> ModelFamily;

    /// Train on the dataset's train split and score on its test split.
    fn train(
        &self,
        data: &SequenceDataset,
        params: &TrainingParams,
    ) -> PipelineResult<(Box<dyn FittedForecaster>, ModelMetrics)>;
}

// ============================================================================
// Encoders
// ============================================================================

trait Encoder: Send + Sync {
    fn dim(&self) -> usize;
    fn encode(&self, window: &[Vec<f64>]) -> Vec<f64>;
}

/// Fixed random recurrent network with row sums kept below one.
struct ReservoirEncoder {
    w_in: Vec<Vec<f64>>,
    w_h: Vec<Vec<f64>>,
    bias: Vec<f64>,
    n_features: usize,
}

const RESERVOIR_ROW_NORM: f64 = 0.9;

impl ReservoirEncoder {
    fn new(hidden: usize, n_features: usize, rng: &mut StdRng) -> Self {
        let w_in = (0..hidden)
            .map(|_| (0..n_features).map(|_| rng.gen_range(-0.5..0.5)).collect())
            .collect();
        let w_h = (0..hidden)
            .map(|_| {
                let mut row: Vec<f64> = (0..hidden).map(|_| rng.gen_range(-0.5..0.5)).collect();
                let norm: f64 = row.iter().map(|w: &f64| w.abs()).sum();
                if norm > RESERVOIR_ROW_NORM {
                    row.iter_mut().for_each(|w| *w *= RESERVOIR_ROW_NORM / norm);
                }
                row
            })
            .collect();
        let bias = (0..hidden).map(|_| rng.gen_range(-0.1..0.1)).collect();
        Self {
            w_in,
            w_h,
            bias,
            n_features,
        }
    }
}

impl Encoder for ReservoirEncoder {
    fn dim(&self) -> usize {
        self.bias.len() + self.n_features
    }

    fn encode(&self, window: &[Vec<f64>]) -> Vec<f64> {
        let hidden = self.bias.len();
        let mut h = vec![0.0; hidden];
        for x in window {
            h = (0..hidden)
                .map(|i| {
                    let input: f64 = self.w_in[i].iter().zip(x).map(|(w, v)| w * v).sum();
                    let recur: f64 = self.w_h[i].iter().zip(&h).map(|(w, v)| w * v).sum();
                    (input + recur + self.bias[i]).tanh()
                })
                .collect();
        }
        let mut out = h;
        if let Some(last) = window.last() {
            out.extend_from_slice(last);
        }
        out
    }
}

/// Recent lags plus window means.
struct LagEncoder {
    lags: usize,
    n_features: usize,
}

impl Encoder for LagEncoder {
    fn dim(&self) -> usize {
        (self.lags + 1) * self.n_features
    }

    fn encode(&self, window: &[Vec<f64>]) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.dim());
        for row in &window[window.len() - self.lags..] {
            out.extend_from_slice(row);
        }
        let len = window.len() as f64;
        for j in 0..self.n_features {
            out.push(window.iter().map(|r| r[j]).sum::<f64>() / len);
        }
        out
    }
}

/// Softmax attention against the final row.
struct AttentionEncoder {
    n_features: usize,
}

impl Encoder for AttentionEncoder {
    fn dim(&self) -> usize {
        2 * self.n_features
    }

    fn encode(&self, window: &[Vec<f64>]) -> Vec<f64> {
        let Some(query) = window.last() else {
            return vec![0.0; self.dim()];
        };
        let scale = (self.n_features as f64).sqrt().max(1.0);
        let scores: Vec<f64> = window
            .iter()
            .map(|row| row.iter().zip(query).map(|(a, b)| a * b).sum::<f64>() / scale)
            .collect();
        let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let exp: Vec<f64> = scores.iter().map(|s| (s - max).exp()).collect();
        let total: f64 = exp.iter().sum();

        let mut out = vec![0.0; self.n_features];
        for (row, e) in window.iter().zip(&exp) {
            let weight = e / total;
            for (o, v) in out.iter_mut().zip(row) {
                *o += weight * v;
            }
        }
        out.extend_from_slice(query);
        out
    }
}

// ============================================================================
// Readout
// ============================================================================

#[derive(Debug, Clone)]
struct Readout {
    w: Vec<f64>,
    b: f64,
}

impl Readout {
    fn predict(&self, z: &[f64]) -> f64 {
        self.w.iter().zip(z).map(|(w, v)| w * v).sum::<f64>() + self.b
    }

    fn mse(&self, zs: &[Vec<f64>], ys: &[f64]) -> f64 {
        let n = zs.len().max(1) as f64;
        zs.iter()
            .zip(ys)
            .map(|(z, y)| (self.predict(z) - y).powi(2))
            .sum::<f64>()
            / n
    }
}

struct Adam {
    m: Vec<f64>,
    v: Vec<f64>,
    t: i32,
    lr: f64,
}

impl Adam {
    const BETA1: f64 = 0.9;
    const BETA2: f64 = 0.999;
    const EPS: f64 = 1e-8;

    fn new(n_params: usize, lr: f64) -> Self {
        Self {
            m: vec![0.0; n_params],
            v: vec![0.0; n_params],
            t: 0,
            lr,
        }
    }

    /// Update `params` in place; the last gradient entry is the bias.
    fn step(&mut self, readout: &mut Readout, grad: &[f64]) {
        self.t += 1;
        let bc1 = 1.0 - Self::BETA1.powi(self.t);
        let bc2 = 1.0 - Self::BETA2.powi(self.t);
        let n = readout.w.len();
        for (i, g) in grad.iter().enumerate() {
            self.m[i] = Self::BETA1 * self.m[i] + (1.0 - Self::BETA1) * g;
            self.v[i] = Self::BETA2 * self.v[i] + (1.0 - Self::BETA2) * g * g;
            let delta = self.lr * (self.m[i] / bc1) / ((self.v[i] / bc2).sqrt() + Self::EPS);
            if i < n {
                readout.w[i] -= delta;
            } else {
                readout.b -= delta;
            }
        }
    }
}

// ============================================================================
// Shared Training
// ============================================================================

struct EncodedForecaster {
    family: ModelFamily,
    encoder: Box<dyn Encoder>,
    readout: Readout,
    sequence_length: usize,
    n_features: usize,
}

fn check_window(
    family: ModelFamily,
    window: &[Vec<f64>],
    sequence_length: usize,
    n_features: usize,
) -> PipelineResult<()> {
    if window.len() != sequence_length || window.iter().any(|r| r.len() != n_features) {
        return Err(PipelineError::ModelTraining {
            family: family.name().into(),
            reason: format!(
                "window shape mismatch: expected {}x{}, got {}x{}",
                sequence_length,
                n_features,
                window.len(),
                window.first().map_or(0, |r| r.len())
            ),
        });
    }
    Ok(())
}

impl FittedForecaster for EncodedForecaster {
    fn family(&self) -> ModelFamily {
        self.family
    }

    fn predict(&self, window: &[Vec<f64>]) -> PipelineResult<f64> {
        check_window(self.family, window, self.sequence_length, self.n_features)?;
        let value = self.readout.predict(&self.encoder.encode(window));
        if value.is_finite() {
            Ok(value)
        } else {
            Err(PipelineError::ModelTraining {
                family: self.family.name().into(),
                reason: "non-finite prediction".into(),
            })
        }
    }
}

fn training_error(family: ModelFamily, reason: impl Into<String>) -> PipelineError {
    PipelineError::ModelTraining {
        family: family.name().into(),
        reason: reason.into(),
    }
}

fn fit(
    family: ModelFamily,
    encoder: Box<dyn Encoder>,
    data: &SequenceDataset,
    params: &TrainingParams,
    rng: &mut StdRng,
) -> PipelineResult<(Box<dyn FittedForecaster>, ModelMetrics)> {
    let (l, f) = (data.sequence_length, data.n_features());
    if data.x_train.is_empty() || data.x_test.is_empty() {
        return Err(training_error(family, "empty train or test split"));
    }
    if data.x_train.len() != data.y_train.len() || data.x_test.len() != data.y_test.len() {
        return Err(training_error(family, "inputs and targets differ in length"));
    }
    for window in data.x_train.iter().chain(&data.x_test) {
        check_window(family, window, l, f)?;
    }

    let z_train: Vec<Vec<f64>> = data.x_train.iter().map(|w| encoder.encode(w)).collect();
    let z_test: Vec<Vec<f64>> = data.x_test.iter().map(|w| encoder.encode(w)).collect();
    if z_train.iter().chain(&z_test).flatten().any(|v| !v.is_finite()) {
        return Err(training_error(family, "non-finite input"));
    }

    let dim = encoder.dim();
    let mut readout = Readout {
        w: (0..dim).map(|_| rng.gen_range(-0.05..0.05)).collect(),
        b: 0.0,
    };
    let mut adam = Adam::new(dim + 1, params.learning_rate);
    let mut order: Vec<usize> = (0..z_train.len()).collect();
    let batch_size = params.batch_size.max(1);

    let mut best_loss = f64::INFINITY;
    let mut best = readout.clone();
    let mut since_best = 0usize;
    let mut epochs_run = 0usize;

    for epoch in 1..=params.max_epochs.max(1) {
        order.shuffle(rng);
        for batch in order.chunks(batch_size) {
            let mut grad = vec![0.0; dim + 1];
            let scale = 2.0 / batch.len() as f64;
            for &i in batch {
                let err = readout.predict(&z_train[i]) - data.y_train[i];
                for (g, z) in grad.iter_mut().zip(&z_train[i]) {
                    *g += scale * err * z;
                }
                grad[dim] += scale * err;
            }
            adam.step(&mut readout, &grad);
        }

        let val_loss = readout.mse(&z_test, &data.y_test);
        if !val_loss.is_finite() {
            return Err(training_error(family, format!("loss diverged at epoch {}", epoch)));
        }
        epochs_run = epoch;

        if val_loss < best_loss {
            best_loss = val_loss;
            best = readout.clone();
            since_best = 0;
        } else {
            since_best += 1;
            if since_best >= params.patience {
                break;
            }
        }
    }

    let readout = best;
    let predicted: Vec<f64> = z_test.iter().map(|z| readout.predict(z)).collect();
    let metrics = ModelMetrics::evaluate(&predicted, &data.y_test, epochs_run);

    debug!(
        family = family.name(),
        epochs_run,
        mse = metrics.mse,
        mae = metrics.mae,
        "Model trained"
    );

    Ok((
        Box::new(EncodedForecaster {
            family,
            encoder,
            readout,
            sequence_length: l,
            n_features: f,
        }),
        metrics,
    ))
}

fn family_rng(family: ModelFamily, params: &TrainingParams) -> StdRng {
    StdRng::seed_from_u64(params.seed ^ family.seed_offset())
}

// ============================================================================
// Families
// ============================================================================

/// Reservoir recurrent network.
#[derive(Debug, Clone)]
pub struct RecurrentForecaster {
    pub hidden_size: usize,
}

impl Default for RecurrentForecaster {
    fn default() -> Self {
        Self { hidden_size: 16 }
    }
}

impl Forecaster for RecurrentForecaster {
    fn family(&self) -> ModelFamily {
        ModelFamily::Recurrent
    }

    fn train(
        &self,
        data: &SequenceDataset,
        params: &TrainingParams,
    ) -> PipelineResult<(Box<dyn FittedForecaster>, ModelMetrics)> {
        let mut rng = family_rng(self.family(), params);
        let encoder = ReservoirEncoder::new(self.hidden_size.max(1), data.n_features(), &mut rng);
        fit(self.family(), Box::new(encoder), data, params, &mut rng)
    }
}

/// Feed-forward model over recent lags.
#[derive(Debug, Clone)]
pub struct DenseForecaster {
    pub lags: usize,
}

impl Default for DenseForecaster {
    fn default() -> Self {
        Self { lags: 5 }
    }
}

impl Forecaster for DenseForecaster {
    fn family(&self) -> ModelFamily {
        ModelFamily::Dense
    }

    fn train(
        &self,
        data: &SequenceDataset,
        params: &TrainingParams,
    ) -> PipelineResult<(Box<dyn FittedForecaster>, ModelMetrics)> {
        let mut rng = family_rng(self.family(), params);
        let encoder = LagEncoder {
            lags: self.lags.clamp(1, data.sequence_length.max(1)),
            n_features: data.n_features(),
        };
        fit(self.family(), Box::new(encoder), data, params, &mut rng)
    }
}

/// Attention pooling over the window.
#[derive(Debug, Clone, Default)]
pub struct AttentionForecaster;

impl Forecaster for AttentionForecaster {
    fn family(&self) -> ModelFamily {
        ModelFamily::Attention
    }

    fn train(
        &self,
        data: &SequenceDataset,
        params: &TrainingParams,
    ) -> PipelineResult<(Box<dyn FittedForecaster>, ModelMetrics)> {
        let mut rng = family_rng(self.family(), params);
        let encoder = AttentionEncoder {
            n_features: data.n_features(),
        };
        fit(self.family(), Box::new(encoder), data, params, &mut rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::test_support::sample_dataset;

    fn quick_params() -> TrainingParams {
        TrainingParams {
            max_epochs: 40,
            patience: 10,
            ..TrainingParams::default()
        }
    }

    #[test]
    fn test_family_order_and_names() {
        assert!(ModelFamily::Recurrent < ModelFamily::Dense);
        assert!(ModelFamily::Dense < ModelFamily::Attention);
        assert_eq!(ModelFamily::parse("attention"), Some(ModelFamily::Attention));
        assert_eq!(
            serde_json::to_string(&ModelFamily::Recurrent).unwrap(),
            "\"recurrent\""
        );
    }

    #[test]
    fn test_metrics_evaluate() {
        let m = ModelMetrics::evaluate(&[0.5, -0.5, 0.0], &[1.0, 0.5, 0.0], 7);
        assert!((m.mse - (0.25 + 1.0 + 0.0) / 3.0).abs() < 1e-12);
        assert!((m.mae - 1.5 / 3.0).abs() < 1e-12);
        assert!((m.directional_accuracy - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(m.epochs_run, 7);
    }

    #[test]
    fn test_every_family_trains() {
        let data = sample_dataset(120, 10);
        let members: Vec<Box<dyn Forecaster>> = vec![
            Box::new(RecurrentForecaster::default()),
            Box::new(DenseForecaster::default()),
            Box::new(AttentionForecaster),
        ];
        for member in members {
            let (fitted, metrics) = member.train(&data, &quick_params()).unwrap();
            assert_eq!(fitted.family(), member.family());
            assert!(metrics.mse.is_finite() && metrics.mse >= 0.0);
            assert!((0.0..=1.0).contains(&metrics.directional_accuracy));
            assert!(metrics.epochs_run >= 1 && metrics.epochs_run <= 40);
            assert!(fitted.predict(&data.x_predict).unwrap().is_finite());
        }
    }

    #[test]
    fn test_training_is_deterministic() {
        let data = sample_dataset(100, 8);
        let params = quick_params();
        let (a, ma) = RecurrentForecaster::default().train(&data, &params).unwrap();
        let (b, mb) = RecurrentForecaster::default().train(&data, &params).unwrap();
        assert_eq!(ma, mb);
        assert_eq!(
            a.predict(&data.x_predict).unwrap(),
            b.predict(&data.x_predict).unwrap()
        );
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let data = sample_dataset(100, 8);
        let (fitted, _) = DenseForecaster::default().train(&data, &quick_params()).unwrap();
        let short = data.x_predict[..4].to_vec();
        assert!(matches!(
            fitted.predict(&short),
            Err(PipelineError::ModelTraining { .. })
        ));
    }

    #[test]
    fn test_non_finite_targets_fail_training() {
        let mut data = sample_dataset(100, 8);
        data.y_test[0] = f64::NAN;
        let err = AttentionForecaster.train(&data, &quick_params()).err().expect("training should fail");
        assert!(matches!(err, PipelineError::ModelTraining { .. }));
    }
}
