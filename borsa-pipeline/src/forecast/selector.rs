//! Best-model selection and prediction record assembly.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::BTreeMap;

use super::ensemble::ModelRun;
use super::models::ModelFamily;

/// One family's contribution to a prediction record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPrediction {
    pub predicted_price: f64,
    pub change_percent: f64,
    pub mse: f64,
    pub mae: f64,
    pub directional_accuracy: f64,
}

/// The live prediction for one symbol. Each cycle overwrites it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub symbol: String,
    pub current_price: f64,
    pub per_model: BTreeMap<ModelFamily, ModelPrediction>,
    pub best_model: ModelFamily,
    pub best_mse: f64,
    pub best_mae: f64,
    /// Population std-dev of the per-model predicted prices
    pub volatility: f64,
    pub features_used: Vec<String>,
    pub models_used: Vec<ModelFamily>,
    pub training_window: usize,
    pub prediction_window: usize,
    pub prediction_date: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PredictionRecord {
    /// The best model's entry.
    pub fn best(&self) -> Option<&ModelPrediction> {
        self.per_model.get(&self.best_model)
    }
}

/// Percent move from `current` to `predicted`; zero when `current` is unusable.
pub fn change_percent(predicted: f64, current: f64) -> f64 {
    if current.is_finite() && current > 0.0 {
        (predicted - current) / current * 100.0
    } else {
        0.0
    }
}

fn better(candidate: &ModelRun, incumbent: &ModelRun) -> bool {
    candidate.mse < incumbent.mse
        || (candidate.mse == incumbent.mse && candidate.mae < incumbent.mae)
}

/// Picks the winning family and assembles the record.
#[derive(Debug, Clone, Default)]
pub struct BestModelSelector;

impl BestModelSelector {
    pub fn new() -> Self {
        Self
    }

    /// Lowest mse, then lowest mae, then earliest in `runs`.
    pub fn best<'a>(&self, runs: &'a [ModelRun]) -> Option<&'a ModelRun> {
        let mut iter = runs.iter();
        let mut best = iter.next()?;
        for run in iter {
            if better(run, best) {
                best = run;
            }
        }
        Some(best)
    }

    /// Build the record. `None` only when `runs` is empty.
    pub fn select(
        &self,
        symbol: &str,
        current_price: f64,
        runs: &[ModelRun],
        features_used: &[String],
        training_window: usize,
        now: DateTime<Utc>,
    ) -> Option<PredictionRecord> {
        let best = self.best(runs)?;

        let per_model = runs
            .iter()
            .map(|run| {
                (
                    run.family,
                    ModelPrediction {
                        predicted_price: run.predicted_value,
                        change_percent: change_percent(run.predicted_value, current_price),
                        mse: run.mse,
                        mae: run.mae,
                        directional_accuracy: run.directional_accuracy,
                    },
                )
            })
            .collect();

        let volatility = if runs.len() < 2 {
            0.0
        } else {
            runs.iter()
                .map(|r| r.predicted_value)
                .population_std_dev()
        };

        Some(PredictionRecord {
            symbol: symbol.to_string(),
            current_price,
            per_model,
            best_model: best.family,
            best_mse: best.mse,
            best_mae: best.mae,
            volatility,
            features_used: features_used.to_vec(),
            models_used: runs.iter().map(|r| r.family).collect(),
            training_window,
            prediction_window: 1,
            prediction_date: now + Duration::days(1),
            updated_at: now,
        })
    }
}
