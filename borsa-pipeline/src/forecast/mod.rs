//! Next-step price forecasting for screened symbols.
//!
//! Hourly bars → `FeatureFrame` → `FeatureSelector` → `SequenceDatasetBuilder`
//! → `ModelEnsemble` → `BestModelSelector`. Everything here is CPU-bound and
//! synchronous; the orchestrator runs it on the blocking pool.

pub mod dataset;
pub mod ensemble;
pub mod features;
pub mod frame;
pub mod models;
pub mod selector;

pub use dataset::{MinMaxScaler, SequenceDataset, SequenceDatasetBuilder};
pub use ensemble::{EnsembleOutcome, ModelEnsemble, ModelRun};
pub use features::FeatureSelector;
pub use frame::FeatureFrame;
pub use models::{Forecaster, FittedForecaster, ModelFamily, ModelMetrics, TrainingParams};
pub use selector::{BestModelSelector, ModelPrediction, PredictionRecord};

use chrono::{DateTime, Utc};
use tracing::info;

use crate::data::Bar;
use crate::error::{PipelineError, PipelineResult};

/// Target column predicted by every model.
pub const TARGET_COLUMN: &str = "Close";

/// The full forecasting chain for one symbol.
pub struct ForecastPipeline {
    selector: FeatureSelector,
    builder: SequenceDatasetBuilder,
    ensemble: ModelEnsemble,
    best: BestModelSelector,
}

impl ForecastPipeline {
    pub fn new(min_features: usize, sequence_length: usize, params: TrainingParams) -> Self {
        Self {
            selector: FeatureSelector::new(min_features),
            builder: SequenceDatasetBuilder::new(sequence_length),
            ensemble: ModelEnsemble::standard(params),
            best: BestModelSelector::new(),
        }
    }

    pub fn with_ensemble(mut self, ensemble: ModelEnsemble) -> Self {
        self.ensemble = ensemble;
        self
    }

    /// Train on `bars` and build a prediction record.
    ///
    /// `current_price` defaults to the last hourly close.
    pub fn run(
        &self,
        symbol: &str,
        bars: &[Bar],
        current_price: Option<f64>,
        now: DateTime<Utc>,
    ) -> PipelineResult<PredictionRecord> {
        let frame = FeatureFrame::from_bars(bars).clean();
        let features = self.selector.select(&frame)?;
        let dataset = self.builder.build(&frame, &features, TARGET_COLUMN)?;
        let outcome = self.ensemble.run(symbol, &dataset)?;

        let current = current_price
            .filter(|p| p.is_finite())
            .unwrap_or(dataset.last_target);

        let record = self
            .best
            .select(
                symbol,
                current,
                &outcome.runs,
                &features,
                dataset.x_train.len(),
                now,
            )
            .ok_or_else(|| PipelineError::NoModelTrained {
                symbol: symbol.to_string(),
            })?;

        info!(
            symbol = %symbol,
            best_model = %record.best_model,
            best_mse = record.best_mse,
            models = outcome.runs.len(),
            failed = outcome.failures.len(),
            "Forecast complete"
        );
        Ok(record)
    }
}
