//! Ensemble training: every registered family on the identical split.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::dataset::SequenceDataset;
use super::models::{
    AttentionForecaster, DenseForecaster, Forecaster, ModelFamily, RecurrentForecaster,
    TrainingParams,
};
use crate::error::{PipelineError, PipelineResult};

/// One successful ensemble member for one symbol in one cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRun {
    pub family: ModelFamily,
    pub mse: f64,
    pub mae: f64,
    pub directional_accuracy: f64,
    /// Next-step price, inverse-scaled
    pub predicted_value: f64,
    pub epochs_run: usize,
}

/// Successful runs in registration order plus the members that failed.
#[derive(Debug)]
pub struct EnsembleOutcome {
    pub runs: Vec<ModelRun>,
    pub failures: Vec<(ModelFamily, PipelineError)>,
}

/// Fixed roster of forecasters.
pub struct ModelEnsemble {
    members: Vec<Box<dyn Forecaster>>,
    params: TrainingParams,
}

impl ModelEnsemble {
    pub fn new(members: Vec<Box<dyn Forecaster>>, params: TrainingParams) -> Self {
        Self { members, params }
    }

    /// Recurrent, dense and attention, in that order.
    pub fn standard(params: TrainingParams) -> Self {
        Self::new(
            vec![
                Box::new(RecurrentForecaster::default()),
                Box::new(DenseForecaster::default()),
                Box::new(AttentionForecaster),
            ],
            params,
        )
    }

    pub fn families(&self) -> Vec<ModelFamily> {
        self.members.iter().map(|m| m.family()).collect()
    }

    pub fn params(&self) -> &TrainingParams {
        &self.params
    }

    /// Train every member. Fails only when no member succeeds.
    pub fn run(&self, symbol: &str, data: &SequenceDataset) -> PipelineResult<EnsembleOutcome> {
        let mut runs = Vec::with_capacity(self.members.len());
        let mut failures = Vec::new();

        for member in &self.members {
            let family = member.family();
            let result = member.train(data, &self.params).and_then(|(fitted, metrics)| {
                let scaled = fitted.predict(&data.x_predict)?;
                Ok(ModelRun {
                    family,
                    mse: metrics.mse,
                    mae: metrics.mae,
                    directional_accuracy: metrics.directional_accuracy,
                    predicted_value: data.inverse_target(scaled),
                    epochs_run: metrics.epochs_run,
                })
            });

            match result {
                Ok(run) => {
                    debug!(
                        symbol = %symbol,
                        family = family.name(),
                        mse = run.mse,
                        predicted = run.predicted_value,
                        "Ensemble member finished"
                    );
                    runs.push(run);
                }
                Err(e) => {
                    warn!(symbol = %symbol, family = family.name(), error = %e, "Ensemble member failed");
                    failures.push((family, e));
                }
            }
        }

        if runs.is_empty() {
            return Err(PipelineError::NoModelTrained {
                symbol: symbol.to_string(),
            });
        }
        Ok(EnsembleOutcome { runs, failures })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::models::{FittedForecaster, ModelMetrics};
    use crate::forecast::test_support::sample_dataset;

    struct Failing(ModelFamily);

    impl Forecaster for Failing {
        fn family(&self) -> ModelFamily {
            self.0
        }

        fn train(
            &self,
            _data: &SequenceDataset,
            _params: &TrainingParams,
        ) -> PipelineResult<(Box<dyn FittedForecaster>, ModelMetrics)> {
            Err(PipelineError::ModelTraining {
                family: self.0.name().into(),
                reason: "diverged".into(),
            })
        }
    }

    fn quick() -> TrainingParams {
        TrainingParams {
            max_epochs: 20,
            patience: 5,
            ..TrainingParams::default()
        }
    }

    #[test]
    fn test_standard_roster_order() {
        let ensemble = ModelEnsemble::standard(quick());
        assert_eq!(ensemble.families(), ModelFamily::ALL.to_vec());
    }

    #[test]
    fn test_failed_member_excluded() {
        let data = sample_dataset(100, 8);
        let ensemble = ModelEnsemble::new(
            vec![
                Box::new(Failing(ModelFamily::Recurrent)),
                Box::new(DenseForecaster::default()),
            ],
            quick(),
        );
        let outcome = ensemble.run("TEST", &data).unwrap();
        assert_eq!(outcome.runs.len(), 1);
        assert_eq!(outcome.runs[0].family, ModelFamily::Dense);
        assert!(outcome.runs[0].predicted_value.is_finite());
        assert_eq!(outcome.failures.len(), 1);
    }

    #[test]
    fn test_all_members_failing() {
        let data = sample_dataset(100, 8);
        let ensemble = ModelEnsemble::new(
            ModelFamily::ALL
                .into_iter()
                .map(|f| Box::new(Failing(f)) as Box<dyn Forecaster>)
                .collect(),
            quick(),
        );
        assert!(matches!(
            ensemble.run("TEST", &data),
            Err(PipelineError::NoModelTrained { .. })
        ));
    }
}
