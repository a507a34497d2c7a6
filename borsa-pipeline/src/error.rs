//! Pipeline error taxonomy.
//!
//! Per-symbol stages return `PipelineError`; the orchestrator decides per
//! variant whether a symbol is skipped, falls back to neutral values or is
//! excluded from prediction.

use thiserror::Error;

/// Result alias for pipeline stages.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

/// Errors raised by the screening and forecasting stages.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The market data source could not deliver bars for a symbol
    #[error("Data unavailable for {symbol}: {reason}")]
    DataUnavailable { symbol: String, reason: String },

    /// Not enough rows for the requested computation
    #[error("Insufficient data: need {required} rows, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    /// Feature selection left too few columns
    #[error("Insufficient features: need {required}, got {actual}")]
    InsufficientFeatures { required: usize, actual: usize },

    /// Windowing produced too few labelled examples
    #[error("Insufficient sequences: need {required}, got {actual}")]
    InsufficientSequences { required: usize, actual: usize },

    /// A single indicator could not be computed
    #[error("Computation error: {0}")]
    Computation(String),

    /// One ensemble member failed to train
    #[error("Model training failed for {family}: {reason}")]
    ModelTraining { family: String, reason: String },

    /// Every ensemble member failed
    #[error("No model trained for {symbol}")]
    NoModelTrained { symbol: String },

    /// Repository write or read failed
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Raw market data could not be mapped onto the bar schema
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),
}

impl PipelineError {
    /// Shorthand for a `DataUnavailable` error.
    pub fn data_unavailable(symbol: impl Into<String>, reason: impl ToString) -> Self {
        Self::DataUnavailable {
            symbol: symbol.into(),
            reason: reason.to_string(),
        }
    }

    /// True for the `Insufficient*` family.
    pub fn is_insufficient(&self) -> bool {
        matches!(
            self,
            Self::InsufficientData { .. }
                | Self::InsufficientFeatures { .. }
                | Self::InsufficientSequences { .. }
        )
    }
}

impl From<rusqlite::Error> for PipelineError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Persistence(e.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(e: serde_json::Error) -> Self {
        Self::Persistence(format!("serialization: {}", e))
    }
}
