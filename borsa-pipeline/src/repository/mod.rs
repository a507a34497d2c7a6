//! Durable storage for screening results, predictions and technical analysis.
//!
//! The repository is the only durable owner of pipeline output. Two
//! implementations share the `PredictionRepository` trait:
//! - `SqliteRepository`: WAL-mode SQLite, one transaction per write
//! - `MemoryRepository`: process-local maps for tests and dry runs

pub mod memory;
pub mod sqlite;

pub use memory::MemoryRepository;
pub use sqlite::SqliteRepository;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::PipelineResult;
use crate::forecast::{ModelFamily, PredictionRecord};
use crate::indicators::IndicatorSnapshot;
use crate::screener::FilterResult;
use crate::technical::TechnicalSnapshot;

/// Latest screening outcome for a symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreeningEntry {
    pub snapshot: IndicatorSnapshot,
    pub filter: FilterResult,
    pub screened_at: DateTime<Utc>,
}

/// Append-only log line written with every successful prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionHistoryEntry {
    pub symbol: String,
    pub prediction_date: DateTime<Utc>,
    pub predicted_price: f64,
    pub current_price: f64,
    pub model_used: ModelFamily,
    pub recorded_at: DateTime<Utc>,
}

impl PredictionHistoryEntry {
    /// History line for a record, priced by its best model.
    pub fn from_record(record: &PredictionRecord) -> Self {
        Self {
            symbol: record.symbol.clone(),
            prediction_date: record.prediction_date,
            predicted_price: record
                .best()
                .map_or(record.current_price, |p| p.predicted_price),
            current_price: record.current_price,
            model_used: record.best_model,
            recorded_at: record.updated_at,
        }
    }
}

/// Storage operations used by the scheduler jobs and the CLI.
#[async_trait]
pub trait PredictionRepository: Send + Sync {
    /// Replace the symbol's indicator snapshot and filter result.
    async fn upsert_indicator_snapshot(
        &self,
        symbol: &str,
        snapshot: &IndicatorSnapshot,
        filter: &FilterResult,
    ) -> PipelineResult<()>;

    /// Symbols whose latest filter result is selected, sorted.
    async fn get_selected_symbols(&self) -> PipelineResult<Vec<String>>;

    /// Replace the live prediction and append a history line atomically.
    async fn upsert_prediction(&self, symbol: &str, record: &PredictionRecord) -> PipelineResult<()>;

    async fn get_prediction(&self, symbol: &str) -> PipelineResult<Option<PredictionRecord>>;

    async fn get_screening(&self, symbol: &str) -> PipelineResult<Option<ScreeningEntry>>;

    /// Live predictions updated at or after `since`, sorted by symbol.
    async fn list_predictions_since(&self, since: DateTime<Utc>) -> PipelineResult<Vec<PredictionRecord>>;

    /// Every history line for a symbol, oldest first.
    async fn prediction_history(&self, symbol: &str) -> PipelineResult<Vec<PredictionHistoryEntry>>;

    async fn upsert_technical_snapshot(
        &self,
        symbol: &str,
        snapshot: &TechnicalSnapshot,
    ) -> PipelineResult<()>;

    async fn get_technical_snapshot(&self, symbol: &str) -> PipelineResult<Option<TechnicalSnapshot>>;
}

pub type SharedRepository = Arc<dyn PredictionRepository>;
