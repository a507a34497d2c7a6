//! In-memory repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

use super::{PredictionHistoryEntry, PredictionRepository, ScreeningEntry};
use crate::error::PipelineResult;
use crate::forecast::PredictionRecord;
use crate::indicators::IndicatorSnapshot;
use crate::screener::FilterResult;
use crate::technical::TechnicalSnapshot;

#[derive(Default)]
struct Tables {
    screenings: BTreeMap<String, ScreeningEntry>,
    predictions: BTreeMap<String, PredictionRecord>,
    history: HashMap<String, Vec<PredictionHistoryEntry>>,
    technical: HashMap<String, TechnicalSnapshot>,
}

/// Repository backed by process-local maps.
#[derive(Default)]
pub struct MemoryRepository {
    tables: RwLock<Tables>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PredictionRepository for MemoryRepository {
    async fn upsert_indicator_snapshot(
        &self,
        symbol: &str,
        snapshot: &IndicatorSnapshot,
        filter: &FilterResult,
    ) -> PipelineResult<()> {
        let mut tables = self.tables.write().await;
        tables.screenings.insert(
            symbol.to_string(),
            ScreeningEntry {
                snapshot: snapshot.clone(),
                filter: *filter,
                screened_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn get_selected_symbols(&self) -> PipelineResult<Vec<String>> {
        let tables = self.tables.read().await;
        Ok(tables
            .screenings
            .iter()
            .filter(|(_, entry)| entry.filter.is_selected())
            .map(|(symbol, _)| symbol.clone())
            .collect())
    }

    async fn upsert_prediction(&self, symbol: &str, record: &PredictionRecord) -> PipelineResult<()> {
        let mut tables = self.tables.write().await;
        tables
            .history
            .entry(symbol.to_string())
            .or_default()
            .push(PredictionHistoryEntry::from_record(record));
        tables.predictions.insert(symbol.to_string(), record.clone());
        Ok(())
    }

    async fn get_prediction(&self, symbol: &str) -> PipelineResult<Option<PredictionRecord>> {
        Ok(self.tables.read().await.predictions.get(symbol).cloned())
    }

    async fn get_screening(&self, symbol: &str) -> PipelineResult<Option<ScreeningEntry>> {
        Ok(self.tables.read().await.screenings.get(symbol).cloned())
    }

    async fn list_predictions_since(&self, since: DateTime<Utc>) -> PipelineResult<Vec<PredictionRecord>> {
        let tables = self.tables.read().await;
        Ok(tables
            .predictions
            .values()
            .filter(|r| r.updated_at >= since)
            .cloned()
            .collect())
    }

    async fn prediction_history(&self, symbol: &str) -> PipelineResult<Vec<PredictionHistoryEntry>> {
        let tables = self.tables.read().await;
        Ok(tables.history.get(symbol).cloned().unwrap_or_default())
    }

    async fn upsert_technical_snapshot(
        &self,
        symbol: &str,
        snapshot: &TechnicalSnapshot,
    ) -> PipelineResult<()> {
        self.tables
            .write()
            .await
            .technical
            .insert(symbol.to_string(), snapshot.clone());
        Ok(())
    }

    async fn get_technical_snapshot(&self, symbol: &str) -> PipelineResult<Option<TechnicalSnapshot>> {
        Ok(self.tables.read().await.technical.get(symbol).cloned())
    }
}
