//! SQLite repository.
//!
//! Scalar columns hold the values the scheduler queries on; nested payloads
//! (snapshots, per-model maps, technical analysis) are stored as JSON. The
//! selected flag is never stored: selection is evaluated from the three
//! filter columns.

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{PredictionHistoryEntry, PredictionRepository, ScreeningEntry};
use crate::error::{PipelineError, PipelineResult};
use crate::forecast::{ModelFamily, PredictionRecord};
use crate::indicators::IndicatorSnapshot;
use crate::screener::FilterResult;
use crate::technical::TechnicalSnapshot;

// ============================================================================
// Database Schema
// ============================================================================

const CREATE_TABLES_SQL: &str = r#"
-- Latest screening result per symbol
CREATE TABLE IF NOT EXISTS screenings (
    symbol TEXT PRIMARY KEY,
    rsi REAL NOT NULL,
    relative_volume REAL NOT NULL,
    pivot REAL NOT NULL,
    last_close REAL,
    rsi_filter INTEGER NOT NULL,
    volume_filter INTEGER NOT NULL,
    pivot_filter INTEGER NOT NULL,
    snapshot TEXT NOT NULL,
    screened_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_screenings_filters
ON screenings(rsi_filter, volume_filter, pivot_filter);

-- Live prediction per symbol
CREATE TABLE IF NOT EXISTS predictions (
    symbol TEXT PRIMARY KEY,
    current_price REAL NOT NULL,
    best_model TEXT NOT NULL,
    best_mse REAL NOT NULL,
    best_mae REAL NOT NULL,
    volatility REAL NOT NULL,
    per_model TEXT NOT NULL,
    features_used TEXT NOT NULL,
    models_used TEXT NOT NULL,
    training_window INTEGER NOT NULL,
    prediction_window INTEGER NOT NULL,
    prediction_date TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_predictions_updated
ON predictions(updated_at);

-- Append-only prediction log
CREATE TABLE IF NOT EXISTS prediction_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    symbol TEXT NOT NULL,
    prediction_date TEXT NOT NULL,
    predicted_price REAL NOT NULL,
    current_price REAL NOT NULL,
    model_used TEXT NOT NULL,
    recorded_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_history_symbol
ON prediction_history(symbol, recorded_at);

-- Latest technical analysis per symbol
CREATE TABLE IF NOT EXISTS technical_snapshots (
    symbol TEXT PRIMARY KEY,
    payload TEXT NOT NULL,
    analyzed_at TEXT NOT NULL
);
"#;

/// Fixed-width UTC timestamps so text comparison matches time order.
fn ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(s: &str) -> PipelineResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| PipelineError::Persistence(format!("bad timestamp '{}': {}", s, e)))
}

fn parse_family(s: &str) -> PipelineResult<ModelFamily> {
    ModelFamily::parse(s)
        .ok_or_else(|| PipelineError::Persistence(format!("unknown model family '{}'", s)))
}

/// Raw `predictions` row.
struct PredictionRow {
    symbol: String,
    current_price: f64,
    best_model: String,
    best_mse: f64,
    best_mae: f64,
    volatility: f64,
    per_model: String,
    features_used: String,
    models_used: String,
    training_window: i64,
    prediction_window: i64,
    prediction_date: String,
    updated_at: String,
}

const PREDICTION_COLUMNS: &str = "symbol, current_price, best_model, best_mse, best_mae, volatility, \
     per_model, features_used, models_used, training_window, prediction_window, \
     prediction_date, updated_at";

impl PredictionRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            symbol: row.get(0)?,
            current_price: row.get(1)?,
            best_model: row.get(2)?,
            best_mse: row.get(3)?,
            best_mae: row.get(4)?,
            volatility: row.get(5)?,
            per_model: row.get(6)?,
            features_used: row.get(7)?,
            models_used: row.get(8)?,
            training_window: row.get(9)?,
            prediction_window: row.get(10)?,
            prediction_date: row.get(11)?,
            updated_at: row.get(12)?,
        })
    }

    fn into_record(self) -> PipelineResult<PredictionRecord> {
        Ok(PredictionRecord {
            symbol: self.symbol,
            current_price: self.current_price,
            per_model: serde_json::from_str(&self.per_model)?,
            best_model: parse_family(&self.best_model)?,
            best_mse: self.best_mse,
            best_mae: self.best_mae,
            volatility: self.volatility,
            features_used: serde_json::from_str(&self.features_used)?,
            models_used: serde_json::from_str(&self.models_used)?,
            training_window: self.training_window.max(0) as usize,
            prediction_window: self.prediction_window.max(0) as usize,
            prediction_date: parse_ts(&self.prediction_date)?,
            updated_at: parse_ts(&self.updated_at)?,
        })
    }
}

// ============================================================================
// SQLite Repository
// ============================================================================

/// Repository backed by a SQLite file.
pub struct SqliteRepository {
    /// rusqlite::Connection is Send but not Sync
    db: Arc<Mutex<Connection>>,
    db_path: PathBuf,
}

impl SqliteRepository {
    /// Open or create the database at `db_path`.
    pub fn open(db_path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }

        let conn = Connection::open(&db_path).context("Failed to open prediction database")?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .context("Failed to set database pragmas")?;

        conn.execute_batch(CREATE_TABLES_SQL)
            .context("Failed to create database tables")?;

        info!(db_path = %db_path.display(), "Initialized prediction repository");

        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
            db_path,
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}

#[async_trait]
impl PredictionRepository for SqliteRepository {
    async fn upsert_indicator_snapshot(
        &self,
        symbol: &str,
        snapshot: &IndicatorSnapshot,
        filter: &FilterResult,
    ) -> PipelineResult<()> {
        let payload = serde_json::to_string(snapshot)?;
        let db = self.db.lock().await;
        db.execute(
            r#"
            INSERT OR REPLACE INTO screenings
            (symbol, rsi, relative_volume, pivot, last_close,
             rsi_filter, volume_filter, pivot_filter, snapshot, screened_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                symbol,
                snapshot.rsi,
                snapshot.relative_volume,
                snapshot.pivot,
                snapshot.last_close,
                filter.rsi_filter(),
                filter.volume_filter(),
                filter.pivot_filter(),
                payload,
                ts(Utc::now()),
            ],
        )?;
        debug!(symbol = %symbol, selected = filter.is_selected(), "Saved screening result");
        Ok(())
    }

    async fn get_selected_symbols(&self) -> PipelineResult<Vec<String>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(
            "SELECT symbol FROM screenings
             WHERE rsi_filter = 1 AND volume_filter = 1 AND pivot_filter = 1
             ORDER BY symbol",
        )?;
        let symbols = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(symbols)
    }

    async fn upsert_prediction(&self, symbol: &str, record: &PredictionRecord) -> PipelineResult<()> {
        let per_model = serde_json::to_string(&record.per_model)?;
        let features_used = serde_json::to_string(&record.features_used)?;
        let models_used = serde_json::to_string(&record.models_used)?;
        let history = PredictionHistoryEntry::from_record(record);

        let mut db = self.db.lock().await;
        let tx = db.transaction()?;
        tx.execute(
            &format!(
                "INSERT OR REPLACE INTO predictions ({}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                PREDICTION_COLUMNS
            ),
            params![
                symbol,
                record.current_price,
                record.best_model.name(),
                record.best_mse,
                record.best_mae,
                record.volatility,
                per_model,
                features_used,
                models_used,
                record.training_window as i64,
                record.prediction_window as i64,
                ts(record.prediction_date),
                ts(record.updated_at),
            ],
        )?;
        tx.execute(
            r#"
            INSERT INTO prediction_history
            (symbol, prediction_date, predicted_price, current_price, model_used, recorded_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                symbol,
                ts(history.prediction_date),
                history.predicted_price,
                history.current_price,
                history.model_used.name(),
                ts(history.recorded_at),
            ],
        )?;
        tx.commit()?;

        debug!(symbol = %symbol, best_model = %record.best_model, "Saved prediction");
        Ok(())
    }

    async fn get_prediction(&self, symbol: &str) -> PipelineResult<Option<PredictionRecord>> {
        let row = {
            let db = self.db.lock().await;
            db.query_row(
                &format!("SELECT {} FROM predictions WHERE symbol = ?1", PREDICTION_COLUMNS),
                params![symbol],
                PredictionRow::from_row,
            )
            .optional()?
        };
        row.map(PredictionRow::into_record).transpose()
    }

    async fn get_screening(&self, symbol: &str) -> PipelineResult<Option<ScreeningEntry>> {
        let db = self.db.lock().await;
        let result = db.query_row(
            "SELECT snapshot, rsi_filter, volume_filter, pivot_filter, screened_at
             FROM screenings WHERE symbol = ?1",
            params![symbol],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, bool>(1)?,
                    row.get::<_, bool>(2)?,
                    row.get::<_, bool>(3)?,
                    row.get::<_, String>(4)?,
                ))
            },
        );

        match result {
            Ok((payload, rsi, volume, pivot, screened_at)) => Ok(Some(ScreeningEntry {
                snapshot: serde_json::from_str(&payload)?,
                filter: FilterResult::new(rsi, volume, pivot),
                screened_at: parse_ts(&screened_at)?,
            })),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_predictions_since(&self, since: DateTime<Utc>) -> PipelineResult<Vec<PredictionRecord>> {
        let rows = {
            let db = self.db.lock().await;
            let mut stmt = db.prepare(&format!(
                "SELECT {} FROM predictions WHERE updated_at >= ?1 ORDER BY symbol",
                PREDICTION_COLUMNS
            ))?;
            let rows = stmt
                .query_map(params![ts(since)], PredictionRow::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };
        rows.into_iter().map(PredictionRow::into_record).collect()
    }

    async fn prediction_history(&self, symbol: &str) -> PipelineResult<Vec<PredictionHistoryEntry>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(
            "SELECT prediction_date, predicted_price, current_price, model_used, recorded_at
             FROM prediction_history WHERE symbol = ?1 ORDER BY recorded_at, id",
        )?;
        let rows = stmt
            .query_map(params![symbol], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, f64>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(prediction_date, predicted_price, current_price, model, recorded_at)| {
                Ok(PredictionHistoryEntry {
                    symbol: symbol.to_string(),
                    prediction_date: parse_ts(&prediction_date)?,
                    predicted_price,
                    current_price,
                    model_used: parse_family(&model)?,
                    recorded_at: parse_ts(&recorded_at)?,
                })
            })
            .collect()
    }

    async fn upsert_technical_snapshot(
        &self,
        symbol: &str,
        snapshot: &TechnicalSnapshot,
    ) -> PipelineResult<()> {
        let payload = serde_json::to_string(snapshot)?;
        let db = self.db.lock().await;
        db.execute(
            "INSERT OR REPLACE INTO technical_snapshots (symbol, payload, analyzed_at)
             VALUES (?1, ?2, ?3)",
            params![symbol, payload, ts(snapshot.analyzed_at)],
        )?;
        debug!(symbol = %symbol, "Saved technical snapshot");
        Ok(())
    }

    async fn get_technical_snapshot(&self, symbol: &str) -> PipelineResult<Option<TechnicalSnapshot>> {
        let payload: Option<String> = {
            let db = self.db.lock().await;
            db.query_row(
                "SELECT payload FROM technical_snapshots WHERE symbol = ?1",
                params![symbol],
                |row| row.get(0),
            )
            .optional()?
        };
        payload
            .map(|p| serde_json::from_str(&p).map_err(PipelineError::from))
            .transpose()
    }
}
