//! Prediction reporting: per-run summaries and the weekly performance report.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::forecast::PredictionRecord;

/// Log one block per prediction: current price, every model and the winner.
pub fn log_prediction_summary(records: &[PredictionRecord]) {
    if records.is_empty() {
        info!("No predictions produced this run");
        return;
    }
    for record in records {
        for (family, prediction) in &record.per_model {
            info!(
                symbol = %record.symbol,
                model = %family,
                predicted_price = %format!("{:.2}", prediction.predicted_price),
                change_percent = %format!("{:.2}", prediction.change_percent),
                "Model prediction"
            );
        }
        info!(
            symbol = %record.symbol,
            current_price = %format!("{:.2}", record.current_price),
            best_model = %record.best_model,
            volatility = %format!("{:.4}", record.volatility),
            "Prediction summary"
        );
    }
}

/// Evaluation of one prediction against the realized price.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionOutcome {
    pub symbol: String,
    pub predicted_change: f64,
    pub realized_price: Option<f64>,
    pub success: bool,
}

/// True when the best model's predicted direction matches the realized move.
/// A flat move or a missing price counts as a miss.
pub fn is_success(record: &PredictionRecord, realized_price: Option<f64>) -> bool {
    let Some(change) = record.best().map(|p| p.change_percent) else {
        return false;
    };
    match realized_price {
        Some(price) if price.is_finite() => {
            (change > 0.0 && price > record.current_price)
                || (change < 0.0 && price < record.current_price)
        }
        _ => false,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeeklyReport {
    pub report_date: NaiveDate,
    pub outcomes: Vec<PredictionOutcome>,
    pub success_count: usize,
    pub failure_count: usize,
}

impl WeeklyReport {
    /// Score `records` against the latest known price per symbol.
    pub fn evaluate(
        report_date: NaiveDate,
        records: &[PredictionRecord],
        realized: &HashMap<String, f64>,
    ) -> Self {
        let outcomes: Vec<PredictionOutcome> = records
            .iter()
            .map(|record| {
                let realized_price = realized.get(&record.symbol).copied();
                PredictionOutcome {
                    symbol: record.symbol.clone(),
                    predicted_change: record.best().map_or(0.0, |p| p.change_percent),
                    realized_price,
                    success: is_success(record, realized_price),
                }
            })
            .collect();
        let success_count = outcomes.iter().filter(|o| o.success).count();
        Self {
            report_date,
            failure_count: outcomes.len() - success_count,
            success_count,
            outcomes,
        }
    }

    pub fn total(&self) -> usize {
        self.success_count + self.failure_count
    }

    /// Percentage of successful predictions; 0 when there are none.
    pub fn success_rate(&self) -> f64 {
        if self.total() == 0 {
            0.0
        } else {
            self.success_count as f64 / self.total() as f64 * 100.0
        }
    }

    pub fn file_name(&self) -> String {
        format!("weekly_report_{}.txt", self.report_date.format("%Y-%m-%d"))
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "WEEKLY PREDICTION PERFORMANCE REPORT");
        let _ = writeln!(out, "Date: {}", self.report_date.format("%Y-%m-%d"));
        let _ = writeln!(out);
        let _ = writeln!(out, "Total predictions: {}", self.total());
        let _ = writeln!(out, "Successful: {}", self.success_count);
        let _ = writeln!(out, "Failed: {}", self.failure_count);
        let _ = writeln!(out, "Success rate: {:.2}%", self.success_rate());
        if !self.outcomes.is_empty() {
            let _ = writeln!(out);
            for o in &self.outcomes {
                let realized = o
                    .realized_price
                    .map_or_else(|| "n/a".to_string(), |p| format!("{:.2}", p));
                let _ = writeln!(
                    out,
                    "{:<8} predicted {:+.2}%  realized {:>10}  {}",
                    o.symbol,
                    o.predicted_change,
                    realized,
                    if o.success { "hit" } else { "miss" }
                );
            }
        }
        out
    }

    /// Write the rendered report under `dir`.
    pub async fn save(&self, dir: &Path) -> Result<PathBuf> {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create report dir {}", dir.display()))?;
        let path = dir.join(self.file_name());
        tokio::fs::write(&path, self.render())
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!(path = %path.display(), "Weekly report saved");
        Ok(path)
    }
}
