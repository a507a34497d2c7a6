//! Feature selection for the forecasting models.

use crate::error::{PipelineError, PipelineResult};

use super::frame::FeatureFrame;

/// Columns always kept when the frame is wide enough, in frame order.
const OHLCV: [&str; 5] = ["Open", "High", "Low", "Close", "Volume"];

/// Name fragments that mark a non-feature column.
const EXCLUDED_FRAGMENTS: [&str; 5] = ["date", "time", "index", "timestamp", "datetime"];

/// Fewest features a model may be trained on.
pub const MIN_SELECTED_FEATURES: usize = 3;

/// Indicator families recognised by column prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorFamily {
    /// RSI*, MACD*
    Momentum,
    /// SMA_*, EMA_*
    Trend,
    /// BB_*
    Volatility,
}

impl IndicatorFamily {
    pub const ALL: [IndicatorFamily; 3] = [Self::Momentum, Self::Trend, Self::Volatility];

    /// Family of a column, if any.
    pub fn of(column: &str) -> Option<Self> {
        if column.starts_with("RSI") || column.starts_with("MACD") {
            Some(Self::Momentum)
        } else if column.starts_with("SMA_") || column.starts_with("EMA_") {
            Some(Self::Trend)
        } else if column.starts_with("BB_") {
            Some(Self::Volatility)
        } else {
            None
        }
    }
}

/// Picks a stable, ordered subset of frame columns.
#[derive(Debug, Clone)]
pub struct FeatureSelector {
    min_features: usize,
}

impl Default for FeatureSelector {
    fn default() -> Self {
        Self { min_features: 5 }
    }
}

impl FeatureSelector {
    pub fn new(min_features: usize) -> Self {
        Self { min_features }
    }

    /// Selected column names. The same frame always yields the same list.
    pub fn select(&self, frame: &FeatureFrame) -> PipelineResult<Vec<String>> {
        let candidates: Vec<&String> = frame
            .names()
            .iter()
            .filter(|name| {
                let lower = name.to_lowercase();
                !EXCLUDED_FRAGMENTS.iter().any(|f| lower.contains(f))
            })
            .collect();

        let mut selected: Vec<String> = if candidates.len() > self.min_features {
            let mut picked: Vec<String> = candidates
                .iter()
                .filter(|name| OHLCV.contains(&name.as_str()))
                .map(|name| (*name).clone())
                .collect();

            for family in IndicatorFamily::ALL {
                picked.extend(
                    candidates
                        .iter()
                        .filter(|name| IndicatorFamily::of(name) == Some(family))
                        .map(|name| (*name).clone()),
                );
            }

            for name in &candidates {
                if picked.len() >= self.min_features {
                    break;
                }
                if !picked.contains(*name) {
                    picked.push((*name).clone());
                }
            }
            picked
        } else {
            candidates.iter().map(|name| (*name).clone()).collect()
        };

        if frame.column("Close").is_some() && !selected.iter().any(|n| n == "Close") {
            selected.push("Close".into());
        }

        if selected.len() < MIN_SELECTED_FEATURES {
            return Err(PipelineError::InsufficientFeatures {
                required: MIN_SELECTED_FEATURES,
                actual: selected.len(),
            });
        }
        Ok(selected)
    }
}
