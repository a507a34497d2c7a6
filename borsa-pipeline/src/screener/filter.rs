//! Screening filter.

use serde::{Deserialize, Serialize};

use crate::indicators::IndicatorSnapshot;
use borsa_common::config::PipelineConfig;

/// Thresholds for the three screening criteria.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreeningThresholds {
    /// Lower RSI bound (inclusive)
    pub rsi_low: f64,
    /// Upper RSI bound (inclusive)
    pub rsi_high: f64,
    /// Relative volume must be strictly above this
    pub min_relative_volume: f64,
}

impl Default for ScreeningThresholds {
    fn default() -> Self {
        Self {
            rsi_low: 45.0,
            rsi_high: 65.0,
            min_relative_volume: 1.4,
        }
    }
}

impl From<&PipelineConfig> for ScreeningThresholds {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            rsi_low: config.rsi_low,
            rsi_high: config.rsi_high,
            min_relative_volume: config.min_relative_volume,
        }
    }
}

/// Outcome of the three criteria. Selection is derived, never stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterResult {
    rsi_filter: bool,
    volume_filter: bool,
    pivot_filter: bool,
}

impl FilterResult {
    pub fn new(rsi_filter: bool, volume_filter: bool, pivot_filter: bool) -> Self {
        Self {
            rsi_filter,
            volume_filter,
            pivot_filter,
        }
    }

    /// Every criterion false.
    pub fn rejected() -> Self {
        Self::default()
    }

    pub fn rsi_filter(&self) -> bool {
        self.rsi_filter
    }

    pub fn volume_filter(&self) -> bool {
        self.volume_filter
    }

    pub fn pivot_filter(&self) -> bool {
        self.pivot_filter
    }

    /// Conjunction of the three criteria.
    pub fn is_selected(&self) -> bool {
        self.rsi_filter && self.volume_filter && self.pivot_filter
    }
}

/// Applies `ScreeningThresholds` to snapshots.
#[derive(Debug, Clone, Default)]
pub struct ScreeningFilter {
    thresholds: ScreeningThresholds,
}

impl ScreeningFilter {
    pub fn new(thresholds: ScreeningThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &ScreeningThresholds {
        &self.thresholds
    }

    /// Evaluate the latest snapshot against the prior bar's close.
    ///
    /// A missing snapshot rejects every criterion; missing or non-finite
    /// inputs reject only the criteria that need them.
    pub fn evaluate(
        &self,
        snapshot: Option<&IndicatorSnapshot>,
        previous_close: Option<f64>,
    ) -> FilterResult {
        let Some(snap) = snapshot else {
            return FilterResult::rejected();
        };
        let t = &self.thresholds;

        let rsi_filter = snap.rsi.is_finite() && t.rsi_low <= snap.rsi && snap.rsi <= t.rsi_high;

        let volume_filter =
            snap.relative_volume.is_finite() && snap.relative_volume > t.min_relative_volume;

        let pivot_filter = match (previous_close, snap.last_close) {
            (Some(prev), Some(cur)) if prev.is_finite() && cur.is_finite() && snap.pivot.is_finite() => {
                prev < snap.pivot && snap.pivot <= cur
            }
            _ => false,
        };

        FilterResult::new(rsi_filter, volume_filter, pivot_filter)
    }
}
