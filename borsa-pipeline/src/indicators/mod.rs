//! Technical indicators for screening.
//!
//! `IndicatorEngine::compute` turns an ordered bar series into an
//! `IndicatorSnapshot`. It never fails: each indicator is computed on its
//! own and, when it cannot be, replaced by a documented neutral value.
//!
//! # Indicators
//!
//! - **RSI(14)**: adjusted exponential averages of gains and losses
//! - **Relative volume**: latest volume over the 10-bar mean volume
//! - **Pivot levels**: Fibonacci pivots from the last fully closed bar
//! - **Breakout flags**: latest close versus the pivot
//! - **Percent change**: latest close versus the previous close

pub mod math;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::data::Bar;
use crate::error::{PipelineError, PipelineResult};

/// RSI lookback.
pub const RSI_PERIOD: usize = 14;

/// Bars required before RSI is trusted.
pub const RSI_MIN_BARS: usize = RSI_PERIOD + 1;

/// RSI when it cannot be computed.
pub const NEUTRAL_RSI: f64 = 50.0;

/// Relative volume lookback.
pub const VOLUME_WINDOW: usize = 10;

/// Relative volume when it cannot be computed.
pub const NEUTRAL_RELATIVE_VOLUME: f64 = 1.0;

/// Pivot reference when no finite close exists.
pub const NEUTRAL_REFERENCE_PRICE: f64 = 100.0;

/// Fibonacci multiples of the bar range for R1/S1, R2/S2, R3/S3.
const FIB_RATIOS: [f64; 3] = [0.382, 0.618, 1.0];

/// Percentage bands around a close for R1/S1, R2/S2, R3/S3.
const BAND_RATIOS: [f64; 3] = [0.01, 0.02, 0.03];

// ============================================================================
// Snapshot Types
// ============================================================================

/// Where the pivot levels came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PivotSource {
    /// (H+L+C)/3 of the last fully closed bar
    Bar,
    /// Percentage bands around the latest finite close
    CloseBands,
    /// Percentage bands around the neutral reference price
    NeutralReference,
}

impl PivotSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bar => "bar",
            Self::CloseBands => "close_bands",
            Self::NeutralReference => "neutral_reference",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "bar" => Some(Self::Bar),
            "close_bands" => Some(Self::CloseBands),
            "neutral_reference" => Some(Self::NeutralReference),
            _ => None,
        }
    }
}

/// Pivot point with three resistance and three support levels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PivotLevels {
    pub pivot: f64,
    pub r1: f64,
    pub r2: f64,
    pub r3: f64,
    pub s1: f64,
    pub s2: f64,
    pub s3: f64,
    pub source: PivotSource,
}

impl PivotLevels {
    fn around(pivot: f64, offsets: [f64; 3], source: PivotSource) -> Self {
        Self {
            pivot,
            r1: pivot + offsets[0],
            r2: pivot + offsets[1],
            r3: pivot + offsets[2],
            s1: pivot - offsets[0],
            s2: pivot - offsets[1],
            s3: pivot - offsets[2],
            source,
        }
    }

    fn bands(price: f64, source: PivotSource) -> Self {
        Self::around(price, BAND_RATIOS.map(|r| price * r), source)
    }
}

/// Indicator values for one symbol at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub symbol: String,
    pub rsi: f64,
    pub relative_volume: f64,
    pub pivot: f64,
    pub r1: f64,
    pub r2: f64,
    pub r3: f64,
    pub s1: f64,
    pub s2: f64,
    pub s3: f64,
    pub pivot_source: PivotSource,
    pub percent_change: f64,
    /// Index of the bar the snapshot describes
    pub as_of_bar_index: usize,
    pub is_above_pivot: bool,
    pub cross_up: bool,
    pub cross_down: bool,
    pub last_close: Option<f64>,
    pub previous_close: Option<f64>,
    pub latest_open: Option<f64>,
    pub latest_high: Option<f64>,
    pub latest_low: Option<f64>,
    pub latest_volume: Option<f64>,
}

impl IndicatorSnapshot {
    pub fn levels(&self) -> PivotLevels {
        PivotLevels {
            pivot: self.pivot,
            r1: self.r1,
            r2: self.r2,
            r3: self.r3,
            s1: self.s1,
            s2: self.s2,
            s3: self.s3,
            source: self.pivot_source,
        }
    }
}

// ============================================================================
// Individual Indicators
// ============================================================================

fn finite(v: f64) -> Option<f64> {
    v.is_finite().then_some(v)
}

/// Latest RSI(14).
pub fn compute_rsi(closes: &[f64]) -> PipelineResult<f64> {
    if closes.len() < RSI_MIN_BARS {
        return Err(PipelineError::InsufficientData {
            required: RSI_MIN_BARS,
            actual: closes.len(),
        });
    }
    let series = math::rsi(closes, RSI_PERIOD);
    math::last_finite(&series)
        .ok_or_else(|| PipelineError::Computation("RSI undefined (no price movement)".into()))
}

/// Latest volume divided by the mean of the last ten volumes, current included.
pub fn compute_relative_volume(volumes: &[f64]) -> PipelineResult<f64> {
    if volumes.len() < VOLUME_WINDOW {
        return Err(PipelineError::InsufficientData {
            required: VOLUME_WINDOW,
            actual: volumes.len(),
        });
    }
    let window = &volumes[volumes.len() - VOLUME_WINDOW..];
    let mean = window.iter().sum::<f64>() / VOLUME_WINDOW as f64;
    let current = window[VOLUME_WINDOW - 1];
    if !mean.is_finite() || mean == 0.0 {
        return Err(PipelineError::Computation(format!(
            "volume mean is {}",
            mean
        )));
    }
    finite(current / mean)
        .ok_or_else(|| PipelineError::Computation("relative volume is not finite".into()))
}

/// Pivot levels from the second-to-last bar, with close-band fallbacks.
pub fn compute_pivots(bars: &[Bar]) -> PivotLevels {
    if bars.len() >= 2 {
        let prev = &bars[bars.len() - 2];
        if prev.has_finite_hlc() {
            let pivot = prev.typical_price();
            let range = prev.high - prev.low;
            return PivotLevels::around(pivot, FIB_RATIOS.map(|r| r * range), PivotSource::Bar);
        }
    }

    match bars.iter().rev().find_map(|b| finite(b.close)) {
        Some(close) => PivotLevels::bands(close, PivotSource::CloseBands),
        None => PivotLevels::bands(NEUTRAL_REFERENCE_PRICE, PivotSource::NeutralReference),
    }
}

/// (is_above_pivot, cross_up, cross_down) for the last two closes.
pub fn breakout_flags(closes: &[f64], pivot: f64) -> (bool, bool, bool) {
    let n = closes.len();
    if n < 2 {
        return (false, false, false);
    }
    let (prev, cur) = (closes[n - 2], closes[n - 1]);
    (
        cur > pivot,
        cur > pivot && prev <= pivot,
        cur < pivot && prev >= pivot,
    )
}

/// Latest close-to-close change in percent, rounded to two decimals.
pub fn percent_change(closes: &[f64]) -> f64 {
    let n = closes.len();
    if n < 2 {
        return 0.0;
    }
    let (prev, cur) = (closes[n - 2], closes[n - 1]);
    let change = (cur / prev - 1.0) * 100.0;
    if prev == 0.0 || !change.is_finite() {
        return 0.0;
    }
    (change * 100.0).round() / 100.0
}

// ============================================================================
// Engine
// ============================================================================

/// Computes screening indicators from bars.
#[derive(Debug, Clone, Default)]
pub struct IndicatorEngine;

impl IndicatorEngine {
    pub fn new() -> Self {
        Self
    }

    /// Build the snapshot for the latest bar. Side-effect free apart from logs.
    pub fn compute(&self, symbol: &str, bars: &[Bar]) -> IndicatorSnapshot {
        let closes = crate::data::closes(bars);
        let volumes = crate::data::volumes(bars);

        let rsi = compute_rsi(&closes)
            .unwrap_or_else(|e| fallback(symbol, "rsi", e, NEUTRAL_RSI));
        let relative_volume = compute_relative_volume(&volumes)
            .unwrap_or_else(|e| fallback(symbol, "relative_volume", e, NEUTRAL_RELATIVE_VOLUME));

        let levels = compute_pivots(bars);
        if levels.source != PivotSource::Bar {
            debug!(symbol, source = levels.source.as_str(), "Pivot from fallback");
        }
        let (is_above_pivot, cross_up, cross_down) = breakout_flags(&closes, levels.pivot);

        let latest = bars.last();
        let n = closes.len();

        IndicatorSnapshot {
            symbol: symbol.to_string(),
            rsi,
            relative_volume,
            pivot: levels.pivot,
            r1: levels.r1,
            r2: levels.r2,
            r3: levels.r3,
            s1: levels.s1,
            s2: levels.s2,
            s3: levels.s3,
            pivot_source: levels.source,
            percent_change: percent_change(&closes),
            as_of_bar_index: n.saturating_sub(1),
            is_above_pivot,
            cross_up,
            cross_down,
            last_close: closes.last().copied().and_then(finite),
            previous_close: n.checked_sub(2).and_then(|i| finite(closes[i])),
            latest_open: latest.and_then(|b| finite(b.open)),
            latest_high: latest.and_then(|b| finite(b.high)),
            latest_low: latest.and_then(|b| finite(b.low)),
            latest_volume: latest.and_then(|b| finite(b.volume)),
        }
    }
}

fn fallback(symbol: &str, indicator: &str, error: PipelineError, value: f64) -> f64 {
    if error.is_insufficient() {
        debug!(symbol, indicator, error = %error, fallback = value, "Indicator using neutral value");
    } else {
        warn!(symbol, indicator, error = %error, fallback = value, "Indicator computation failed");
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn bars_from(closes: &[f64], volumes: &[f64]) -> Vec<Bar> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 15, 0, 0).unwrap();
        closes
            .iter()
            .zip(volumes)
            .enumerate()
            .map(|(i, (&c, &v))| Bar {
                symbol: "TEST".into(),
                timestamp: start + Duration::days(i as i64),
                open: c - 0.5,
                high: c + 1.0,
                low: c - 1.0,
                close: c,
                volume: v,
            })
            .collect()
    }

    #[test]
    fn test_short_series_is_neutral() {
        let bars = bars_from(&[10.0; 14], &[100.0; 14]);
        let snap = IndicatorEngine::new().compute("TEST", &bars);
        assert_eq!(snap.rsi, NEUTRAL_RSI);
        assert_eq!(snap.relative_volume, 1.0);
    }

    #[test]
    fn test_relative_volume_fewer_than_ten_bars() {
        let bars = bars_from(&[10.0; 9], &[500.0; 9]);
        let snap = IndicatorEngine::new().compute("TEST", &bars);
        assert_eq!(snap.relative_volume, NEUTRAL_RELATIVE_VOLUME);
    }

    #[test]
    fn test_zero_volume_falls_back() {
        assert!(matches!(
            compute_relative_volume(&[0.0; 12]),
            Err(PipelineError::Computation(_))
        ));
    }

    #[test]
    fn test_flat_closes_rsi_is_neutral() {
        let bars = bars_from(&[10.0; 30], &[100.0; 30]);
        let snap = IndicatorEngine::new().compute("TEST", &bars);
        assert_eq!(snap.rsi, NEUTRAL_RSI);
    }

    #[test]
    fn test_rising_closes_with_volume_spike() {
        let closes: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        let mut volumes = vec![1000.0; 20];
        volumes[19] = 2000.0;
        let snap = IndicatorEngine::new().compute("TEST", &bars_from(&closes, &volumes));
        assert!(snap.rsi > 65.0);
        assert!((snap.relative_volume - 2000.0 / 1100.0).abs() < 1e-12);
        assert_eq!(snap.percent_change, 0.85);
    }

    #[test]
    fn test_pivot_from_second_to_last_bar() {
        let bars = bars_from(&[10.0, 20.0, 30.0], &[1.0; 3]);
        let levels = compute_pivots(&bars);
        // bar 1: H 21, L 19, C 20
        assert_eq!(levels.source, PivotSource::Bar);
        assert!((levels.pivot - 20.0).abs() < 1e-12);
        assert!((levels.r1 - (20.0 + 0.382 * 2.0)).abs() < 1e-12);
        assert!((levels.s3 - 18.0).abs() < 1e-12);
    }

    #[test]
    fn test_pivot_falls_back_to_close_bands() {
        let mut bars = bars_from(&[10.0, 20.0], &[1.0; 2]);
        bars[0].high = f64::NAN;
        let levels = compute_pivots(&bars);
        assert_eq!(levels.source, PivotSource::CloseBands);
        assert_eq!(levels.pivot, 20.0);
        assert!((levels.r2 - 20.4).abs() < 1e-12);

        let single = compute_pivots(&bars[1..]);
        assert_eq!(single.source, PivotSource::CloseBands);
    }

    #[test]
    fn test_pivot_neutral_reference() {
        let levels = compute_pivots(&[]);
        assert_eq!(levels.source, PivotSource::NeutralReference);
        assert_eq!(levels.pivot, NEUTRAL_REFERENCE_PRICE);
        assert!((levels.s1 - 99.0).abs() < 1e-12);
    }

    #[test]
    fn test_breakout_flags() {
        assert_eq!(breakout_flags(&[9.0, 11.0], 10.0), (true, true, false));
        assert_eq!(breakout_flags(&[10.0, 9.0], 10.0), (false, false, true));
        assert_eq!(breakout_flags(&[11.0, 12.0], 10.0), (true, false, false));
        assert_eq!(breakout_flags(&[11.0], 10.0), (false, false, false));
    }

    #[test]
    fn test_percent_change_edge_cases() {
        assert_eq!(percent_change(&[5.0]), 0.0);
        assert_eq!(percent_change(&[0.0, 5.0]), 0.0);
        assert_eq!(percent_change(&[3.0, 4.0]), 33.33);
    }

    #[test]
    fn test_empty_bars_produce_snapshot() {
        let snap = IndicatorEngine::new().compute("TEST", &[]);
        assert_eq!(snap.rsi, NEUTRAL_RSI);
        assert_eq!(snap.last_close, None);
        assert!(!snap.is_above_pivot);
        assert_eq!(snap.as_of_bar_index, 0);
    }
}
