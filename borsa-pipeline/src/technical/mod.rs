//! Technical analysis on long daily history.
//!
//! Produces a `TechnicalSnapshot` per symbol:
//! - latest values of the standard indicator set (`None` when undefined)
//! - support and resistance from local extrema
//! - Fibonacci retracement over the recent range
//! - boolean trend, momentum and volatility signals; a signal is `None` when
//!   its inputs are undefined

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::data::{self, Bar};
use crate::indicators::math;

/// Look-back unit for support/resistance.
pub const SR_PERIODS: usize = 14;

/// Fewest rows for a Fibonacci retracement.
pub const FIB_MIN_ROWS: usize = 20;

/// Rows spanned by the Fibonacci range.
pub const FIB_WINDOW: usize = 60;

/// Retracement ratios measured down from the high.
pub const FIB_RATIOS: [f64; 7] = [0.0, 0.236, 0.382, 0.5, 0.618, 0.786, 1.0];

const ADX_TREND_THRESHOLD: f64 = 25.0;
const STOCH_OVERBOUGHT: f64 = 80.0;
const STOCH_OVERSOLD: f64 = 20.0;
const CCI_BAND: f64 = 100.0;
const MFI_OVERBOUGHT: f64 = 80.0;
const MFI_OVERSOLD: f64 = 20.0;
const SQUEEZE_RATIO: f64 = 0.8;
const SQUEEZE_LOOKBACK: usize = 20;

// ============================================================================
// Types
// ============================================================================

/// Latest indicator values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TechnicalIndicators {
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub macd_hist: Option<f64>,
    pub adx: Option<f64>,
    pub plus_di: Option<f64>,
    pub minus_di: Option<f64>,
    pub stoch_k: Option<f64>,
    pub stoch_d: Option<f64>,
    pub cci: Option<f64>,
    pub mfi: Option<f64>,
    pub bb_upper: Option<f64>,
    pub bb_middle: Option<f64>,
    pub bb_lower: Option<f64>,
    pub atr: Option<f64>,
    pub sma_50: Option<f64>,
    pub sma_200: Option<f64>,
    pub ema_20: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SupportResistance {
    pub support: Vec<f64>,
    pub resistance: Vec<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Up,
    Down,
}

/// Retracement levels, ordered as `FIB_RATIOS`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FibonacciLevels {
    pub trend: TrendDirection,
    pub high: f64,
    pub low: f64,
    pub levels: Vec<(f64, f64)>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrendSignals {
    pub golden_cross: Option<bool>,
    pub death_cross: Option<bool>,
    pub price_above_sma50: Option<bool>,
    pub price_below_sma50: Option<bool>,
    pub price_above_sma200: Option<bool>,
    pub price_below_sma200: Option<bool>,
    pub uptrend: Option<bool>,
    pub downtrend: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MomentumSignals {
    pub macd_bullish: Option<bool>,
    pub macd_bearish: Option<bool>,
    pub stoch_overbought: Option<bool>,
    pub stoch_oversold: Option<bool>,
    pub stoch_bullish_crossover: Option<bool>,
    pub stoch_bearish_crossover: Option<bool>,
    pub cci_overbought: Option<bool>,
    pub cci_oversold: Option<bool>,
    pub mfi_overbought: Option<bool>,
    pub mfi_oversold: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VolatilitySignals {
    pub price_above_upper_band: Option<bool>,
    pub price_below_lower_band: Option<bool>,
    pub price_above_middle_band: Option<bool>,
    pub price_below_middle_band: Option<bool>,
    pub bollinger_squeeze: Option<bool>,
    pub increased_volatility: Option<bool>,
    pub decreased_volatility: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TechnicalSignals {
    pub trend: TrendSignals,
    pub momentum: MomentumSignals,
    pub volatility: VolatilitySignals,
}

/// One live technical analysis result per symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalSnapshot {
    pub symbol: String,
    pub last_close: Option<f64>,
    pub bars_used: usize,
    pub indicators: TechnicalIndicators,
    pub support_resistance: SupportResistance,
    pub fibonacci: Option<FibonacciLevels>,
    pub signals: TechnicalSignals,
    pub analyzed_at: DateTime<Utc>,
}

// ============================================================================
// Components
// ============================================================================

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn push_unique(levels: &mut Vec<f64>, level: f64) {
    if level.is_finite() && !levels.contains(&level) {
        levels.push(level);
    }
}

fn sort_levels(levels: &mut [f64]) {
    levels.sort_by(|a, b| a.total_cmp(b));
}

/// Strict local extrema over the last `3 * periods` rows.
pub fn support_resistance(bars: &[Bar], periods: usize) -> SupportResistance {
    if bars.len() < periods || periods == 0 {
        return SupportResistance::default();
    }
    let recent = &bars[bars.len().saturating_sub(periods * 3)..];
    let highs = data::highs(recent);
    let lows = data::lows(recent);

    let mut support = Vec::new();
    let mut resistance = Vec::new();
    for i in 1..recent.len().saturating_sub(1) {
        if lows[i] < lows[i - 1] && lows[i] < lows[i + 1] {
            push_unique(&mut support, round2(lows[i]));
        }
        if highs[i] > highs[i - 1] && highs[i] > highs[i + 1] {
            push_unique(&mut resistance, round2(highs[i]));
        }
    }

    let max_high = highs.iter().copied().filter(|v| v.is_finite()).fold(f64::NEG_INFINITY, f64::max);
    let min_low = lows.iter().copied().filter(|v| v.is_finite()).fold(f64::INFINITY, f64::min);
    push_unique(&mut resistance, round2(max_high));
    push_unique(&mut support, round2(min_low));

    sort_levels(&mut support);
    sort_levels(&mut resistance);
    SupportResistance {
        support,
        resistance,
    }
}

/// Retracement over the last `FIB_WINDOW` rows.
pub fn fibonacci(bars: &[Bar]) -> Option<FibonacciLevels> {
    if bars.len() < FIB_MIN_ROWS {
        return None;
    }
    let recent = &bars[bars.len().saturating_sub(FIB_WINDOW)..];
    let high = recent.iter().map(|b| b.high).filter(|v| v.is_finite()).fold(f64::NEG_INFINITY, f64::max);
    let low = recent.iter().map(|b| b.low).filter(|v| v.is_finite()).fold(f64::INFINITY, f64::min);
    if !high.is_finite() || !low.is_finite() {
        return None;
    }

    let diff = high - low;
    let last = bars[bars.len() - 1].close;
    let reference = bars[bars.len() - FIB_MIN_ROWS].close;
    let trend = if last > reference {
        TrendDirection::Up
    } else {
        TrendDirection::Down
    };

    Some(FibonacciLevels {
        trend,
        high,
        low,
        levels: FIB_RATIOS.iter().map(|&r| (r, high - r * diff)).collect(),
    })
}

fn latest_indicators(bars: &[Bar]) -> TechnicalIndicators {
    let high = data::highs(bars);
    let low = data::lows(bars);
    let close = data::closes(bars);
    let volume = data::volumes(bars);

    let macd = math::macd(&close, 12, 26, 9);
    let adx = math::adx(&high, &low, &close, 14);
    let (stoch_k, stoch_d) = math::stochastic(&high, &low, &close, 14, 3);
    let bb = math::bollinger(&close, 20, 2.0);

    TechnicalIndicators {
        macd: math::last_finite(&macd.line),
        macd_signal: math::last_finite(&macd.signal),
        macd_hist: math::last_finite(&macd.histogram),
        adx: math::last_finite(&adx.adx),
        plus_di: math::last_finite(&adx.plus_di),
        minus_di: math::last_finite(&adx.minus_di),
        stoch_k: math::last_finite(&stoch_k),
        stoch_d: math::last_finite(&stoch_d),
        cci: math::last_finite(&math::cci(&high, &low, &close, 20, 0.015)),
        mfi: math::last_finite(&math::mfi(&high, &low, &close, &volume, 14)),
        bb_upper: math::last_finite(&bb.upper),
        bb_middle: math::last_finite(&bb.middle),
        bb_lower: math::last_finite(&bb.lower),
        atr: math::last_finite(&math::atr(&high, &low, &close, 14)),
        sma_50: math::last_finite(&math::sma(&close, 50)),
        sma_200: math::last_finite(&math::sma(&close, 200)),
        ema_20: math::last_finite(&math::ema(&close, 20)),
    }
}

fn trend_signals(ind: &TechnicalIndicators, price: f64) -> TrendSignals {
    let cross = ind.sma_50.zip(ind.sma_200);
    let trending = ind.adx.map(|a| a > ADX_TREND_THRESHOLD);
    TrendSignals {
        golden_cross: cross.map(|(s50, s200)| s50 > s200),
        death_cross: cross.map(|(s50, s200)| s50 < s200),
        price_above_sma50: ind.sma_50.map(|s| price > s),
        price_below_sma50: ind.sma_50.map(|s| price < s),
        price_above_sma200: ind.sma_200.map(|s| price > s),
        price_below_sma200: ind.sma_200.map(|s| price < s),
        uptrend: cross
            .zip(trending)
            .map(|((s50, s200), t)| s50 > s200 && price > s50 && t),
        downtrend: cross
            .zip(trending)
            .map(|((s50, s200), t)| s50 < s200 && price < s50 && t),
    }
}

fn momentum_signals(ind: &TechnicalIndicators) -> MomentumSignals {
    let macd = ind.macd.zip(ind.macd_signal).zip(ind.macd_hist);
    let stoch = ind.stoch_k.zip(ind.stoch_d);
    MomentumSignals {
        macd_bullish: macd.map(|((m, s), h)| m > s && h > 0.0),
        macd_bearish: macd.map(|((m, s), h)| m < s && h < 0.0),
        stoch_overbought: stoch.map(|(k, d)| k > STOCH_OVERBOUGHT && d > STOCH_OVERBOUGHT),
        stoch_oversold: stoch.map(|(k, d)| k < STOCH_OVERSOLD && d < STOCH_OVERSOLD),
        stoch_bullish_crossover: stoch.map(|(k, d)| k > d && k < STOCH_OVERSOLD),
        stoch_bearish_crossover: stoch.map(|(k, d)| k < d && k > STOCH_OVERBOUGHT),
        cci_overbought: ind.cci.map(|c| c > CCI_BAND),
        cci_oversold: ind.cci.map(|c| c < -CCI_BAND),
        mfi_overbought: ind.mfi.map(|m| m > MFI_OVERBOUGHT),
        mfi_oversold: ind.mfi.map(|m| m < MFI_OVERSOLD),
    }
}

fn volatility_signals(ind: &TechnicalIndicators, bars: &[Bar], price: f64) -> VolatilitySignals {
    let mut signals = VolatilitySignals::default();
    let close = data::closes(bars);

    if let (Some(upper), Some(middle), Some(lower)) = (ind.bb_upper, ind.bb_middle, ind.bb_lower) {
        signals.price_above_upper_band = Some(price > upper);
        signals.price_below_lower_band = Some(price < lower);
        signals.price_above_middle_band = Some(price > middle);
        signals.price_below_middle_band = Some(price < middle);

        if close.len() > SQUEEZE_LOOKBACK && middle != 0.0 {
            let bb = math::bollinger(&close, 20, 2.0);
            let i = close.len() - SQUEEZE_LOOKBACK;
            let previous = (bb.upper[i] - bb.lower[i]) / middle;
            let current = (upper - lower) / middle;
            if previous.is_finite() {
                signals.bollinger_squeeze = Some(current < previous * SQUEEZE_RATIO);
            }
        }
    }

    if let Some(atr) = ind.atr {
        if bars.len() > 14 {
            let series = math::atr(&data::highs(bars), &data::lows(bars), &close, 14);
            if let Some(mean) = math::last_finite(&math::sma(&series, 14)) {
                signals.increased_volatility = Some(atr > mean * 1.5);
                signals.decreased_volatility = Some(atr < mean * 0.5);
            }
        }
    }

    signals
}

// ============================================================================
// Engine
// ============================================================================

/// Stateless technical analysis over daily bars.
#[derive(Debug, Clone, Default)]
pub struct TechnicalAnalysisEngine;

impl TechnicalAnalysisEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn analyze(&self, symbol: &str, bars: &[Bar], now: DateTime<Utc>) -> TechnicalSnapshot {
        let indicators = latest_indicators(bars);
        let last_close = bars.last().map(|b| b.close).filter(|c| c.is_finite());

        let signals = match last_close {
            Some(price) => TechnicalSignals {
                trend: trend_signals(&indicators, price),
                momentum: momentum_signals(&indicators),
                volatility: volatility_signals(&indicators, bars, price),
            },
            None => TechnicalSignals::default(),
        };

        let snapshot = TechnicalSnapshot {
            symbol: symbol.to_string(),
            last_close,
            bars_used: bars.len(),
            support_resistance: support_resistance(bars, SR_PERIODS),
            fibonacci: fibonacci(bars),
            indicators,
            signals,
            analyzed_at: now,
        };

        debug!(
            symbol = %symbol,
            bars = bars.len(),
            supports = snapshot.support_resistance.support.len(),
            resistances = snapshot.support_resistance.resistance.len(),
            "Technical analysis complete"
        );
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn daily(closes: &[f64]) -> Vec<Bar> {
        let start = Utc.with_ymd_and_hms(2023, 1, 2, 15, 0, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar {
                symbol: "ASELS".into(),
                timestamp: start + Duration::days(i as i64),
                open: c,
                high: c + 1.0,
                low: c - 1.0,
                close: c,
                volume: 10_000.0 + (i % 5) as f64 * 1000.0,
            })
            .collect()
    }

    #[test]
    fn test_support_resistance_needs_periods() {
        let bars = daily(&[10.0; 10]);
        assert_eq!(support_resistance(&bars, 14), SupportResistance::default());
    }

    #[test]
    fn test_support_resistance_extrema() {
        // zig-zag: local minima at 9 and local maxima at 12
        let closes: Vec<f64> = (0..20).map(|i| if i % 2 == 0 { 10.0 } else { 12.0 }).collect();
        let sr = support_resistance(&daily(&closes), 14);
        // lows alternate 9/11, highs alternate 11/13
        assert_eq!(sr.support, vec![9.0]);
        assert_eq!(sr.resistance, vec![13.0]);
    }

    #[test]
    fn test_fibonacci_levels() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        let fib = fibonacci(&daily(&closes)).unwrap();
        assert_eq!(fib.trend, TrendDirection::Up);
        assert_eq!(fib.high, 130.0);
        assert_eq!(fib.low, 99.0);
        assert_eq!(fib.levels[0], (0.0, 130.0));
        assert_eq!(fib.levels[6], (1.0, 99.0));
        assert!((fib.levels[3].1 - 114.5).abs() < 1e-9);

        assert!(fibonacci(&daily(&closes[..19])).is_none());
    }

    #[test]
    fn test_long_uptrend_signals() {
        let closes: Vec<f64> = (0..260).map(|i| 50.0 + i as f64 * 0.5).collect();
        let snap = TechnicalAnalysisEngine::new().analyze("ASELS", &daily(&closes), Utc::now());

        assert!(snap.indicators.sma_200.is_some());
        assert_eq!(snap.signals.trend.golden_cross, Some(true));
        assert_eq!(snap.signals.trend.death_cross, Some(false));
        assert_eq!(snap.signals.trend.price_above_sma50, Some(true));
        assert!(snap.signals.momentum.macd_bullish.is_some());
        assert_eq!(snap.bars_used, 260);
    }

    #[test]
    fn test_short_history_leaves_long_averages_undefined() {
        let closes: Vec<f64> = (0..30).map(|i| 20.0 + (i as f64).sin()).collect();
        let snap = TechnicalAnalysisEngine::new().analyze("ASELS", &daily(&closes), Utc::now());
        assert!(snap.indicators.sma_50.is_none());
        assert!(snap.signals.trend.golden_cross.is_none());
        assert!(snap.signals.trend.uptrend.is_none());
        assert!(snap.indicators.ema_20.is_some());
    }

    #[test]
    fn test_empty_history() {
        let snap = TechnicalAnalysisEngine::new().analyze("ASELS", &[], Utc::now());
        assert!(snap.last_close.is_none());
        assert_eq!(snap.signals, TechnicalSignals::default());
        assert!(snap.fibonacci.is_none());
    }
}
