//! Market data for BIST equities.
//!
//! Provides the bar model, the data source abstraction, schema normalization,
//! session-hour utilities, pacing and the per-cycle bar cache.
//!
//! # Data Sources
//! - **Yahoo chart API** (default): daily and hourly bars, symbols suffixed `.IS`

pub mod cache;
pub mod normalize;
pub mod provider;
pub mod rate_limiter;
pub mod retry;
pub mod session;
pub mod yahoo;

pub use cache::{CycleCache, CycleId};
pub use normalize::{normalize, RawSeries};
pub use provider::{MarketDataSource, ProviderError};
pub use rate_limiter::{shared_limiter, RateLimiter, SharedRateLimiter};
pub use retry::RetryPolicy;
pub use yahoo::YahooChartSource;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Core Data Types
// ============================================================================

/// Granularity of a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interval {
    /// One bar per trading day
    Daily,
    /// One bar per trading hour
    Hourly,
}

impl Interval {
    /// Interval string understood by the chart API
    pub fn to_api_interval(&self) -> &'static str {
        match self {
            Self::Daily => "1d",
            Self::Hourly => "1h",
        }
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.to_api_interval())
    }
}

/// One OHLCV bar. Missing OHLV values are NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// Typical price (H+L+C)/3
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    /// True when high, low and close are all finite
    pub fn has_finite_hlc(&self) -> bool {
        self.high.is_finite() && self.low.is_finite() && self.close.is_finite()
    }
}

/// Half-open time range `[start, end)` for a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl FetchRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// The `days` calendar days ending at `now`.
    pub fn last_days(now: DateTime<Utc>, days: u32) -> Self {
        Self {
            start: now - Duration::days(i64::from(days)),
            end: now,
        }
    }
}

/// Column views over a bar slice.
pub fn closes(bars: &[Bar]) -> Vec<f64> {
    bars.iter().map(|b| b.close).collect()
}

pub fn highs(bars: &[Bar]) -> Vec<f64> {
    bars.iter().map(|b| b.high).collect()
}

pub fn lows(bars: &[Bar]) -> Vec<f64> {
    bars.iter().map(|b| b.low).collect()
}

pub fn volumes(bars: &[Bar]) -> Vec<f64> {
    bars.iter().map(|b| b.volume).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_interval_api_strings() {
        assert_eq!(Interval::Daily.to_api_interval(), "1d");
        assert_eq!(Interval::Hourly.to_string(), "1h");
    }

    #[test]
    fn test_last_days_range() {
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap();
        let range = FetchRange::last_days(now, 30);
        assert_eq!(range.end, now);
        assert_eq!((range.end - range.start).num_days(), 30);
    }

    #[test]
    fn test_bar_typical_price() {
        let bar = Bar {
            symbol: "THYAO".into(),
            timestamp: Utc::now(),
            open: 10.0,
            high: 12.0,
            low: 9.0,
            close: 10.5,
            volume: 100.0,
        };
        assert!((bar.typical_price() - 10.5).abs() < 1e-12);
        assert!(bar.has_finite_hlc());
    }
}
