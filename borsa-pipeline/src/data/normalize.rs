//! Schema normalization from raw columnar market data onto `Bar`.
//!
//! Column names are resolved through an explicit alias table matched
//! case-insensitively after trimming. A close column is mandatory; other
//! fields fill with NaN when absent. Output rows are sorted ascending by
//! timestamp with duplicate timestamps collapsed to the last occurrence.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use super::Bar;
use crate::error::{PipelineError, PipelineResult};

/// Columnar series as delivered by a data source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSeries {
    pub timestamps: Vec<DateTime<Utc>>,
    /// Column name and values, in source order
    pub columns: Vec<(String, Vec<Option<f64>>)>,
}

impl RawSeries {
    pub fn new(timestamps: Vec<DateTime<Utc>>) -> Self {
        Self {
            timestamps,
            columns: Vec::new(),
        }
    }

    /// Add a column.
    pub fn with_column(mut self, name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        self.columns.push((name.into(), values));
        self
    }

    /// Build a canonical series from already-formed bars.
    pub fn from_bars(bars: &[Bar]) -> Self {
        let col = |f: fn(&Bar) -> f64| bars.iter().map(|b| Some(f(b))).collect::<Vec<_>>();
        Self::new(bars.iter().map(|b| b.timestamp).collect())
            .with_column("Open", col(|b| b.open))
            .with_column("High", col(|b| b.high))
            .with_column("Low", col(|b| b.low))
            .with_column("Close", col(|b| b.close))
            .with_column("Volume", col(|b| b.volume))
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Open,
    High,
    Low,
    Close,
    Volume,
}

const ALIASES: &[(Field, &[&str])] = &[
    (Field::Open, &["open", "o", "open_price", "opening_price"]),
    (Field::High, &["high", "h", "high_price"]),
    (Field::Low, &["low", "l", "low_price"]),
    (Field::Close, &["close", "c", "close_price", "closing_price", "last"]),
    (Field::Volume, &["volume", "v", "vol"]),
];

fn resolve(name: &str) -> Option<Field> {
    let key = name.trim().to_ascii_lowercase();
    ALIASES
        .iter()
        .find(|(_, names)| names.contains(&key.as_str()))
        .map(|(field, _)| *field)
}

/// Map a raw series onto ordered, deduplicated bars.
///
/// Rows without a finite close are dropped.
pub fn normalize(symbol: &str, raw: &RawSeries) -> PipelineResult<Vec<Bar>> {
    let n = raw.timestamps.len();
    let mut resolved: [Option<&Vec<Option<f64>>>; 5] = [None; 5];

    for (name, values) in &raw.columns {
        let Some(field) = resolve(name) else {
            continue;
        };
        if values.len() != n {
            return Err(PipelineError::SchemaMismatch(format!(
                "{}: column '{}' has {} values for {} timestamps",
                symbol,
                name,
                values.len(),
                n
            )));
        }
        let slot = &mut resolved[field as usize];
        if slot.is_some() {
            return Err(PipelineError::SchemaMismatch(format!(
                "{}: more than one column maps to {:?}",
                symbol, field
            )));
        }
        *slot = Some(values);
    }

    let close = resolved[Field::Close as usize].ok_or_else(|| {
        PipelineError::SchemaMismatch(format!("{}: no close column", symbol))
    })?;

    let value = |field: Field, i: usize| -> f64 {
        resolved[field as usize]
            .and_then(|col| col[i])
            .unwrap_or(f64::NAN)
    };

    let mut rows: BTreeMap<DateTime<Utc>, Bar> = BTreeMap::new();
    for (i, ts) in raw.timestamps.iter().enumerate() {
        let c = close[i].unwrap_or(f64::NAN);
        if !c.is_finite() {
            continue;
        }
        rows.insert(
            *ts,
            Bar {
                symbol: symbol.to_string(),
                timestamp: *ts,
                open: value(Field::Open, i),
                high: value(Field::High, i),
                low: value(Field::Low, i),
                close: c,
                volume: value(Field::Volume, i),
            },
        );
    }

    Ok(rows.into_values().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 15, 0, 0).unwrap()
    }

    #[test]
    fn test_aliases_resolve_case_insensitively() {
        let raw = RawSeries::new(vec![ts(2), ts(3)])
            .with_column(" OPEN ", vec![Some(1.0), Some(2.0)])
            .with_column("c", vec![Some(1.5), Some(2.5)])
            .with_column("Vol", vec![Some(10.0), None]);
        let bars = normalize("THYAO", &raw).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].open, 1.0);
        assert_eq!(bars[1].close, 2.5);
        assert!(bars[1].volume.is_nan());
        assert!(bars[0].high.is_nan());
    }

    #[test]
    fn test_missing_close_is_schema_mismatch() {
        let raw = RawSeries::new(vec![ts(2)]).with_column("adj close", vec![Some(1.0)]);
        let err = normalize("THYAO", &raw).unwrap_err();
        assert!(matches!(err, PipelineError::SchemaMismatch(_)));
    }

    #[test]
    fn test_length_mismatch_is_schema_mismatch() {
        let raw = RawSeries::new(vec![ts(2), ts(3)]).with_column("close", vec![Some(1.0)]);
        assert!(matches!(
            normalize("THYAO", &raw),
            Err(PipelineError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_ambiguous_columns_rejected() {
        let raw = RawSeries::new(vec![ts(2)])
            .with_column("close", vec![Some(1.0)])
            .with_column("Close_Price", vec![Some(1.0)]);
        assert!(normalize("THYAO", &raw).is_err());
    }

    #[test]
    fn test_sorted_and_deduplicated() {
        let raw = RawSeries::new(vec![ts(4), ts(2), ts(4), ts(3)])
            .with_column("close", vec![Some(4.0), Some(2.0), Some(4.5), None]);
        let bars = normalize("THYAO", &raw).unwrap();
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        assert_eq!(closes, vec![2.0, 4.5]);
        assert!(bars.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }

    #[test]
    fn test_from_bars_round_trips_through_normalize() {
        let raw = RawSeries::new(vec![ts(2)])
            .with_column("Close", vec![Some(3.0)])
            .with_column("Volume", vec![Some(7.0)]);
        let bars = normalize("ASELS", &raw).unwrap();
        let again = normalize("ASELS", &RawSeries::from_bars(&bars)).unwrap();
        assert_eq!(again.len(), 1);
        assert_eq!(again[0].close, 3.0);
        assert_eq!(again[0].volume, 7.0);
    }
}
