//! Feature frame construction and cleaning.
//!
//! A `FeatureFrame` is a time-ordered table of named numeric columns stored
//! column-major. `from_bars` derives the OHLCV and indicator columns used by
//! the forecasting models; `clean` makes the frame NaN-free.

use chrono::{DateTime, Utc};

use crate::data::{self, Bar};
use crate::error::{PipelineError, PipelineResult};
use crate::indicators::math;

/// Share of NaN above which a column is dropped during cleaning.
const MAX_NAN_RATIO: f64 = 0.5;

/// Time-ordered table of named numeric columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureFrame {
    timestamps: Vec<DateTime<Utc>>,
    names: Vec<String>,
    columns: Vec<Vec<f64>>,
}

impl FeatureFrame {
    pub fn new(timestamps: Vec<DateTime<Utc>>) -> Self {
        Self {
            timestamps,
            names: Vec::new(),
            columns: Vec::new(),
        }
    }

    /// Append a column; its length must match the row count.
    pub fn push_column(&mut self, name: impl Into<String>, values: Vec<f64>) -> PipelineResult<()> {
        let name = name.into();
        if values.len() != self.timestamps.len() {
            return Err(PipelineError::SchemaMismatch(format!(
                "column '{}' has {} values for {} rows",
                name,
                values.len(),
                self.timestamps.len()
            )));
        }
        if self.names.contains(&name) {
            return Err(PipelineError::SchemaMismatch(format!("duplicate column '{}'", name)));
        }
        self.names.push(name);
        self.columns.push(values);
        Ok(())
    }

    /// Build the model feature columns from hourly bars.
    pub fn from_bars(bars: &[Bar]) -> Self {
        let n = bars.len();
        let open: Vec<f64> = bars.iter().map(|b| b.open).collect();
        let high = data::highs(bars);
        let low = data::lows(bars);
        let close = data::closes(bars);
        let volume = data::volumes(bars);

        let macd = math::macd(&close, 12, 26, 9);
        let (stoch_k, stoch_d) = math::stochastic(&high, &low, &close, 14, 3);
        let bb = math::bollinger(&close, 20, 2.0);

        let mut cols: Vec<(String, Vec<f64>)> = vec![
            ("Open".into(), open),
            ("High".into(), high.clone()),
            ("Low".into(), low.clone()),
            ("Close".into(), close.clone()),
            ("Volume".into(), volume),
            ("RSI".into(), math::rsi(&close, 14)),
            ("MACD".into(), macd.line),
            ("MACD_Signal".into(), macd.signal),
            ("MACD_Hist".into(), macd.histogram),
            ("Stoch_K".into(), stoch_k),
            ("Stoch_D".into(), stoch_d),
            ("CCI".into(), math::cci(&high, &low, &close, 20, 0.015)),
            ("EMA_9".into(), math::ema(&close, 9)),
        ];
        for period in [9, 20, 50] {
            if n >= period {
                cols.push((format!("SMA_{}", period), math::sma(&close, period)));
            }
        }
        cols.extend([
            (String::from("BB_High"), bb.upper),
            (String::from("BB_Mid"), bb.middle),
            (String::from("BB_Low"), bb.lower),
            (String::from("BB_Width"), bb.width),
            (String::from("ATR"), math::atr(&high, &low, &close, 14)),
            (String::from("ROC"), math::roc(&close, 12)),
        ]);

        let (names, columns) = cols.into_iter().unzip();
        Self {
            timestamps: bars.iter().map(|b| b.timestamp).collect(),
            names,
            columns,
        }
    }

    pub fn n_rows(&self) -> usize {
        self.timestamps.len()
    }

    pub fn n_cols(&self) -> usize {
        self.names.len()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.columns[i].as_slice())
    }

    /// True when no value is NaN or infinite.
    pub fn is_clean(&self) -> bool {
        self.columns.iter().flatten().all(|v| v.is_finite())
    }

    /// Replace infinities, drop mostly-empty columns and fill the rest.
    ///
    /// Remaining gaps are forward filled, then backward filled, then set to
    /// the column mean, then to zero.
    pub fn clean(mut self) -> Self {
        let n = self.n_rows();
        for col in &mut self.columns {
            for v in col.iter_mut() {
                if v.is_infinite() {
                    *v = f64::NAN;
                }
            }
        }

        if n > 0 {
            let keep: Vec<bool> = self
                .columns
                .iter()
                .map(|col| {
                    let nan = col.iter().filter(|v| v.is_nan()).count();
                    (nan as f64 / n as f64) <= MAX_NAN_RATIO
                })
                .collect();
            let mut k = keep.iter();
            self.names.retain(|_| *k.next().unwrap_or(&true));
            let mut k = keep.iter();
            self.columns.retain(|_| *k.next().unwrap_or(&true));
        }

        for col in &mut self.columns {
            fill_column(col);
        }
        self
    }
}

fn fill_column(col: &mut [f64]) {
    let mut last = f64::NAN;
    for v in col.iter_mut() {
        if v.is_nan() {
            *v = last;
        } else {
            last = *v;
        }
    }
    let mut next = f64::NAN;
    for v in col.iter_mut().rev() {
        if v.is_nan() {
            *v = next;
        } else {
            next = *v;
        }
    }
    let fill = math::finite_mean(col).unwrap_or(0.0);
    for v in col.iter_mut() {
        if !v.is_finite() {
            *v = fill;
        }
    }
}
