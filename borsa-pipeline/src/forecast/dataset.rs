//! Sliding-window sequence datasets.
//!
//! For N rows and sequence length L there are exactly N−L labelled examples:
//! example i covers rows [i, i+L) and targets row i+L. The final L rows form
//! the prediction window. Examples split 80/20 in time order. Scalers are
//! fitted on the rows the training examples touch and applied unchanged to
//! everything else.

use serde::{Deserialize, Serialize};

use super::frame::FeatureFrame;
use crate::error::{PipelineError, PipelineResult};

/// Share of labelled examples used for training.
pub const TRAIN_RATIO: f64 = 0.8;

/// One input window: `sequence_length` rows of feature values.
pub type Window = Vec<Vec<f64>>;

/// Per-column min-max scaler. Constant columns scale to zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinMaxScaler {
    min: Vec<f64>,
    max: Vec<f64>,
}

impl MinMaxScaler {
    /// Fit on rows of equal width.
    pub fn fit(rows: &[Vec<f64>]) -> Self {
        let width = rows.first().map_or(0, |r| r.len());
        let mut min = vec![f64::INFINITY; width];
        let mut max = vec![f64::NEG_INFINITY; width];
        for row in rows {
            for (j, &v) in row.iter().enumerate() {
                min[j] = min[j].min(v);
                max[j] = max[j].max(v);
            }
        }
        Self { min, max }
    }

    /// Fit a single column.
    pub fn fit_column(values: &[f64]) -> Self {
        let rows: Vec<Vec<f64>> = values.iter().map(|&v| vec![v]).collect();
        Self::fit(&rows)
    }

    pub fn width(&self) -> usize {
        self.min.len()
    }

    pub fn transform_value(&self, col: usize, v: f64) -> f64 {
        let range = self.max[col] - self.min[col];
        if range == 0.0 || !range.is_finite() {
            0.0
        } else {
            (v - self.min[col]) / range
        }
    }

    pub fn inverse_value(&self, col: usize, v: f64) -> f64 {
        let range = self.max[col] - self.min[col];
        if range == 0.0 || !range.is_finite() {
            self.min[col]
        } else {
            self.min[col] + v * range
        }
    }

    pub fn transform_row(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .enumerate()
            .map(|(j, &v)| self.transform_value(j, v))
            .collect()
    }
}

/// Position of one labelled example.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowIndex {
    /// First row of the window
    pub start: usize,
    /// Row holding the target
    pub target: usize,
}

/// All labelled windows over `n_rows` rows, stride 1.
pub fn build_windows(n_rows: usize, sequence_length: usize) -> Vec<WindowIndex> {
    if sequence_length == 0 || n_rows <= sequence_length {
        return Vec::new();
    }
    (0..n_rows - sequence_length)
        .map(|start| WindowIndex {
            start,
            target: start + sequence_length,
        })
        .collect()
}

/// Scaled, split training data for one symbol.
#[derive(Debug, Clone)]
pub struct SequenceDataset {
    pub feature_names: Vec<String>,
    pub sequence_length: usize,
    pub x_train: Vec<Window>,
    pub y_train: Vec<f64>,
    pub x_test: Vec<Window>,
    pub y_test: Vec<f64>,
    /// Most recent `sequence_length` rows, unlabelled
    pub x_predict: Window,
    pub feature_scaler: MinMaxScaler,
    pub target_scaler: MinMaxScaler,
    /// Unscaled target value of the last row
    pub last_target: f64,
}

impl SequenceDataset {
    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    /// Map a scaled model output back to price space.
    pub fn inverse_target(&self, scaled: f64) -> f64 {
        self.target_scaler.inverse_value(0, scaled)
    }
}

/// Builds `SequenceDataset`s from cleaned frames.
#[derive(Debug, Clone)]
pub struct SequenceDatasetBuilder {
    sequence_length: usize,
}

impl SequenceDatasetBuilder {
    pub fn new(sequence_length: usize) -> Self {
        Self { sequence_length }
    }

    pub fn sequence_length(&self) -> usize {
        self.sequence_length
    }

    pub fn build(
        &self,
        frame: &FeatureFrame,
        features: &[String],
        target: &str,
    ) -> PipelineResult<SequenceDataset> {
        let l = self.sequence_length;
        let n = frame.n_rows();
        let windows = build_windows(n, l);
        if windows.len() < 2 * l || l == 0 {
            return Err(PipelineError::InsufficientSequences {
                required: 2 * l.max(1),
                actual: windows.len(),
            });
        }

        let columns = features
            .iter()
            .map(|name| {
                frame.column(name).ok_or_else(|| {
                    PipelineError::SchemaMismatch(format!("feature column '{}' missing", name))
                })
            })
            .collect::<PipelineResult<Vec<&[f64]>>>()?;
        let target_col = frame.column(target).ok_or_else(|| {
            PipelineError::SchemaMismatch(format!("target column '{}' missing", target))
        })?;

        let rows: Vec<Vec<f64>> = (0..n)
            .map(|i| columns.iter().map(|c| c[i]).collect())
            .collect();

        let train_count = (windows.len() as f64 * TRAIN_RATIO).floor() as usize;
        let fit_end = train_count + l;

        let feature_scaler = MinMaxScaler::fit(&rows[..fit_end]);
        let target_scaler = MinMaxScaler::fit_column(&target_col[..fit_end]);

        let scaled: Vec<Vec<f64>> = rows.iter().map(|r| feature_scaler.transform_row(r)).collect();
        let window_at = |start: usize| -> Window { scaled[start..start + l].to_vec() };

        let mut x_train = Vec::with_capacity(train_count);
        let mut y_train = Vec::with_capacity(train_count);
        let mut x_test = Vec::with_capacity(windows.len() - train_count);
        let mut y_test = Vec::with_capacity(windows.len() - train_count);
        for (k, w) in windows.iter().enumerate() {
            let y = target_scaler.transform_value(0, target_col[w.target]);
            if k < train_count {
                x_train.push(window_at(w.start));
                y_train.push(y);
            } else {
                x_test.push(window_at(w.start));
                y_test.push(y);
            }
        }

        Ok(SequenceDataset {
            feature_names: features.to_vec(),
            sequence_length: l,
            x_train,
            y_train,
            x_test,
            y_test,
            x_predict: window_at(n - l),
            feature_scaler,
            target_scaler,
            last_target: target_col[n - 1],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn linear_frame(n: usize) -> FeatureFrame {
        let mut frame = FeatureFrame::new(vec![Utc::now(); n]);
        frame
            .push_column("Close", (0..n).map(|i| 100.0 + i as f64).collect())
            .unwrap();
        frame.push_column("Volume", vec![500.0; n]).unwrap();
        frame
    }

    #[test]
    fn test_window_count_and_targets() {
        let windows = build_windows(10, 3);
        assert_eq!(windows.len(), 7);
        assert_eq!(windows[0], WindowIndex { start: 0, target: 3 });
        assert_eq!(windows[6], WindowIndex { start: 6, target: 9 });
        assert!(build_windows(3, 3).is_empty());
    }

    #[test]
    fn test_insufficient_sequences() {
        let frame = linear_frame(20);
        let builder = SequenceDatasetBuilder::new(10);
        let err = builder
            .build(&frame, &["Close".into(), "Volume".into()], "Close")
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::InsufficientSequences { required: 20, actual: 10 }
        ));
    }

    #[test]
    fn test_split_and_scaling() {
        let frame = linear_frame(40);
        let features = vec!["Close".to_string(), "Volume".to_string()];
        let ds = SequenceDatasetBuilder::new(5).build(&frame, &features, "Close").unwrap();

        // 35 examples -> 28 train, 7 test
        assert_eq!(ds.x_train.len(), 28);
        assert_eq!(ds.x_test.len(), 7);
        assert_eq!(ds.x_predict.len(), 5);
        assert_eq!(ds.x_predict[0].len(), 2);

        // Scaler fitted on rows [0, 33): Close 100..=132
        assert_eq!(ds.x_train[0][0][0], 0.0);
        assert_eq!(ds.y_train[27], 1.0);
        assert!(ds.y_test[0] > 1.0);

        // Constant column scales to zero
        assert!(ds.x_train.iter().flatten().all(|row| row[1] == 0.0));

        assert!((ds.inverse_target(0.5) - 116.0).abs() < 1e-9);
        assert_eq!(ds.last_target, 139.0);
    }

    #[test]
    fn test_missing_target_column() {
        let frame = linear_frame(40);
        let err = SequenceDatasetBuilder::new(5)
            .build(&frame, &["Volume".into()], "Adj")
            .unwrap_err();
        assert!(matches!(err, PipelineError::SchemaMismatch(_)));
    }
}
