//! Input/output contract of the next-close sequence predictor.
//!
//! The model itself is external. It sees the last [`LOOKBACK`] bars as
//! min-max scaled `Open, High, Low, Close, Volume` rows and answers with a
//! scaled close, which is mapped back to price units here.

use market_data_ingestor::models::bar::{Bar, BarSeries};
use thiserror::Error;
use tracing::debug;

pub const LOOKBACK: usize = 60;
pub const FEATURE_COLS: [&str; 5] = ["Open", "High", "Low", "Close", "Volume"];
pub const TARGET_COL: &str = "Close";
/// Position of the close within a feature row.
pub const CLOSE_INDEX: usize = 3;

pub type Row = [f64; FEATURE_COLS.len()];

#[derive(Debug, Error, PartialEq)]
pub enum ForecastError {
    #[error("need at least {needed} complete bars, got {got}")]
    NotEnoughBars { needed: usize, got: usize },

    #[error("cannot fit a scaler on no rows")]
    Empty,

    #[error("expected {expected} columns, got {got}")]
    Width { expected: usize, got: usize },

    #[error("sequence model failed: {0}")]
    Model(String),
}

/// Per-column scaling to `[0, 1]`. A constant column maps to 0.
#[derive(Debug, Clone, PartialEq)]
pub struct MinMaxScaler {
    min: Vec<f64>,
    max: Vec<f64>,
}

impl MinMaxScaler {
    pub fn fit<R: AsRef<[f64]>>(rows: &[R]) -> Result<Self, ForecastError> {
        let first = rows.first().ok_or(ForecastError::Empty)?.as_ref();
        let mut min = first.to_vec();
        let mut max = first.to_vec();
        for row in rows {
            let row = row.as_ref();
            if row.len() != min.len() {
                return Err(ForecastError::Width {
                    expected: min.len(),
                    got: row.len(),
                });
            }
            for (j, &v) in row.iter().enumerate() {
                min[j] = min[j].min(v);
                max[j] = max[j].max(v);
            }
        }
        Ok(Self { min, max })
    }

    pub fn width(&self) -> usize {
        self.min.len()
    }

    fn range(&self, col: usize) -> f64 {
        let r = self.max[col] - self.min[col];
        if r == 0.0 { 1.0 } else { r }
    }

    pub fn transform(&self, row: &[f64]) -> Result<Vec<f64>, ForecastError> {
        if row.len() != self.width() {
            return Err(ForecastError::Width {
                expected: self.width(),
                got: row.len(),
            });
        }
        Ok(row
            .iter()
            .enumerate()
            .map(|(j, v)| (v - self.min[j]) / self.range(j))
            .collect())
    }

    /// Maps a scaled value of column `col` back to original units.
    pub fn inverse(&self, col: usize, scaled: f64) -> Option<f64> {
        (col < self.width()).then(|| scaled * self.range(col) + self.min[col])
    }
}

/// Produces a scaled next close from a window of scaled feature rows.
pub trait SequenceModel {
    fn predict(&self, window: &[Row]) -> Result<f64, ForecastError>;
}

fn feature_row(bar: &Bar) -> Row {
    [bar.open, bar.high, bar.low, bar.close, bar.volume]
}

fn complete_rows(series: &BarSeries) -> Vec<Row> {
    let mut series = series.clone();
    series.bars.retain(Bar::is_complete);
    series.normalize_order();
    series.bars.iter().map(feature_row).collect()
}

/// Scales the whole history over the feature columns plus a trailing copy
/// of the target, and returns the last [`LOOKBACK`] rows of features with
/// the fitted scaler. The target column is last, at index `FEATURE_COLS.len()`.
pub fn prepare_input(series: &BarSeries) -> Result<(Vec<Row>, MinMaxScaler), ForecastError> {
    let rows = complete_rows(series);
    if rows.len() < LOOKBACK {
        return Err(ForecastError::NotEnoughBars {
            needed: LOOKBACK,
            got: rows.len(),
        });
    }

    let with_target: Vec<Vec<f64>> = rows
        .iter()
        .map(|r| {
            let mut v = r.to_vec();
            v.push(r[CLOSE_INDEX]);
            v
        })
        .collect();
    let scaler = MinMaxScaler::fit(&with_target)?;

    let mut window = Vec::with_capacity(LOOKBACK);
    for row in &with_target[with_target.len() - LOOKBACK..] {
        let scaled = scaler.transform(row)?;
        let mut out = [0.0; FEATURE_COLS.len()];
        out.copy_from_slice(&scaled[..FEATURE_COLS.len()]);
        window.push(out);
    }
    Ok((window, scaler))
}

pub fn inverse_prediction(scaled: f64, scaler: &MinMaxScaler) -> Result<f64, ForecastError> {
    scaler
        .inverse(FEATURE_COLS.len(), scaled)
        .ok_or(ForecastError::Width {
            expected: FEATURE_COLS.len() + 1,
            got: scaler.width(),
        })
}

/// Next-close estimate in price units.
pub fn predict_next_close(model: &dyn SequenceModel, series: &BarSeries) -> Result<f64, ForecastError> {
    let (window, scaler) = prepare_input(series)?;
    let scaled = model.predict(&window)?;
    let close = inverse_prediction(scaled, &scaler)?;
    debug!(symbol = %series.symbol, scaled, close, "predicted next close");
    Ok(close)
}

/// Supervised windows: each input is `seq_len` consecutive rows and its
/// target is the close of the row that follows.
pub fn create_sequences(data: &[Row], seq_len: usize) -> (Vec<Vec<Row>>, Vec<f64>) {
    if seq_len == 0 {
        return (Vec::new(), Vec::new());
    }
    (seq_len..data.len())
        .map(|i| (data[i - seq_len..i].to_vec(), data[i][CLOSE_INDEX]))
        .unzip()
}

/// Scaled rows and sequences for fitting a model on `series`, with the
/// scaler that produced them.
pub fn training_windows(
    series: &BarSeries,
    seq_len: usize,
) -> Result<(Vec<Vec<Row>>, Vec<f64>, MinMaxScaler), ForecastError> {
    let rows = complete_rows(series);
    if rows.len() <= seq_len {
        return Err(ForecastError::NotEnoughBars {
            needed: seq_len + 1,
            got: rows.len(),
        });
    }
    let scaler = MinMaxScaler::fit(&rows)?;
    let scaled = rows
        .iter()
        .map(|r| {
            let v = scaler.transform(r)?;
            let mut out = [0.0; FEATURE_COLS.len()];
            out.copy_from_slice(&v);
            Ok(out)
        })
        .collect::<Result<Vec<Row>, ForecastError>>()?;
    let (x, y) = create_sequences(&scaled, seq_len);
    Ok((x, y, scaler))
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use market_data_ingestor::models::timeframe::TimeFrame;

    use super::*;

    fn series(n: usize) -> BarSeries {
        let origin = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let bars = (0..n)
            .map(|i| {
                let c = 50.0 + i as f64;
                Bar::ohlcv(origin + Duration::days(i as i64), c - 0.5, c + 1.0, c - 1.0, c, 1_000.0 + i as f64)
            })
            .collect();
        BarSeries::new("TEST", TimeFrame::day(), bars)
    }

    /// Echoes the scaled close of the newest row.
    struct Persistence;

    impl SequenceModel for Persistence {
        fn predict(&self, window: &[Row]) -> Result<f64, ForecastError> {
            window
                .last()
                .map(|r| r[CLOSE_INDEX])
                .ok_or_else(|| ForecastError::Model("empty window".into()))
        }
    }

    #[test]
    fn window_is_last_lookback_rows_scaled() {
        let (window, scaler) = prepare_input(&series(100)).unwrap();
        assert_eq!(window.len(), LOOKBACK);
        assert_eq!(scaler.width(), FEATURE_COLS.len() + 1);
        let last = window.last().unwrap();
        assert!((last[CLOSE_INDEX] - 1.0).abs() < 1e-12);
        assert!(window.iter().flatten().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn persistence_model_predicts_last_close() {
        let close = predict_next_close(&Persistence, &series(80)).unwrap();
        assert!((close - 129.0).abs() < 1e-9);
    }

    #[test]
    fn short_history_is_rejected() {
        assert_eq!(
            prepare_input(&series(59)).unwrap_err(),
            ForecastError::NotEnoughBars { needed: 60, got: 59 }
        );
    }

    #[test]
    fn sequences_target_the_following_close() {
        let rows: Vec<Row> = (0..5).map(|i| [0.0, 0.0, 0.0, i as f64, 0.0]).collect();
        let (x, y) = create_sequences(&rows, 3);
        assert_eq!(x.len(), 2);
        assert_eq!(y, vec![3.0, 4.0]);
        assert_eq!(x[1][0][CLOSE_INDEX], 1.0);
        assert!(create_sequences(&rows, 5).0.is_empty());
    }

    #[test]
    fn constant_columns_scale_to_zero() {
        let scaler = MinMaxScaler::fit(&[vec![1.0, 5.0], vec![3.0, 5.0]]).unwrap();
        assert_eq!(scaler.transform(&[2.0, 5.0]).unwrap(), vec![0.5, 0.0]);
        assert_eq!(scaler.inverse(0, 0.5), Some(2.0));
        assert_eq!(scaler.inverse(2, 0.5), None);
        assert!(MinMaxScaler::fit::<Vec<f64>>(&[]).is_err());
    }

    #[test]
    fn training_windows_cover_history() {
        let (x, y, scaler) = training_windows(&series(70), LOOKBACK).unwrap();
        assert_eq!(x.len(), 10);
        assert_eq!(y.len(), 10);
        assert_eq!(scaler.width(), FEATURE_COLS.len());
        assert!((y[9] - 1.0).abs() < 1e-12);
    }
}
