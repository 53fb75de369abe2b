use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ScalerError {
    #[error("cannot fit a scaler on zero rows")]
    Empty,

    #[error("expected {expected} columns, got {got}")]
    Width { expected: usize, got: usize },
}

/// Per-column standardisation `(x - mean) / std`, with population std.
/// Constant columns get a scale of 1 so they map to zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(rows: &[Vec<f64>]) -> Result<Self, ScalerError> {
        let first = rows.first().ok_or(ScalerError::Empty)?;
        let width = first.len();
        if let Some(bad) = rows.iter().find(|r| r.len() != width) {
            return Err(ScalerError::Width {
                expected: width,
                got: bad.len(),
            });
        }

        let n = rows.len() as f64;
        let mut mean = vec![0.0; width];
        for row in rows {
            for (m, v) in mean.iter_mut().zip(row) {
                *m += v / n;
            }
        }
        let mut var = vec![0.0; width];
        for row in rows {
            for ((s, v), m) in var.iter_mut().zip(row).zip(&mean) {
                *s += (v - m).powi(2) / n;
            }
        }
        let scale = var
            .into_iter()
            .map(|v| {
                let sd = v.sqrt();
                if sd == 0.0 || !sd.is_finite() { 1.0 } else { sd }
            })
            .collect();
        Ok(Self { mean, scale })
    }

    pub fn width(&self) -> usize {
        self.mean.len()
    }

    /// Training mean of column `col`; it scales to zero.
    pub fn mean(&self, col: usize) -> Option<f64> {
        self.mean.get(col).copied()
    }

    pub fn transform_row(&self, row: &[f64]) -> Result<Vec<f64>, ScalerError> {
        if row.len() != self.width() {
            return Err(ScalerError::Width {
                expected: self.width(),
                got: row.len(),
            });
        }
        Ok(row
            .iter()
            .zip(&self.mean)
            .zip(&self.scale)
            .map(|((v, m), s)| (v - m) / s)
            .collect())
    }

    pub fn transform(&self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, ScalerError> {
        rows.iter().map(|r| self.transform_row(r)).collect()
    }
}
