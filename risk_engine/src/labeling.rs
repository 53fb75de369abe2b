//! Volatility-tier labels.
//!
//! Cut points are the 33rd and 66th percentiles of whatever volatility
//! column is passed in, so they move every time the model is retrained on
//! a newer window. They are returned next to the labels for that reason.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{error::RiskError, features::{Feature, FeatureFrame}};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub const COUNT: usize = 3;
    pub const ALL: [RiskLevel; 3] = [RiskLevel::Low, RiskLevel::Medium, RiskLevel::High];

    /// Class index used by the classifier.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(idx: usize) -> Option<Self> {
        Self::ALL.get(idx).copied()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub q33: f64,
    pub q66: f64,
}

impl Thresholds {
    pub fn classify(&self, volatility: f64) -> RiskLevel {
        if volatility > self.q66 {
            RiskLevel::High
        } else if volatility > self.q33 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Labels {
    pub levels: Vec<RiskLevel>,
    pub thresholds: Thresholds,
}

impl Labels {
    pub fn indices(&self) -> Vec<usize> {
        self.levels.iter().map(|l| l.index()).collect()
    }
}

/// Linear-interpolated quantile of an ascending slice.
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Labels every value; non-finite values are ignored when computing the
/// cut points and labelled `Low`.
pub fn label_volatility(values: &[f64]) -> Result<Labels, RiskError> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    sorted.sort_by(f64::total_cmp);

    let (Some(q33), Some(q66)) = (quantile(&sorted, 0.33), quantile(&sorted, 0.66)) else {
        return Err(RiskError::Labeling("no finite volatility values".into()));
    };
    let thresholds = Thresholds { q33, q66 };
    Ok(Labels {
        levels: values.iter().map(|v| thresholds.classify(*v)).collect(),
        thresholds,
    })
}

pub fn label_frame(frame: &FeatureFrame) -> Result<Labels, RiskError> {
    let vol = frame
        .column(Feature::Volatility)
        .ok_or_else(|| RiskError::Labeling("frame has no Volatility column".into()))?;
    label_volatility(vol)
}
