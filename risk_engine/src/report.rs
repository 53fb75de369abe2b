//! JSON result documents.
//!
//! Exactly one document is produced per analysis: either a [`RiskReport`]
//! or an [`ErrorReport`]. Prices and percentages are pre-formatted strings
//! with two decimals; `latest_close` stays numeric.

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::{
    features::Feature,
    labeling::RiskLevel,
    signals::{BandPosition, MacdSignal, PricePosition, RsiStatus, StochasticSignal, Trend},
};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn format_timestamp(at: DateTime<Local>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskReport {
    pub risk_level: RiskLevel,
    pub current_price: String,
    pub volatility: String,
    pub daily_return: String,
    pub latest_close: f64,
    pub trend: Trend,
    pub rsi_status: RsiStatus,
    pub rsi_value: String,
    pub macd_signal: MacdSignal,
    pub price_position: PricePosition,
    pub confidence_score: String,
    pub bollinger_band_position: BandPosition,
    pub stochastic_signal: StochasticSignal,
    pub recommendations: Vec<String>,
    pub analysis_timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorReport {
    pub error: String,
    pub ticker: String,
    pub analysis_timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AnalysisDocument {
    Report(Box<RiskReport>),
    Error(ErrorReport),
}

impl AnalysisDocument {
    pub fn error(ticker: &str, message: impl Into<String>, at: DateTime<Local>) -> Self {
        AnalysisDocument::Error(ErrorReport {
            error: message.into(),
            ticker: ticker.to_string(),
            analysis_timestamp: format_timestamp(at),
        })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, AnalysisDocument::Error(_))
    }

    pub fn as_report(&self) -> Option<&RiskReport> {
        match self {
            AnalysisDocument::Report(r) => Some(r),
            AnalysisDocument::Error(_) => None,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

pub fn money(v: f64) -> String {
    format!("{v:.2}")
}

/// Fraction rendered as a percentage, `0.0123` -> `"1.23%"`.
pub fn percent(v: f64) -> String {
    format!("{:.2}%", v * 100.0)
}

/// A silent fallback the analyzer took instead of failing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PolicyDecision {
    /// The stored metrics did not name their features; the default set
    /// was assumed.
    DefaultFeatureSet { features: Vec<Feature> },
    /// Columns the model expects that the current frame lacks; they were
    /// filled with their training means.
    DroppedFeatures { features: Vec<String> },
    /// Model was (re)trained, with the reason.
    Retrained { reason: String },
}
