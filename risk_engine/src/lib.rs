//! Volatility-tier risk classification for a single ticker.
//!
//! Bars from [`market_data_ingestor`] flow through preprocessing, indicator
//! engineering, quantile labeling, and a random-forest classifier that is
//! trained on demand and cached on disk. The [`analyzer`] stitches these
//! together and renders a JSON-ready [`report`].

pub mod analyzer;
pub mod config;
pub mod cv;
pub mod error;
pub mod features;
pub mod forest;
pub mod indicators;
pub mod labeling;
pub mod preprocess;
pub mod recommend;
pub mod report;
pub mod scaler;
pub mod search;
pub mod signals;
pub mod store;
pub mod trainer;

pub use analyzer::{AnalysisOutcome, RiskAnalyzer};
pub use config::RiskConfig;
pub use error::RiskError;
