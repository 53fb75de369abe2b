//! Runtime settings for the risk pipeline.
//!
//! Every field has a default, so an empty TOML file (or no file at all)
//! reproduces the stock behaviour. Example:
//!
//! ```toml
//! models_dir = "/var/lib/risk/models"
//! max_model_age_days = 7
//! lookback = "1y"
//! interval = "1d"
//!
//! [grid]
//! n_estimators = [100, 300, 700]
//! max_features = ["sqrt", "log2"]
//! criterion = ["gini", "entropy"]
//! ```

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use market_data_ingestor::{
    cache::DEFAULT_CAPACITY,
    models::period::{Interval, Lookback},
};
use serde::{Deserialize, Serialize};
use shared_utils::{
    config::{ConfigError, load_toml},
    env::env_path,
};

use crate::search::ParamGrid;

/// Overrides [`RiskConfig::models_dir`] when set and non-empty.
pub const MODELS_DIR_ENV: &str = "RISK_MODELS_DIR";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RiskConfig {
    /// Directory holding `{ticker}_risk_model.bin` and friends.
    pub models_dir: PathBuf,
    /// Models older than this are retrained.
    pub max_model_age_days: u64,
    pub lookback: Lookback,
    pub interval: Interval,
    /// Entries kept by the in-process bar cache.
    pub cache_capacity: usize,
    /// Seed for the train/test split, reporting CV and the forest.
    pub seed: u64,
    pub test_fraction: f64,
    pub cv_folds: usize,
    pub grid: ParamGrid,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            models_dir: PathBuf::from("models"),
            max_model_age_days: 7,
            lookback: Lookback::default(),
            interval: Interval::daily(),
            cache_capacity: DEFAULT_CAPACITY,
            seed: 42,
            test_fraction: 0.25,
            cv_folds: 5,
            grid: ParamGrid::default(),
        }
    }
}

impl RiskConfig {
    /// Reads a TOML file and applies environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let cfg: Self = load_toml(path)?;
        Ok(cfg.with_env_overrides())
    }

    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    pub fn with_env_overrides(mut self) -> Self {
        if let Some(dir) = env_path(MODELS_DIR_ENV) {
            self.models_dir = dir;
        }
        self
    }

    pub fn max_model_age(&self) -> Duration {
        Duration::from_secs(self.max_model_age_days * 24 * 60 * 60)
    }
}
