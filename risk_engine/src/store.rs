//! On-disk cache of trained risk models, one set of files per ticker:
//!
//! - `{ticker}_risk_model.bin`: bincode-encoded [`RandomForest`]
//! - `{ticker}_scaler.bin`: bincode-encoded [`StandardScaler`]
//! - `{ticker}_model_metrics.json`: [`ModelMetrics`]
//!
//! Writes overwrite unconditionally and are not coordinated between
//! processes; the last writer wins.

use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;
use tracing::{debug, info};

use crate::{
    config::RiskConfig,
    forest::{ForestParams, RandomForest},
    scaler::StandardScaler,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to create models directory {path}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{kind} file {path} not found")]
    NotFound { kind: &'static str, path: PathBuf },

    #[error("failed to access {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode {path}")]
    Encode {
        path: PathBuf,
        #[source]
        source: bincode::error::EncodeError,
    },

    #[error("failed to decode {path}")]
    Decode {
        path: PathBuf,
        #[source]
        source: bincode::error::DecodeError,
    },

    #[error("malformed metrics file {path}")]
    Metrics {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("metrics for {ticker} do not list features_used")]
    MissingFeatureList { ticker: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub cv_accuracy_mean: f64,
    pub cv_accuracy_std: f64,
    pub best_params: ForestParams,
    pub feature_importance: IndexMap<String, f64>,
    /// Column names the model was fit on, in input order. Names this build
    /// does not compute are kept so the analyzer can report them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features_used: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_accuracy: Option<f64>,
}

/// Everything needed to classify a new row.
#[derive(Debug, Clone)]
pub struct RiskArtifact {
    pub classifier: RandomForest,
    pub scaler: StandardScaler,
    pub features_used: Vec<String>,
    pub metrics: ModelMetrics,
}

#[derive(Debug, Clone)]
pub struct RiskModelStore {
    dir: PathBuf,
    max_age: Duration,
}

impl RiskModelStore {
    /// Opens (and creates if needed) the models directory.
    pub fn open(dir: impl Into<PathBuf>, max_age: Duration) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| StoreError::CreateDir {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir, max_age })
    }

    pub fn from_config(cfg: &RiskConfig) -> Result<Self, StoreError> {
        Self::open(&cfg.models_dir, cfg.max_model_age())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn model_path(&self, ticker: &str) -> PathBuf {
        self.dir.join(format!("{ticker}_risk_model.bin"))
    }

    pub fn scaler_path(&self, ticker: &str) -> PathBuf {
        self.dir.join(format!("{ticker}_scaler.bin"))
    }

    pub fn metrics_path(&self, ticker: &str) -> PathBuf {
        self.dir.join(format!("{ticker}_model_metrics.json"))
    }

    /// True when the classifier file is missing, unreadable, or older than
    /// the maximum age.
    pub fn should_retrain(&self, ticker: &str) -> bool {
        let path = self.model_path(ticker);
        let modified = match fs::metadata(&path).and_then(|m| m.modified()) {
            Ok(t) => t,
            Err(err) => {
                debug!(path = %path.display(), %err, "no usable model file");
                return true;
            }
        };
        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO);
        age > self.max_age
    }

    pub fn save(&self, ticker: &str, artifact: &RiskArtifact) -> Result<(), StoreError> {
        write_blob(&self.model_path(ticker), &artifact.classifier)?;
        write_blob(&self.scaler_path(ticker), &artifact.scaler)?;

        let path = self.metrics_path(ticker);
        let json = serde_json::to_string_pretty(&artifact.metrics).map_err(|source| {
            StoreError::Metrics {
                path: path.clone(),
                source,
            }
        })?;
        fs::write(&path, json).map_err(|source| StoreError::Io { path, source })?;

        info!(ticker, dir = %self.dir.display(), "saved risk model");
        Ok(())
    }

    pub fn load_metrics(&self, ticker: &str) -> Result<ModelMetrics, StoreError> {
        let path = self.metrics_path(ticker);
        let text = read(&path, "metrics")?;
        serde_json::from_slice(&text).map_err(|source| StoreError::Metrics { path, source })
    }

    pub fn load_model_and_scaler(
        &self,
        ticker: &str,
    ) -> Result<(RandomForest, StandardScaler), StoreError> {
        let classifier = read_blob(&self.model_path(ticker), "model")?;
        let scaler = read_blob(&self.scaler_path(ticker), "scaler")?;
        Ok((classifier, scaler))
    }

    /// Loads all three files. Fails with [`StoreError::MissingFeatureList`]
    /// when the metrics do not record which features the model was fit on.
    pub fn load(&self, ticker: &str) -> Result<RiskArtifact, StoreError> {
        let (classifier, scaler) = self.load_model_and_scaler(ticker)?;
        let metrics = self.load_metrics(ticker)?;
        let features_used = metrics
            .features_used
            .clone()
            .ok_or_else(|| StoreError::MissingFeatureList {
                ticker: ticker.to_string(),
            })?;
        Ok(RiskArtifact {
            classifier,
            scaler,
            features_used,
            metrics,
        })
    }
}

fn read(path: &Path, kind: &'static str) -> Result<Vec<u8>, StoreError> {
    fs::read(path).map_err(|source| match source.kind() {
        ErrorKind::NotFound => StoreError::NotFound {
            kind,
            path: path.to_path_buf(),
        },
        _ => StoreError::Io {
            path: path.to_path_buf(),
            source,
        },
    })
}

fn write_blob<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let bytes = bincode::serde::encode_to_vec(value, bincode::config::standard()).map_err(
        |source| StoreError::Encode {
            path: path.to_path_buf(),
            source,
        },
    )?;
    fs::write(path, bytes).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn read_blob<T: DeserializeOwned>(path: &Path, kind: &'static str) -> Result<T, StoreError> {
    let bytes = read(path, kind)?;
    let (value, _) = bincode::serde::decode_from_slice(&bytes, bincode::config::standard())
        .map_err(|source| StoreError::Decode {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(value)
}
