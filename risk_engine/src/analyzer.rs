//! End-to-end risk assessment for one ticker.

use chrono::Local;
use market_data_ingestor::{
    accessor::MarketDataAccessor,
    cache::BarCache,
    models::period::{Interval, Lookback},
    providers::DataProvider,
};
use tracing::{debug, error, info, warn};

use crate::{
    config::RiskConfig,
    error::RiskError,
    features::{self, Feature, FeatureFrame},
    forest::argmax,
    labeling::{self, RiskLevel},
    preprocess,
    recommend::recommendations,
    report::{AnalysisDocument, PolicyDecision, RiskReport, format_timestamp, money, percent},
    signals::SignalSnapshot,
    store::{RiskArtifact, RiskModelStore, StoreError},
    trainer::RiskModelTrainer,
};

/// Result of [`RiskAnalyzer::analyze`].
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    /// The input portfolio, with the ticker appended if it was absent.
    pub portfolio: Vec<String>,
    pub report: AnalysisDocument,
    /// Fallbacks taken while producing `report`.
    pub decisions: Vec<PolicyDecision>,
}

pub struct RiskAnalyzer {
    accessor: MarketDataAccessor,
    store: RiskModelStore,
    trainer: RiskModelTrainer,
    lookback: Lookback,
    interval: Interval,
}

impl RiskAnalyzer {
    pub fn new(cfg: &RiskConfig, provider: Box<dyn DataProvider>) -> Result<Self, RiskError> {
        let accessor = MarketDataAccessor::new(provider, BarCache::with_capacity(cfg.cache_capacity))?;
        let store = RiskModelStore::from_config(cfg)?;
        Ok(Self::from_parts(
            accessor,
            store,
            RiskModelTrainer::new(cfg),
            cfg.lookback,
            cfg.interval.clone(),
        ))
    }

    pub fn from_parts(
        accessor: MarketDataAccessor,
        store: RiskModelStore,
        trainer: RiskModelTrainer,
        lookback: Lookback,
        interval: Interval,
    ) -> Self {
        Self {
            accessor,
            store,
            trainer,
            lookback,
            interval,
        }
    }

    pub fn store(&self) -> &RiskModelStore {
        &self.store
    }

    pub fn accessor(&self) -> &MarketDataAccessor {
        &self.accessor
    }

    /// Never fails: any pipeline error becomes an error document.
    pub fn analyze(&mut self, ticker: &str, portfolio: &[String]) -> AnalysisOutcome {
        info!(ticker, "Performing risk analysis");
        let mut decisions = Vec::new();

        let report = match self.assess(ticker, &mut decisions) {
            Ok(report) => AnalysisDocument::Report(Box::new(report)),
            Err(err) => {
                error!(ticker, error = %err.chain(), "risk analysis failed");
                AnalysisDocument::error(ticker, err.to_string(), Local::now())
            }
        };

        let mut portfolio = portfolio.to_vec();
        if !portfolio.iter().any(|t| t == ticker) {
            portfolio.push(ticker.to_string());
        }

        AnalysisOutcome {
            portfolio,
            report,
            decisions,
        }
    }

    /// Runs the pipeline, propagating the first failure.
    pub fn assess(
        &mut self,
        ticker: &str,
        decisions: &mut Vec<PolicyDecision>,
    ) -> Result<RiskReport, RiskError> {
        let series = self.accessor.fetch(ticker, self.lookback, &self.interval)?;
        let series = preprocess::clean(series)?;
        let frame = FeatureFrame::compute(&series)?;
        let labels = labeling::label_frame(&frame)?;
        debug!(ticker, thresholds = ?labels.thresholds, rows = frame.len(), "labelled frame");

        let retrain = if self.store.should_retrain(ticker) {
            Some(if self.store.model_path(ticker).exists() {
                "model older than the maximum age"
            } else {
                "no stored model"
            })
        } else if !self.store.scaler_path(ticker).exists() {
            Some("missing scaler")
        } else {
            None
        };

        let artifact = match retrain {
            Some(reason) => {
                info!(ticker, reason, "training risk model");
                decisions.push(PolicyDecision::Retrained {
                    reason: reason.to_string(),
                });
                self.trainer.train(ticker, &frame, &labels, &self.store)?
            }
            None => self.load_artifact(ticker, decisions)?,
        };

        let columns: Vec<Option<Feature>> = artifact
            .features_used
            .iter()
            .map(|name| frame.lookup(name))
            .collect();
        let dropped: Vec<String> = artifact
            .features_used
            .iter()
            .zip(&columns)
            .filter(|(_, col)| col.is_none())
            .map(|(name, _)| name.clone())
            .collect();
        if !dropped.is_empty() {
            warn!(ticker, ?dropped, "model features missing from frame");
            decisions.push(PolicyDecision::DroppedFeatures { features: dropped });
        }

        let (risk_level, confidence) = predict_latest(&artifact, &frame, &columns)?;
        let signals = SignalSnapshot::from_frame(&frame)
            .ok_or_else(|| RiskError::FeatureComputation("empty feature frame".into()))?;

        let core = |f: Feature| {
            frame
                .latest(f)
                .ok_or_else(|| RiskError::FeatureComputation(format!("missing {f} column")))
        };
        let close = frame
            .latest_close()
            .ok_or_else(|| RiskError::FeatureComputation("empty feature frame".into()))?;

        Ok(RiskReport {
            risk_level,
            current_price: money(close),
            volatility: percent(core(Feature::Volatility)?),
            daily_return: percent(core(Feature::DailyReturn)?),
            latest_close: close,
            trend: signals.trend,
            rsi_status: signals.rsi_status,
            rsi_value: signals.rsi_value.map_or_else(|| "N/A".to_string(), money),
            macd_signal: signals.macd_signal,
            price_position: signals.price_position,
            confidence_score: money(confidence),
            bollinger_band_position: signals.bollinger_band_position,
            stochastic_signal: signals.stochastic_signal,
            recommendations: recommendations(risk_level, &signals, &frame.close),
            analysis_timestamp: format_timestamp(Local::now()),
        })
    }

    /// Strict load, falling back to the default feature set when the
    /// metrics predate the feature list.
    fn load_artifact(
        &self,
        ticker: &str,
        decisions: &mut Vec<PolicyDecision>,
    ) -> Result<RiskArtifact, RiskError> {
        match self.store.load(ticker) {
            Ok(artifact) => {
                debug!(ticker, "loaded stored risk model");
                Ok(artifact)
            }
            Err(StoreError::MissingFeatureList { .. }) => {
                let (classifier, scaler) = self.store.load_model_and_scaler(ticker)?;
                let metrics = self.store.load_metrics(ticker)?;
                let defaults = Feature::DEFAULT_SET;
                warn!(ticker, features = ?defaults, "stored metrics lack features_used, assuming defaults");
                decisions.push(PolicyDecision::DefaultFeatureSet {
                    features: defaults.to_vec(),
                });
                Ok(RiskArtifact {
                    classifier,
                    scaler,
                    features_used: features::names(&defaults),
                    metrics,
                })
            }
            Err(err) => Err(err.into()),
        }
    }
}

/// Classifies the newest row. A column the frame lacks is filled with the
/// scaler's training mean so the row keeps the model's width.
fn predict_latest(
    artifact: &RiskArtifact,
    frame: &FeatureFrame,
    columns: &[Option<Feature>],
) -> Result<(RiskLevel, f64), RiskError> {
    let row = columns
        .iter()
        .enumerate()
        .map(|(i, col)| match col {
            Some(f) => frame.latest(*f),
            None => artifact.scaler.mean(i),
        })
        .collect::<Option<Vec<f64>>>()
        .ok_or_else(|| RiskError::Prediction("latest row is incomplete".into()))?;
    let scaled = artifact
        .scaler
        .transform_row(&row)
        .map_err(|e| RiskError::Prediction(e.to_string()))?;
    let proba = artifact
        .classifier
        .predict_proba(&scaled)
        .map_err(|e| RiskError::Prediction(e.to_string()))?;
    let idx = argmax(&proba);
    let level = RiskLevel::from_index(idx)
        .ok_or_else(|| RiskError::Prediction(format!("unexpected class index {idx}")))?;
    Ok((level, proba[idx]))
}
