use indexmap::IndexMap;
use thiserror::Error;
use tracing::info;

use crate::{
    config::RiskConfig,
    cv::{self, SplitError, StratifiedKFold},
    features::{self, Feature, FeatureFrame},
    forest::{Dataset, ForestError, RandomForest},
    labeling::{Labels, RiskLevel},
    scaler::{ScalerError, StandardScaler},
    search::{self, GridSearch, HyperparameterSearch, ParamGrid},
    store::{ModelMetrics, RiskArtifact, RiskModelStore, StoreError},
};

#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("none of the model features are present")]
    NoFeatures,

    #[error("{labels} labels for {rows} rows")]
    LabelMismatch { rows: usize, labels: usize },

    #[error("{0}")]
    Split(#[from] SplitError),

    #[error("{0}")]
    Scaler(#[from] ScalerError),

    #[error("{0}")]
    Forest(#[from] ForestError),

    #[error("{0}")]
    Persist(#[from] StoreError),
}

/// Fits the risk classifier for one ticker and writes it to the store.
pub struct RiskModelTrainer {
    seed: u64,
    test_fraction: f64,
    cv_folds: usize,
    grid: ParamGrid,
    search: Box<dyn HyperparameterSearch>,
}

impl RiskModelTrainer {
    pub fn new(cfg: &RiskConfig) -> Self {
        Self {
            seed: cfg.seed,
            test_fraction: cfg.test_fraction,
            cv_folds: cfg.cv_folds,
            grid: cfg.grid.clone(),
            search: Box::new(GridSearch::new(cfg.seed)),
        }
    }

    /// Replaces the default grid search.
    pub fn with_search(mut self, search: Box<dyn HyperparameterSearch>) -> Self {
        self.search = search;
        self
    }

    /// Runs split, scaling, parameter search, reporting CV and the hold-out
    /// evaluation, then persists classifier, scaler and metrics.
    pub fn train(
        &self,
        ticker: &str,
        frame: &FeatureFrame,
        labels: &Labels,
        store: &RiskModelStore,
    ) -> Result<RiskArtifact, TrainingError> {
        let (features, _) = frame.partition_available(&Feature::ALL);
        if features.is_empty() {
            return Err(TrainingError::NoFeatures);
        }
        if labels.levels.len() != frame.len() {
            return Err(TrainingError::LabelMismatch {
                rows: frame.len(),
                labels: labels.levels.len(),
            });
        }

        let x = frame.matrix(&features);
        let y = labels.indices();
        let (train_idx, test_idx) = cv::train_test_split(&y, self.test_fraction, self.seed)?;

        let pick = |idx: &[usize]| idx.iter().map(|&i| x[i].clone()).collect::<Vec<_>>();
        let scaler = StandardScaler::fit(&pick(&train_idx))?;
        let train = Dataset::new(
            scaler.transform(&pick(&train_idx))?,
            train_idx.iter().map(|&i| y[i]).collect(),
            RiskLevel::COUNT,
        )?;
        let test = Dataset::new(
            scaler.transform(&pick(&test_idx))?,
            test_idx.iter().map(|&i| y[i]).collect(),
            RiskLevel::COUNT,
        )?;

        let search_folds = StratifiedKFold::new(self.cv_folds).split(&train.y)?;
        let outcome = self.search.optimize(&self.grid, &train, &search_folds)?;
        info!(ticker, params = %outcome.best, score = outcome.best_score, "selected forest parameters");

        let classifier = RandomForest::fit(outcome.best, self.seed, &train)?;

        let full = Dataset::new(scaler.transform(&x)?, y.clone(), RiskLevel::COUNT)?;
        let report_folds = StratifiedKFold::shuffled(self.cv_folds, self.seed).split(&full.y)?;
        let cv_scores = search::cross_val_scores(outcome.best, self.seed, &full, &report_folds)?;
        let cv_accuracy_mean = search::mean(&cv_scores);
        let cv_accuracy_std = search::std(&cv_scores);

        let test_accuracy = classifier.accuracy(&test)?;
        let confusion = confusion_matrix(&classifier, &test)?;
        info!(
            ticker,
            cv_accuracy_mean,
            cv_accuracy_std,
            test_accuracy,
            ?confusion,
            "trained risk model"
        );

        let features_used = features::names(&features);
        let feature_importance: IndexMap<String, f64> = features_used
            .iter()
            .cloned()
            .zip(classifier.feature_importances().iter().copied())
            .collect();

        let artifact = RiskArtifact {
            metrics: ModelMetrics {
                cv_accuracy_mean,
                cv_accuracy_std,
                best_params: outcome.best,
                feature_importance,
                features_used: Some(features_used.clone()),
                test_accuracy: Some(test_accuracy),
            },
            classifier,
            scaler,
            features_used,
        };
        store.save(ticker, &artifact)?;
        Ok(artifact)
    }
}

/// Rows are true classes, columns predictions, both indexed by
/// [`RiskLevel::index`].
pub fn confusion_matrix(
    model: &RandomForest,
    data: &Dataset,
) -> Result<[[usize; RiskLevel::COUNT]; RiskLevel::COUNT], ForestError> {
    let mut m = [[0; RiskLevel::COUNT]; RiskLevel::COUNT];
    for (row, &y) in data.x.iter().zip(&data.y) {
        let pred = model.predict(row)?;
        if let Some(cell) = m.get_mut(y).and_then(|r| r.get_mut(pred)) {
            *cell += 1;
        }
    }
    Ok(m)
}
