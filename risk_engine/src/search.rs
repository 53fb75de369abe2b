//! Hyperparameter search over a declared forest grid.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    cv::Fold,
    forest::{Criterion, Dataset, ForestError, ForestParams, MaxFeatures, RandomForest},
};

/// Candidate values per forest parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParamGrid {
    pub n_estimators: Vec<usize>,
    pub max_features: Vec<MaxFeatures>,
    pub criterion: Vec<Criterion>,
}

impl Default for ParamGrid {
    fn default() -> Self {
        Self {
            n_estimators: vec![100, 300, 700],
            max_features: vec![MaxFeatures::Sqrt, MaxFeatures::Log2],
            criterion: vec![Criterion::Gini, Criterion::Entropy],
        }
    }
}

impl ParamGrid {
    /// Every combination, ordered by criterion, then max_features, then
    /// n_estimators (the last varies fastest).
    pub fn candidates(&self) -> Vec<ForestParams> {
        let mut out = Vec::with_capacity(self.len());
        for &criterion in &self.criterion {
            for &max_features in &self.max_features {
                for &n_estimators in &self.n_estimators {
                    out.push(ForestParams {
                        n_estimators,
                        max_features,
                        criterion,
                    });
                }
            }
        }
        out
    }

    pub fn len(&self) -> usize {
        self.n_estimators.len() * self.max_features.len() * self.criterion.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    pub best: ForestParams,
    pub best_score: f64,
    /// Mean CV accuracy of every candidate, in grid order.
    pub scores: Vec<(ForestParams, f64)>,
}

/// Strategy that picks forest parameters for a dataset.
pub trait HyperparameterSearch: Send + Sync {
    fn optimize(
        &self,
        grid: &ParamGrid,
        data: &Dataset,
        folds: &[Fold],
    ) -> Result<SearchOutcome, ForestError>;
}

/// Per-fold accuracy of `params` fitted on each training side.
pub fn cross_val_scores(
    params: ForestParams,
    seed: u64,
    data: &Dataset,
    folds: &[Fold],
) -> Result<Vec<f64>, ForestError> {
    folds
        .iter()
        .map(|(train, test)| {
            let model = RandomForest::fit(params, seed, &data.subset(train))?;
            model.accuracy(&data.subset(test))
        })
        .collect()
}

/// Exhaustive search; candidates are evaluated in parallel and the first
/// best mean score in grid order wins.
#[derive(Debug, Clone, Copy)]
pub struct GridSearch {
    pub seed: u64,
}

impl GridSearch {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }
}

impl HyperparameterSearch for GridSearch {
    fn optimize(
        &self,
        grid: &ParamGrid,
        data: &Dataset,
        folds: &[Fold],
    ) -> Result<SearchOutcome, ForestError> {
        let candidates = grid.candidates();
        if candidates.is_empty() {
            return Err(ForestError::NoTrees);
        }

        let scores: Vec<(ForestParams, f64)> = candidates
            .par_iter()
            .map(|&params| {
                let fold_scores = cross_val_scores(params, self.seed, data, folds)?;
                Ok((params, mean(&fold_scores)))
            })
            .collect::<Result<_, ForestError>>()?;

        let mut best = 0;
        for (i, (params, score)) in scores.iter().enumerate() {
            debug!(%params, score, "grid candidate");
            if *score > scores[best].1 {
                best = i;
            }
        }
        let (best, best_score) = scores[best];
        Ok(SearchOutcome {
            best,
            best_score,
            scores,
        })
    }
}

pub fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return f64::NAN;
    }
    xs.iter().sum::<f64>() / xs.len() as f64
}

/// Population standard deviation.
pub fn std(xs: &[f64]) -> f64 {
    let m = mean(xs);
    (xs.iter().map(|x| (x - m).powi(2)).sum::<f64>() / xs.len() as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cv::StratifiedKFold;

    /// One feature with wide gaps between classes.
    fn data() -> Dataset {
        let x = (0..45).map(|i| vec![((i / 15) * 100 + i % 15) as f64]).collect();
        let y = (0..45).map(|i| i / 15).collect();
        Dataset::new(x, y, 3).unwrap()
    }

    #[test]
    fn default_grid_has_twelve_candidates_in_order() {
        let c = ParamGrid::default().candidates();
        assert_eq!(c.len(), 12);
        assert_eq!(
            c[0],
            ForestParams {
                n_estimators: 100,
                max_features: MaxFeatures::Sqrt,
                criterion: Criterion::Gini
            }
        );
        assert_eq!(c[1].n_estimators, 300);
        assert_eq!(c[3].max_features, MaxFeatures::Log2);
        assert_eq!(c[6].criterion, Criterion::Entropy);
    }

    #[test]
    fn ties_go_to_the_first_candidate() {
        // perfectly separable, so every candidate scores 1.0
        let grid = ParamGrid {
            n_estimators: vec![5, 7],
            max_features: vec![MaxFeatures::Sqrt],
            criterion: vec![Criterion::Entropy, Criterion::Gini],
        };
        let d = data();
        let folds = StratifiedKFold::new(5).split(&d.y).unwrap();
        let out = GridSearch::new(42).optimize(&grid, &d, &folds).unwrap();
        assert_eq!(out.scores.len(), 4);
        assert!(out.scores.iter().all(|(_, s)| *s == out.best_score));
        assert_eq!(out.best, out.scores[0].0);
        assert_eq!(out.best.criterion, Criterion::Entropy);
    }

    #[test]
    fn empty_grid_is_rejected() {
        let grid = ParamGrid {
            n_estimators: vec![],
            ..ParamGrid::default()
        };
        let d = data();
        let folds = StratifiedKFold::new(3).split(&d.y).unwrap();
        assert!(GridSearch::new(0).optimize(&grid, &d, &folds).is_err());
    }

    #[test]
    fn summary_statistics() {
        assert_eq!(mean(&[1.0, 2.0, 3.0]), 2.0);
        assert!((std(&[1.0, 2.0, 3.0]) - (2.0f64 / 3.0).sqrt()).abs() < 1e-12);
    }
}
