//! Random forest of CART classification trees.
//!
//! Trees are grown to purity (no depth limit, any node with two or more
//! samples may split) on bootstrap resamples, drawing a random subset of
//! candidate features at every split. Tree `i` is seeded with `seed + i`,
//! so a fit is fully determined by its parameters, seed and data even when
//! trees are built in parallel.

use std::fmt;

use rand::{Rng, SeedableRng, seq::SliceRandom};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ForestError {
    #[error("cannot fit on an empty dataset")]
    Empty,

    #[error("n_estimators must be at least 1")]
    NoTrees,

    #[error("expected {expected} features, got {got}")]
    FeatureCount { expected: usize, got: usize },

    #[error("label {label} is out of range for {n_classes} classes")]
    LabelOutOfRange { label: usize, n_classes: usize },

    #[error("{x} feature rows but {y} labels")]
    LengthMismatch { x: usize, y: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Criterion {
    Gini,
    Entropy,
}

impl Criterion {
    /// Node impurity from per-class sample counts.
    fn impurity(self, counts: &[f64], total: f64) -> f64 {
        if total <= 0.0 {
            return 0.0;
        }
        match self {
            Criterion::Gini => 1.0 - counts.iter().map(|c| (c / total).powi(2)).sum::<f64>(),
            Criterion::Entropy => -counts
                .iter()
                .filter(|c| **c > 0.0)
                .map(|c| {
                    let p = c / total;
                    p * p.log2()
                })
                .sum::<f64>(),
        }
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Criterion::Gini => "gini",
            Criterion::Entropy => "entropy",
        })
    }
}

/// How many features each split may consider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaxFeatures {
    Sqrt,
    Log2,
}

impl MaxFeatures {
    pub fn resolve(self, n_features: usize) -> usize {
        let n = n_features as f64;
        let k = match self {
            MaxFeatures::Sqrt => n.sqrt(),
            MaxFeatures::Log2 => n.log2(),
        };
        (k as usize).clamp(1, n_features.max(1))
    }
}

impl fmt::Display for MaxFeatures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MaxFeatures::Sqrt => "sqrt",
            MaxFeatures::Log2 => "log2",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_features: MaxFeatures,
    pub criterion: Criterion,
}

impl fmt::Display for ForestParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "n_estimators={} max_features={} criterion={}",
            self.n_estimators, self.max_features, self.criterion
        )
    }
}

/// Row-major samples with class indices in `0..n_classes`.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub x: Vec<Vec<f64>>,
    pub y: Vec<usize>,
    pub n_classes: usize,
}

impl Dataset {
    pub fn new(x: Vec<Vec<f64>>, y: Vec<usize>, n_classes: usize) -> Result<Self, ForestError> {
        if x.len() != y.len() {
            return Err(ForestError::LengthMismatch {
                x: x.len(),
                y: y.len(),
            });
        }
        if let Some(&label) = y.iter().find(|&&l| l >= n_classes) {
            return Err(ForestError::LabelOutOfRange { label, n_classes });
        }
        let width = x.first().map_or(0, Vec::len);
        if let Some(row) = x.iter().find(|r| r.len() != width) {
            return Err(ForestError::FeatureCount {
                expected: width,
                got: row.len(),
            });
        }
        Ok(Self { x, y, n_classes })
    }

    pub fn len(&self) -> usize {
        self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }

    pub fn n_features(&self) -> usize {
        self.x.first().map_or(0, Vec::len)
    }

    pub fn subset(&self, idx: &[usize]) -> Self {
        Self {
            x: idx.iter().map(|&i| self.x[i].clone()).collect(),
            y: idx.iter().map(|&i| self.y[i]).collect(),
            n_classes: self.n_classes,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Node {
    Leaf {
        distribution: Vec<f64>,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
    importances: Vec<f64>,
}

impl DecisionTree {
    fn distribution(&self, row: &[f64]) -> &[f64] {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { distribution } => return distribution,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    /// `n_left * impurity_left + n_right * impurity_right`, lower is better.
    weighted: f64,
    left: Vec<usize>,
    right: Vec<usize>,
    impurity_left: f64,
    impurity_right: f64,
}

struct TreeBuilder<'a> {
    data: &'a Dataset,
    criterion: Criterion,
    max_features: usize,
    rng: ChaCha8Rng,
    nodes: Vec<Node>,
    importances: Vec<f64>,
    n_root: f64,
}

impl TreeBuilder<'_> {
    fn counts(&self, samples: &[usize]) -> Vec<f64> {
        let mut counts = vec![0.0; self.data.n_classes];
        for &i in samples {
            counts[self.data.y[i]] += 1.0;
        }
        counts
    }

    fn leaf(&mut self, counts: Vec<f64>, total: f64) -> usize {
        let distribution = counts.into_iter().map(|c| c / total).collect();
        self.nodes.push(Node::Leaf { distribution });
        self.nodes.len() - 1
    }

    fn grow(&mut self, samples: Vec<usize>, impurity: f64) -> usize {
        let n = samples.len() as f64;
        let counts = self.counts(&samples);
        if samples.len() < 2 || impurity <= f64::EPSILON {
            return self.leaf(counts, n);
        }
        let Some(split) = self.best_split(&samples, &counts) else {
            return self.leaf(counts, n);
        };

        let (n_l, n_r) = (split.left.len() as f64, split.right.len() as f64);
        self.importances[split.feature] += n / self.n_root
            * (impurity - n_l / n * split.impurity_left - n_r / n * split.impurity_right);

        let at = self.nodes.len();
        self.nodes.push(Node::Leaf {
            distribution: Vec::new(),
        });
        let left = self.grow(split.left, split.impurity_left);
        let right = self.grow(split.right, split.impurity_right);
        self.nodes[at] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        at
    }

    /// Visits features in random order until `max_features` non-constant
    /// ones have been scanned, then returns the best threshold among them.
    fn best_split(&mut self, samples: &[usize], parent: &[f64]) -> Option<SplitCandidate> {
        let data = self.data;
        let x = &data.x;
        let mut features: Vec<usize> = (0..data.n_features()).collect();
        features.shuffle(&mut self.rng);

        let mut best: Option<SplitCandidate> = None;
        let mut visited = 0;
        let total = samples.len();
        let mut order = samples.to_vec();

        for f in features {
            if visited >= self.max_features {
                break;
            }
            order.sort_by(|&a, &b| x[a][f].total_cmp(&x[b][f]));
            if x[order[0]][f] >= x[order[total - 1]][f] {
                continue;
            }
            visited += 1;

            let mut left = vec![0.0; parent.len()];
            let mut right = parent.to_vec();
            let mut best_here: Option<(usize, f64, f64, f64)> = None;
            for pos in 0..total - 1 {
                let y = data.y[order[pos]];
                left[y] += 1.0;
                right[y] -= 1.0;
                let (lo, hi) = (x[order[pos]][f], x[order[pos + 1]][f]);
                if lo >= hi {
                    continue;
                }
                let n_l = (pos + 1) as f64;
                let n_r = (total - pos - 1) as f64;
                let imp_l = self.criterion.impurity(&left, n_l);
                let imp_r = self.criterion.impurity(&right, n_r);
                let weighted = n_l * imp_l + n_r * imp_r;
                if best_here.is_none_or(|(_, w, _, _)| weighted < w) {
                    best_here = Some((pos, weighted, imp_l, imp_r));
                }
            }

            let Some((pos, weighted, imp_l, imp_r)) = best_here else {
                continue;
            };
            if best.as_ref().is_some_and(|b| b.weighted <= weighted) {
                continue;
            }
            let (lo, hi) = (x[order[pos]][f], x[order[pos + 1]][f]);
            let mut threshold = lo + (hi - lo) / 2.0;
            if threshold >= hi {
                threshold = lo;
            }
            best = Some(SplitCandidate {
                feature: f,
                threshold,
                weighted,
                left: order[..=pos].to_vec(),
                right: order[pos + 1..].to_vec(),
                impurity_left: imp_l,
                impurity_right: imp_r,
            });
        }
        best
    }
}

fn fit_tree(data: &Dataset, params: &ForestParams, seed: u64) -> DecisionTree {
    let n = data.len();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let samples: Vec<usize> = (0..n).map(|_| rng.random_range(0..n)).collect();

    let mut builder = TreeBuilder {
        data,
        criterion: params.criterion,
        max_features: params.max_features.resolve(data.n_features()),
        rng,
        nodes: Vec::new(),
        importances: vec![0.0; data.n_features()],
        n_root: n as f64,
    };
    let counts = builder.counts(&samples);
    let impurity = params.criterion.impurity(&counts, n as f64);
    builder.grow(samples, impurity);

    let mut importances = builder.importances;
    normalize(&mut importances);
    DecisionTree {
        nodes: builder.nodes,
        importances,
    }
}

fn normalize(values: &mut [f64]) {
    let sum: f64 = values.iter().sum();
    if sum > 0.0 {
        values.iter_mut().for_each(|v| *v /= sum);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    params: ForestParams,
    n_features: usize,
    n_classes: usize,
    trees: Vec<DecisionTree>,
    feature_importances: Vec<f64>,
}

impl RandomForest {
    pub fn fit(params: ForestParams, seed: u64, data: &Dataset) -> Result<Self, ForestError> {
        if data.is_empty() || data.n_features() == 0 {
            return Err(ForestError::Empty);
        }
        if params.n_estimators == 0 {
            return Err(ForestError::NoTrees);
        }

        let trees: Vec<DecisionTree> = (0..params.n_estimators)
            .into_par_iter()
            .map(|i| fit_tree(data, &params, seed.wrapping_add(i as u64)))
            .collect();

        let mut feature_importances = vec![0.0; data.n_features()];
        for tree in &trees {
            for (acc, imp) in feature_importances.iter_mut().zip(&tree.importances) {
                *acc += imp;
            }
        }
        normalize(&mut feature_importances);

        Ok(Self {
            params,
            n_features: data.n_features(),
            n_classes: data.n_classes,
            trees,
            feature_importances,
        })
    }

    /// Mean of the per-tree leaf class distributions.
    pub fn predict_proba(&self, row: &[f64]) -> Result<Vec<f64>, ForestError> {
        if row.len() != self.n_features {
            return Err(ForestError::FeatureCount {
                expected: self.n_features,
                got: row.len(),
            });
        }
        let mut proba = vec![0.0; self.n_classes];
        for tree in &self.trees {
            for (p, d) in proba.iter_mut().zip(tree.distribution(row)) {
                *p += d;
            }
        }
        let n = self.trees.len() as f64;
        proba.iter_mut().for_each(|p| *p /= n);
        Ok(proba)
    }

    /// Most probable class; the lowest index wins ties.
    pub fn predict(&self, row: &[f64]) -> Result<usize, ForestError> {
        Ok(argmax(&self.predict_proba(row)?))
    }

    pub fn accuracy(&self, data: &Dataset) -> Result<f64, ForestError> {
        if data.is_empty() {
            return Err(ForestError::Empty);
        }
        let mut hits = 0usize;
        for (row, &y) in data.x.iter().zip(&data.y) {
            if self.predict(row)? == y {
                hits += 1;
            }
        }
        Ok(hits as f64 / data.len() as f64)
    }

    pub fn params(&self) -> ForestParams {
        self.params
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    /// Normalised mean impurity decrease per feature; sums to 1 unless no
    /// tree ever split.
    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }
}

pub fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate() {
        if *v > values[best] {
            best = i;
        }
    }
    best
}
