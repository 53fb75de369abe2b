//! Stratified hold-out splits and k-fold cross-validation indices.

use std::collections::BTreeMap;

use rand::{SeedableRng, seq::SliceRandom};
use rand_chacha::ChaCha8Rng;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum SplitError {
    #[error("cannot split {n} samples into {parts} parts")]
    TooFewSamples { n: usize, parts: usize },

    #[error("the least populated class has only {count} member(s), at least {needed} required")]
    ClassTooSmall { count: usize, needed: usize },

    #[error("test fraction must be in (0, 1), got {0}")]
    BadFraction(f64),
}

/// `(train, test)` index lists. Both are sorted ascending.
pub type Fold = (Vec<usize>, Vec<usize>);

/// Sample indices grouped by class, ascending within each class.
fn by_class(labels: &[usize]) -> BTreeMap<usize, Vec<usize>> {
    let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (i, &y) in labels.iter().enumerate() {
        groups.entry(y).or_default().push(i);
    }
    groups
}

/// Splits `total` across classes proportionally to `counts`, handing the
/// leftover units to the largest remainders (earlier classes win ties).
fn apportion(counts: &[usize], total: usize) -> Vec<usize> {
    let n: usize = counts.iter().sum();
    let exact: Vec<f64> = counts
        .iter()
        .map(|&c| total as f64 * c as f64 / n as f64)
        .collect();
    let mut alloc: Vec<usize> = exact.iter().map(|e| e.floor() as usize).collect();
    let mut order: Vec<usize> = (0..counts.len()).collect();
    order.sort_by(|&a, &b| {
        let ra = exact[a] - exact[a].floor();
        let rb = exact[b] - exact[b].floor();
        rb.total_cmp(&ra)
    });
    let mut left = total - alloc.iter().sum::<usize>();
    for &i in order.iter().cycle() {
        if left == 0 {
            break;
        }
        if alloc[i] < counts[i] {
            alloc[i] += 1;
            left -= 1;
        }
    }
    alloc
}

/// Shuffled stratified hold-out split. The test side holds
/// `ceil(test_fraction * n)` samples spread across classes in proportion.
pub fn train_test_split(labels: &[usize], test_fraction: f64, seed: u64) -> Result<Fold, SplitError> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(SplitError::BadFraction(test_fraction));
    }
    let n = labels.len();
    let n_test = (test_fraction * n as f64).ceil() as usize;
    if n_test == 0 || n_test >= n {
        return Err(SplitError::TooFewSamples { n, parts: 2 });
    }

    let groups = by_class(labels);
    let smallest = groups.values().map(Vec::len).min().unwrap_or(0);
    if smallest < 2 {
        return Err(SplitError::ClassTooSmall {
            count: smallest,
            needed: 2,
        });
    }
    if n_test < groups.len() || n - n_test < groups.len() {
        return Err(SplitError::TooFewSamples {
            n,
            parts: groups.len(),
        });
    }

    let counts: Vec<usize> = groups.values().map(Vec::len).collect();
    let test_alloc = apportion(&counts, n_test);

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(n - n_test);
    let mut test = Vec::with_capacity(n_test);
    for (members, &k) in groups.values().zip(&test_alloc) {
        let mut members = members.clone();
        members.shuffle(&mut rng);
        test.extend_from_slice(&members[..k]);
        train.extend_from_slice(&members[k..]);
    }
    train.sort_unstable();
    test.sort_unstable();
    Ok((train, test))
}

/// Stratified k-fold: each class is cut into `n_splits` contiguous chunks
/// (sizes differ by at most one) and chunk `i` of every class forms test
/// fold `i`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StratifiedKFold {
    pub n_splits: usize,
    /// Shuffle members within each class before chunking.
    pub shuffle_seed: Option<u64>,
}

impl StratifiedKFold {
    pub fn new(n_splits: usize) -> Self {
        Self {
            n_splits,
            shuffle_seed: None,
        }
    }

    pub fn shuffled(n_splits: usize, seed: u64) -> Self {
        Self {
            n_splits,
            shuffle_seed: Some(seed),
        }
    }

    pub fn split(&self, labels: &[usize]) -> Result<Vec<Fold>, SplitError> {
        let k = self.n_splits;
        let n = labels.len();
        if k < 2 || n < k {
            return Err(SplitError::TooFewSamples { n, parts: k });
        }
        let groups = by_class(labels);
        let largest = groups.values().map(Vec::len).max().unwrap_or(0);
        if largest < k {
            return Err(SplitError::ClassTooSmall {
                count: largest,
                needed: k,
            });
        }

        let mut rng = self.shuffle_seed.map(ChaCha8Rng::seed_from_u64);
        let mut fold_of = vec![0usize; n];
        for members in groups.values() {
            let mut members = members.clone();
            if let Some(rng) = rng.as_mut() {
                members.shuffle(rng);
            }
            let (base, extra) = (members.len() / k, members.len() % k);
            let mut start = 0;
            for fold in 0..k {
                let size = base + usize::from(fold < extra);
                for &i in &members[start..start + size] {
                    fold_of[i] = fold;
                }
                start += size;
            }
        }

        Ok((0..k)
            .map(|fold| {
                (0..n).partition::<Vec<usize>, _>(|&i| fold_of[i] != fold)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(counts: &[usize]) -> Vec<usize> {
        counts
            .iter()
            .enumerate()
            .flat_map(|(class, &c)| std::iter::repeat_n(class, c))
            .collect()
    }

    #[test]
    fn hold_out_is_stratified_and_seeded() {
        let y = labels(&[33, 33, 34]);
        let (train, test) = train_test_split(&y, 0.25, 42).unwrap();
        assert_eq!(test.len(), 25);
        assert_eq!(train.len(), 75);
        for class in 0..3 {
            let in_test = test.iter().filter(|&&i| y[i] == class).count();
            assert!((8..=9).contains(&in_test), "class {class}: {in_test}");
        }
        assert_eq!(train_test_split(&y, 0.25, 42).unwrap(), (train.clone(), test.clone()));
        assert_ne!(train_test_split(&y, 0.25, 7).unwrap().1, test);
    }

    #[test]
    fn hold_out_rejects_singleton_class() {
        let y = labels(&[10, 10, 1]);
        assert_eq!(
            train_test_split(&y, 0.25, 42),
            Err(SplitError::ClassTooSmall { count: 1, needed: 2 })
        );
    }

    #[test]
    fn hold_out_rejects_bad_fraction() {
        assert!(matches!(
            train_test_split(&labels(&[5, 5]), 1.0, 0),
            Err(SplitError::BadFraction(_))
        ));
    }

    #[test]
    fn kfold_partitions_every_sample_once() {
        let y = labels(&[12, 9, 7]);
        let folds = StratifiedKFold::new(5).split(&y).unwrap();
        assert_eq!(folds.len(), 5);
        let mut seen = vec![0; y.len()];
        for (train, test) in &folds {
            assert_eq!(train.len() + test.len(), y.len());
            for &i in test {
                seen[i] += 1;
            }
        }
        assert!(seen.iter().all(|&s| s == 1));
    }

    #[test]
    fn unshuffled_kfold_uses_contiguous_chunks() {
        let y = labels(&[10, 10]);
        let folds = StratifiedKFold::new(5).split(&y).unwrap();
        assert_eq!(folds[0].1, vec![0, 1, 10, 11]);
        assert_eq!(folds[4].1, vec![8, 9, 18, 19]);
    }

    #[test]
    fn shuffled_kfold_is_reproducible() {
        let y = labels(&[20, 20, 20]);
        let a = StratifiedKFold::shuffled(5, 42).split(&y).unwrap();
        let b = StratifiedKFold::shuffled(5, 42).split(&y).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, StratifiedKFold::new(5).split(&y).unwrap());
    }

    #[test]
    fn kfold_needs_enough_samples() {
        assert!(StratifiedKFold::new(5).split(&labels(&[2, 2])).is_err());
    }
}
