//! Cross-validation implementations

use crate::error::{EnsembleError, Result};
use super::models::{accuracy_score, unique_classes, Classifier};
use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Cross-validation strategy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CVStrategy {
    /// K-Fold cross-validation
    KFold { n_splits: usize, shuffle: bool },
    /// Stratified K-Fold (maintains class distribution)
    StratifiedKFold { n_splits: usize, shuffle: bool },
}

impl Default for CVStrategy {
    fn default() -> Self {
        CVStrategy::StratifiedKFold { n_splits: 5, shuffle: false }
    }
}

/// A single train/test split
#[derive(Debug, Clone)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// Cross-validation splitter
#[derive(Debug, Clone)]
pub struct CrossValidator {
    strategy: CVStrategy,
    random_state: Option<u64>,
}

impl CrossValidator {
    /// Create a new cross-validator
    pub fn new(strategy: CVStrategy) -> Self {
        Self {
            strategy,
            random_state: None,
        }
    }

    /// Set random state for reproducibility
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    fn rng(&self) -> ChaCha8Rng {
        match self.random_state {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        }
    }

    /// Generate train/test splits
    pub fn split(&self, n_samples: usize, y: Option<&Array1<f64>>) -> Result<Vec<CVSplit>> {
        match &self.strategy {
            CVStrategy::KFold { n_splits, shuffle } => {
                check_n_splits(n_samples, *n_splits)?;
                self.k_fold_split(n_samples, *n_splits, *shuffle)
            }
            CVStrategy::StratifiedKFold { n_splits, shuffle } => {
                let y = y.ok_or_else(|| EnsembleError::ValidationError(
                    "StratifiedKFold requires target array".to_string()
                ))?;
                if y.len() != n_samples {
                    return Err(EnsembleError::ShapeError {
                        expected: format!("y length = {}", n_samples),
                        actual: format!("y length = {}", y.len()),
                    });
                }
                check_n_splits(n_samples, *n_splits)?;
                self.stratified_k_fold_split(y, *n_splits, *shuffle)
            }
        }
    }

    fn k_fold_split(&self, n_samples: usize, n_splits: usize, shuffle: bool) -> Result<Vec<CVSplit>> {
        let mut indices: Vec<usize> = (0..n_samples).collect();

        if shuffle {
            indices.shuffle(&mut self.rng());
        }

        let base = n_samples / n_splits;
        let remainder = n_samples % n_splits;

        let mut splits = Vec::with_capacity(n_splits);
        let mut current = 0;

        for fold_idx in 0..n_splits {
            let fold_size = if fold_idx < remainder { base + 1 } else { base };
            let test_indices: Vec<usize> = indices[current..current + fold_size].to_vec();
            let train_indices: Vec<usize> = indices[..current]
                .iter()
                .chain(indices[current + fold_size..].iter())
                .copied()
                .collect();

            splits.push(CVSplit {
                train_indices,
                test_indices,
                fold_idx,
            });

            current += fold_size;
        }

        Ok(splits)
    }

    fn stratified_k_fold_split(&self, y: &Array1<f64>, n_splits: usize, shuffle: bool) -> Result<Vec<CVSplit>> {
        let mut rng = if shuffle { Some(self.rng()) } else { None };
        let mut folds: Vec<Vec<usize>> = vec![Vec::new(); n_splits];

        // Deal each class round-robin over the folds, continuing where the
        // previous class stopped so fold sizes stay balanced
        let mut offset = 0usize;
        for class in unique_classes(y) {
            let mut members: Vec<usize> = y
                .iter()
                .enumerate()
                .filter(|(_, &label)| label == class)
                .map(|(i, _)| i)
                .collect();

            if let Some(rng) = rng.as_mut() {
                members.shuffle(rng);
            }

            for (i, idx) in members.iter().enumerate() {
                folds[(offset + i) % n_splits].push(*idx);
            }
            offset += members.len();
        }

        for fold in &mut folds {
            fold.sort_unstable();
        }

        let splits = (0..n_splits)
            .map(|fold_idx| {
                let train_indices: Vec<usize> = folds
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != fold_idx)
                    .flat_map(|(_, f)| f.iter().copied())
                    .collect();

                CVSplit {
                    train_indices,
                    test_indices: folds[fold_idx].clone(),
                    fold_idx,
                }
            })
            .collect();

        Ok(splits)
    }
}

fn check_n_splits(n_samples: usize, n_splits: usize) -> Result<()> {
    if n_splits < 2 {
        return Err(EnsembleError::ValidationError(
            "n_splits must be at least 2".to_string()
        ));
    }
    if n_samples < n_splits {
        return Err(EnsembleError::ValidationError(
            format!("n_samples ({}) must be >= n_splits ({})", n_samples, n_splits)
        ));
    }
    Ok(())
}

/// Cross-validation results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CVResults {
    /// Scores for each fold
    pub scores: Vec<f64>,
    /// Mean score across folds
    pub mean_score: f64,
    /// Standard deviation of scores
    pub std_score: f64,
    /// Number of folds
    pub n_folds: usize,
}

impl CVResults {
    /// Create CV results from fold scores
    pub fn from_scores(scores: Vec<f64>) -> Self {
        let n_folds = scores.len();
        let mean_score = scores.iter().sum::<f64>() / n_folds as f64;
        let variance = scores.iter().map(|s| (s - mean_score).powi(2)).sum::<f64>() / n_folds as f64;
        let std_score = variance.sqrt();

        Self {
            scores,
            mean_score,
            std_score,
            n_folds,
        }
    }
}

/// Accuracy of `estimator` over stratified, unshuffled `cv`-fold splits.
///
/// The estimator itself is left untouched; every fold fits a fresh clone.
pub fn cross_val_score(
    estimator: &dyn Classifier,
    x: &Array2<f64>,
    y: &Array1<f64>,
    cv: usize,
) -> Result<CVResults> {
    let validator = CrossValidator::new(CVStrategy::StratifiedKFold { n_splits: cv, shuffle: false });
    cross_val_score_with(estimator, x, y, &validator)
}

/// Accuracy of `estimator` over the splits produced by `validator`
pub fn cross_val_score_with(
    estimator: &dyn Classifier,
    x: &Array2<f64>,
    y: &Array1<f64>,
    validator: &CrossValidator,
) -> Result<CVResults> {
    if x.nrows() != y.len() {
        return Err(EnsembleError::ShapeError {
            expected: format!("y length = {}", x.nrows()),
            actual: format!("y length = {}", y.len()),
        });
    }

    let splits = validator.split(x.nrows(), Some(y))?;

    let scores = splits
        .par_iter()
        .map(|split| {
            let x_train = x.select(Axis(0), &split.train_indices);
            let y_train = y.select(Axis(0), &split.train_indices);
            let x_test = x.select(Axis(0), &split.test_indices);
            let y_test = y.select(Axis(0), &split.test_indices);

            let mut model = estimator.clone_box();
            model.fit(&x_train, &y_train)?;
            let y_pred = model.predict(&x_test)?;
            accuracy_score(&y_test, &y_pred)
        })
        .collect::<Result<Vec<f64>>>()?;

    Ok(CVResults::from_scores(scores))
}
