//! Exhaustive search over a parameter grid

use crate::error::{EnsembleError, Result};
use crate::training::{cross_val_score, CVResults, Classifier, ParamValue, Params};
use super::config::GridSearchConfig;
use ndarray::{Array1, Array2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::info;

/// Candidate values per parameter key
pub type ParamGrid = BTreeMap<String, Vec<ParamValue>>;

/// Expand a grid into its cartesian product.
///
/// Keys are taken in sorted order and the last key varies fastest. An empty
/// grid yields one empty candidate.
pub fn expand_grid(grid: &ParamGrid) -> Result<Vec<Params>> {
    let mut candidates = vec![Params::new()];

    for (key, values) in grid {
        if values.is_empty() {
            return Err(EnsembleError::ValidationError(format!(
                "Parameter grid for '{}' has no values",
                key
            )));
        }

        candidates = candidates
            .into_iter()
            .flat_map(|params| {
                values.iter().map(move |value| {
                    let mut next = params.clone();
                    next.insert(key.clone(), value.clone());
                    next
                })
            })
            .collect();
    }

    Ok(candidates)
}

/// Score summary for one candidate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CvResult {
    pub params: Params,
    pub mean_test_score: f64,
    pub std_test_score: f64,
    /// Accuracy per fold
    pub split_scores: Vec<f64>,
    /// 1 is best; equal means share the lower rank
    pub rank_test_score: usize,
}

/// Grid search with stratified cross-validation
#[derive(Debug)]
pub struct GridSearchCV {
    estimator: Box<dyn Classifier>,
    param_grid: ParamGrid,
    config: GridSearchConfig,
    results: Vec<CvResult>,
    best_index: Option<usize>,
    best_estimator: Option<Box<dyn Classifier>>,
}

impl GridSearchCV {
    pub fn new(estimator: Box<dyn Classifier>, param_grid: ParamGrid) -> Self {
        Self {
            estimator,
            param_grid,
            config: GridSearchConfig::default(),
            results: Vec::new(),
            best_index: None,
            best_estimator: None,
        }
    }

    pub fn with_config(mut self, config: GridSearchConfig) -> Self {
        self.config = config;
        self
    }

    /// Evaluate every candidate and optionally refit the best one
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let start = Instant::now();
        let candidates = expand_grid(&self.param_grid)?;

        // Apply every candidate up front so a bad key fails before any fit
        let estimators = candidates
            .iter()
            .map(|params| -> Result<Box<dyn Classifier>> {
                let mut estimator = self.estimator.clone_box();
                estimator.set_params(params)?;
                Ok(estimator)
            })
            .collect::<Result<Vec<_>>>()?;

        let n_folds = self.config.cv_folds;
        let verbose = self.config.verbose;
        if verbose > 0 {
            info!(
                estimator = self.estimator.name(),
                n_candidates = candidates.len(),
                n_folds,
                "Fitting {} folds for each of {} candidates, totalling {} fits",
                n_folds,
                candidates.len(),
                n_folds * candidates.len()
            );
        }

        let evaluate = |idx: usize, estimator: &dyn Classifier| -> Result<CVResults> {
            let scores = cross_val_score(estimator, x, y, n_folds)?;
            if verbose > 1 {
                info!(
                    candidate = idx,
                    params = ?candidates[idx],
                    mean_score = scores.mean_score,
                    "Candidate evaluated"
                );
            }
            Ok(scores)
        };

        let scores: Vec<CVResults> = if self.config.parallel {
            estimators
                .par_iter()
                .enumerate()
                .map(|(idx, estimator)| evaluate(idx, estimator.as_ref()))
                .collect::<Result<_>>()?
        } else {
            estimators
                .iter()
                .enumerate()
                .map(|(idx, estimator)| evaluate(idx, estimator.as_ref()))
                .collect::<Result<_>>()?
        };

        let means: Vec<f64> = scores.iter().map(|s| s.mean_score).collect();
        self.results = candidates
            .into_iter()
            .zip(scores)
            .map(|(params, cv)| CvResult {
                rank_test_score: 1 + means.iter().filter(|&&m| m > cv.mean_score).count(),
                params,
                mean_test_score: cv.mean_score,
                std_test_score: cv.std_score,
                split_scores: cv.scores,
            })
            .collect();

        // Earliest candidate wins ties
        let best_index = means
            .iter()
            .enumerate()
            .fold(None, |best: Option<(usize, f64)>, (idx, &mean)| match best {
                Some((_, best_mean)) if mean <= best_mean => best,
                _ => Some((idx, mean)),
            })
            .map(|(idx, _)| idx);
        self.best_index = best_index;

        self.best_estimator = None;
        if self.config.refit {
            if let Some(idx) = best_index {
                let mut best = estimators[idx].clone_box();
                best.fit(x, y)?;
                self.best_estimator = Some(best);
            }
        }

        if verbose > 0 {
            if let Some(result) = self.best_result() {
                info!(
                    best_score = result.mean_test_score,
                    best_params = ?result.params,
                    elapsed_secs = start.elapsed().as_secs_f64(),
                    "Grid search complete"
                );
            }
        }

        Ok(())
    }

    /// Results in candidate order
    pub fn cv_results(&self) -> &[CvResult] {
        &self.results
    }

    pub fn best_index(&self) -> Option<usize> {
        self.best_index
    }

    fn best_result(&self) -> Option<&CvResult> {
        self.best_index.map(|idx| &self.results[idx])
    }

    pub fn best_params(&self) -> Option<&Params> {
        self.best_result().map(|r| &r.params)
    }

    pub fn best_score(&self) -> Option<f64> {
        self.best_result().map(|r| r.mean_test_score)
    }

    /// Best candidate refit on the full data
    pub fn best_estimator(&self) -> Option<&dyn Classifier> {
        self.best_estimator.as_deref()
    }

    fn refit_estimator(&self) -> Result<&dyn Classifier> {
        self.best_estimator
            .as_deref()
            .ok_or_else(|| EnsembleError::not_fitted("GridSearchCV"))
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.refit_estimator()?.predict(x)
    }

    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.refit_estimator()?.predict_proba(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::{DecisionTreeClassifier, GaussianNB, LogisticRegression};
    use ndarray::array;

    fn toy_data() -> (Array2<f64>, Array1<f64>) {
        let x = array![
            [1.0, 2.0], [1.1, 2.1], [0.9, 1.9], [1.0, 2.2], [1.2, 1.8], [0.8, 2.0],
            [5.0, 6.0], [5.1, 6.1], [4.9, 5.9], [5.0, 6.2], [5.2, 5.8], [4.8, 6.0],
        ];
        let y = array![0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0];
        (x, y)
    }

    #[test]
    fn test_expand_grid_order() {
        let mut grid = ParamGrid::new();
        grid.insert("b".to_string(), vec![1i64.into(), 2i64.into()]);
        grid.insert("a".to_string(), vec![true.into(), false.into()]);

        let candidates = expand_grid(&grid).unwrap();
        assert_eq!(candidates.len(), 4);
        assert_eq!(candidates[0]["a"], ParamValue::Bool(true));
        assert_eq!(candidates[0]["b"], ParamValue::Int(1));
        assert_eq!(candidates[1]["a"], ParamValue::Bool(true));
        assert_eq!(candidates[1]["b"], ParamValue::Int(2));
        assert_eq!(candidates[2]["a"], ParamValue::Bool(false));
        assert_eq!(candidates[3]["b"], ParamValue::Int(2));
    }

    #[test]
    fn test_expand_empty() {
        assert_eq!(expand_grid(&ParamGrid::new()).unwrap(), vec![Params::new()]);

        let mut grid = ParamGrid::new();
        grid.insert("C".to_string(), Vec::new());
        assert!(expand_grid(&grid).is_err());
    }

    #[test]
    fn test_grid_search_ranks() {
        let (x, y) = toy_data();
        let mut grid = ParamGrid::new();
        grid.insert("max_depth".to_string(), vec![ParamValue::Int(1), ParamValue::None]);

        let mut search = GridSearchCV::new(Box::new(DecisionTreeClassifier::new()), grid)
            .with_config(GridSearchConfig::new().with_cv_folds(3));
        search.fit(&x, &y).unwrap();

        let results = search.cv_results();
        assert_eq!(results.len(), 2);
        // Both separate the toy data perfectly, so they tie at rank 1
        assert!(results.iter().all(|r| r.rank_test_score == 1));
        assert_eq!(search.best_index(), Some(0));
        assert_eq!(search.best_score(), Some(1.0));
        assert_eq!(search.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_unknown_key_fails_before_fit() {
        let (x, y) = toy_data();
        let mut grid = ParamGrid::new();
        grid.insert("penalty".to_string(), vec!["l1".into()]);

        let mut search = GridSearchCV::new(Box::new(LogisticRegression::new()), grid);
        let err = search.fit(&x, &y).unwrap_err();
        assert!(matches!(err, EnsembleError::UnknownParameter { .. }));
        assert!(search.cv_results().is_empty());
    }

    #[test]
    fn test_without_refit() {
        let (x, y) = toy_data();
        let mut search = GridSearchCV::new(Box::new(GaussianNB::new()), ParamGrid::new())
            .with_config(GridSearchConfig::new().with_cv_folds(2).with_refit(false).with_parallel(false));
        search.fit(&x, &y).unwrap();

        assert_eq!(search.cv_results().len(), 1);
        assert!(search.best_params().unwrap().is_empty());
        assert!(search.best_estimator().is_none());
        assert!(matches!(search.predict(&x), Err(EnsembleError::NotFitted { .. })));
    }
}
