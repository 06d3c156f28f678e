//! Estimator contract and evaluation metrics

use crate::error::{EnsembleError, Result};
use super::params::{ParamValue, Params};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Metrics for classifier evaluation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetrics {
    /// Accuracy
    pub accuracy: f64,
    /// Macro-averaged precision
    pub precision: f64,
    /// Macro-averaged recall
    pub recall: f64,
    /// Macro-averaged F1 score
    pub f1_score: f64,
    /// Number of evaluated samples
    pub n_samples: usize,
}

impl ModelMetrics {
    /// Compute classification metrics from true and predicted labels
    pub fn compute_classification(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<Self> {
        check_same_len(y_true, y_pred)?;

        let classes = unique_classes(y_true);
        let mut precision_sum = 0.0;
        let mut recall_sum = 0.0;
        let mut f1_sum = 0.0;

        // One-vs-rest counts per class
        for &class in &classes {
            let mut tp = 0usize;
            let mut fp = 0usize;
            let mut fn_ = 0usize;
            for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
                match (t == class, p == class) {
                    (true, true) => tp += 1,
                    (false, true) => fp += 1,
                    (true, false) => fn_ += 1,
                    (false, false) => {}
                }
            }

            let precision = if tp + fp > 0 { tp as f64 / (tp + fp) as f64 } else { 0.0 };
            let recall = if tp + fn_ > 0 { tp as f64 / (tp + fn_) as f64 } else { 0.0 };
            let f1 = if precision + recall > 0.0 {
                2.0 * precision * recall / (precision + recall)
            } else {
                0.0
            };

            precision_sum += precision;
            recall_sum += recall;
            f1_sum += f1;
        }

        let n_classes = classes.len().max(1) as f64;

        Ok(Self {
            accuracy: accuracy_score(y_true, y_pred)?,
            precision: precision_sum / n_classes,
            recall: recall_sum / n_classes,
            f1_score: f1_sum / n_classes,
            n_samples: y_true.len(),
        })
    }
}

fn check_same_len(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<()> {
    if y_true.len() != y_pred.len() {
        return Err(EnsembleError::ShapeError {
            expected: format!("y_pred length = {}", y_true.len()),
            actual: format!("y_pred length = {}", y_pred.len()),
        });
    }
    if y_true.is_empty() {
        return Err(EnsembleError::ValidationError(
            "Cannot score an empty label vector".to_string(),
        ));
    }
    Ok(())
}

/// Fraction of exactly matching labels
pub fn accuracy_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    check_same_len(y_true, y_pred)?;

    let correct = y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|(t, p)| t == p)
        .count();

    Ok(correct as f64 / y_true.len() as f64)
}

/// Sorted distinct labels
pub fn unique_classes(y: &Array1<f64>) -> Vec<f64> {
    let mut classes: Vec<f64> = y.iter().copied().collect();
    classes.sort_by(|a, b| a.total_cmp(b));
    classes.dedup();
    classes
}

/// Index of the largest value in each row, mapped through `classes`
pub(crate) fn argmax_labels(proba: &Array2<f64>, classes: &[f64]) -> Array1<f64> {
    proba
        .rows()
        .into_iter()
        .map(|row| {
            let best = row
                .iter()
                .enumerate()
                .fold((0usize, f64::NEG_INFINITY), |(bi, bv), (i, &v)| {
                    if v > bv { (i, v) } else { (bi, bv) }
                })
                .0;
            classes[best]
        })
        .collect()
}

/// Validate training inputs shared by every estimator
pub(crate) fn check_fit_input(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(EnsembleError::ShapeError {
            expected: format!("y length = {}", x.nrows()),
            actual: format!("y length = {}", y.len()),
        });
    }
    if x.nrows() == 0 || x.ncols() == 0 {
        return Err(EnsembleError::ValidationError(format!(
            "Found array with shape ({}, {}); at least one sample and one feature are required",
            x.nrows(),
            x.ncols()
        )));
    }
    Ok(())
}

/// Validate feature count at prediction time
pub(crate) fn check_n_features(x: &Array2<f64>, expected: usize) -> Result<()> {
    if x.ncols() != expected {
        return Err(EnsembleError::ShapeError {
            expected: format!("{} features", expected),
            actual: format!("{} features", x.ncols()),
        });
    }
    Ok(())
}

/// Contract shared by every classifier, including composite ones.
///
/// Probability columns returned by [`Classifier::predict_proba`] follow the
/// order of [`Classifier::classes`]. Hyperparameters are exposed through
/// [`Classifier::get_params`] / [`Classifier::set_param`] so that model
/// selection utilities can drive any implementation by name.
pub trait Classifier: Send + Sync + fmt::Debug {
    /// Type name, e.g. `"GaussianNB"`
    fn name(&self) -> &'static str;

    /// Fit the model to training data
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Predict class labels
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Predict class probabilities, one column per class
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>>;

    /// Sorted class labels seen during fit
    fn classes(&self) -> Option<&[f64]>;

    fn is_fitted(&self) -> bool {
        self.classes().is_some()
    }

    /// Current hyperparameters
    fn get_params(&self) -> Params;

    /// Set one hyperparameter by name
    fn set_param(&mut self, key: &str, value: &ParamValue) -> Result<()>;

    fn set_params(&mut self, params: &Params) -> Result<()> {
        for (key, value) in params {
            self.set_param(key, value)?;
        }
        Ok(())
    }

    /// Boxed copy with the same hyperparameters
    fn clone_box(&self) -> Box<dyn Classifier>;

    /// Mean accuracy on the given data
    fn score(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<f64> {
        let y_pred = self.predict(x)?;
        accuracy_score(y, &y_pred)
    }
}

impl Clone for Box<dyn Classifier> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Unknown-parameter error for `estimator`
pub(crate) fn unknown_param(estimator: &str, key: &str) -> EnsembleError {
    EnsembleError::UnknownParameter {
        estimator: estimator.to_string(),
        name: key.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_classification_metrics() {
        let y_true = array![0.0, 1.0, 2.0, 2.0, 1.0, 0.0];
        let y_pred = array![0.0, 1.0, 2.0, 1.0, 1.0, 0.0];

        let metrics = ModelMetrics::compute_classification(&y_true, &y_pred).unwrap();

        assert!((metrics.accuracy - 5.0 / 6.0).abs() < 1e-12);
        assert!(metrics.recall < 1.0);
        assert!(metrics.f1_score > 0.5);
        assert_eq!(metrics.n_samples, 6);
    }

    #[test]
    fn test_accuracy_shape_mismatch() {
        let y_true = array![0.0, 1.0];
        let y_pred = array![0.0];
        assert!(accuracy_score(&y_true, &y_pred).is_err());
    }

    #[test]
    fn test_unique_classes_sorted() {
        let y = array![2.0, 0.0, 1.0, 2.0, 0.0];
        assert_eq!(unique_classes(&y), vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_argmax_labels() {
        let proba = array![[0.1, 0.7, 0.2], [0.5, 0.25, 0.25]];
        let labels = argmax_labels(&proba, &[3.0, 5.0, 7.0]);
        assert_eq!(labels, array![5.0, 3.0]);
    }
}
