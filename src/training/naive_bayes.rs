//! Naive Bayes classifiers
//!
//! Implements Gaussian Naive Bayes for continuous features.

use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::error::{EnsembleError, Result};
use super::models::{argmax_labels, check_fit_input, check_n_features, unique_classes, unknown_param, Classifier};
use super::params::{ParamValue, Params};

/// Gaussian Naive Bayes Classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GaussianNB {
    /// Mean of each feature for each class, shape (n_classes, n_features)
    means: Option<Array2<f64>>,
    /// Variance of each feature for each class, shape (n_classes, n_features)
    variances: Option<Array2<f64>>,
    /// Prior probability of each class
    priors: Vec<f64>,
    /// List of classes
    classes: Option<Vec<f64>>,
    /// Portion of the largest feature variance added to all variances
    pub var_smoothing: f64,
}

impl Default for GaussianNB {
    fn default() -> Self {
        Self::new()
    }
}

impl GaussianNB {
    pub fn new() -> Self {
        Self {
            means: None,
            variances: None,
            priors: Vec::new(),
            classes: None,
            var_smoothing: 1e-9,
        }
    }

    /// Set variance smoothing parameter
    pub fn with_var_smoothing(mut self, smoothing: f64) -> Self {
        self.var_smoothing = smoothing;
        self
    }

    /// Get class priors, in `classes()` order
    pub fn class_priors(&self) -> &[f64] {
        &self.priors
    }

    /// Get feature means for each class
    pub fn feature_means(&self) -> Option<&Array2<f64>> {
        self.means.as_ref()
    }

    /// Predict log probabilities
    pub fn predict_log_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let (means, vars) = match (&self.means, &self.variances) {
            (Some(m), Some(v)) => (m, v),
            _ => return Err(EnsembleError::not_fitted(self.name())),
        };
        check_n_features(x, means.ncols())?;

        let n_samples = x.nrows();
        let n_classes = self.priors.len();

        let mut log_probs = Array2::zeros((n_samples, n_classes));

        for (i, row) in x.rows().into_iter().enumerate() {
            for j in 0..n_classes {
                let log_prior = self.priors[j].ln();
                let log_likelihood = Self::log_likelihood(row, means.row(j), vars.row(j));
                log_probs[[i, j]] = log_prior + log_likelihood;
            }
        }

        // Normalize (log-sum-exp trick)
        for mut row in log_probs.rows_mut() {
            let max_val = row.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            let log_sum: f64 = row.iter().map(|&v| (v - max_val).exp()).sum::<f64>().ln();
            for val in row.iter_mut() {
                *val = *val - max_val - log_sum;
            }
        }

        Ok(log_probs)
    }

    fn log_likelihood(x: ArrayView1<f64>, means: ArrayView1<f64>, vars: ArrayView1<f64>) -> f64 {
        x.iter()
            .zip(means.iter())
            .zip(vars.iter())
            .map(|((&xi, &mean), &var)| {
                // Log of Gaussian PDF
                -0.5 * ((xi - mean).powi(2) / var + var.ln() + (2.0 * PI).ln())
            })
            .sum()
    }
}

impl Classifier for GaussianNB {
    fn name(&self) -> &'static str {
        "GaussianNB"
    }

    /// Fit the classifier
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;

        let n_samples = x.nrows();
        let n_features = x.ncols();
        let classes = unique_classes(y);
        let n_classes = classes.len();

        // Smoothing is relative to the widest feature
        let max_var = x
            .var_axis(ndarray::Axis(0), 0.0)
            .iter()
            .cloned()
            .fold(0.0f64, f64::max);
        let epsilon = self.var_smoothing * max_var.max(f64::MIN_POSITIVE);

        let mut means = Array2::zeros((n_classes, n_features));
        let mut variances = Array2::zeros((n_classes, n_features));
        let mut priors = Vec::with_capacity(n_classes);

        for (k, &class) in classes.iter().enumerate() {
            // Single-pass Welford's algorithm for mean and variance
            let mut feature_means = vec![0.0; n_features];
            let mut feature_m2 = vec![0.0; n_features];
            let mut count = 0usize;
            for (row, _) in x.rows().into_iter().zip(y.iter()).filter(|(_, &label)| label == class) {
                count += 1;
                for (j, &val) in row.iter().enumerate() {
                    let delta = val - feature_means[j];
                    feature_means[j] += delta / count as f64;
                    let delta2 = val - feature_means[j];
                    feature_m2[j] += delta * delta2;
                }
            }

            for j in 0..n_features {
                means[[k, j]] = feature_means[j];
                variances[[k, j]] = feature_m2[j] / count as f64 + epsilon;
            }
            priors.push(count as f64 / n_samples as f64);
        }

        self.means = Some(means);
        self.variances = Some(variances);
        self.priors = priors;
        self.classes = Some(classes);

        Ok(())
    }

    /// Predict class labels
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let log_probs = self.predict_log_proba(x)?;
        let classes = self.classes.as_deref().ok_or_else(|| EnsembleError::not_fitted(self.name()))?;
        Ok(argmax_labels(&log_probs, classes))
    }

    /// Predict probabilities
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let log_probs = self.predict_log_proba(x)?;
        Ok(log_probs.mapv(|v| v.exp()))
    }

    fn classes(&self) -> Option<&[f64]> {
        self.classes.as_deref()
    }

    fn get_params(&self) -> Params {
        let mut params = Params::new();
        params.insert("var_smoothing".to_string(), self.var_smoothing.into());
        params
    }

    fn set_param(&mut self, key: &str, value: &ParamValue) -> Result<()> {
        match key {
            "var_smoothing" => self.var_smoothing = value.as_f64(key)?,
            _ => return Err(unknown_param(self.name(), key)),
        }
        Ok(())
    }

    fn clone_box(&self) -> Box<dyn Classifier> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn two_blobs() -> (Array2<f64>, Array1<f64>) {
        let x = array![
            [1.0, 2.0],
            [1.2, 1.8],
            [0.8, 2.2],
            [5.0, 6.0],
            [5.2, 5.8],
            [4.8, 6.2],
        ];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        (x, y)
    }

    #[test]
    fn test_gaussian_nb_fit_predict() {
        let (x, y) = two_blobs();
        let mut nb = GaussianNB::new();
        nb.fit(&x, &y).unwrap();

        assert_eq!(nb.predict(&x).unwrap(), y);
        assert_eq!(nb.class_priors(), &[0.5, 0.5]);

        let means = nb.feature_means().unwrap();
        assert!((means[[0, 0]] - 1.0).abs() < 1e-12);
        assert!((means[[1, 1]] - 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_gaussian_nb_proba() {
        let (x, y) = two_blobs();
        let mut nb = GaussianNB::new();
        nb.fit(&x, &y).unwrap();

        let proba = nb.predict_proba(&array![[1.0, 2.0], [5.0, 6.0]]).unwrap();
        for row in proba.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
        assert!(proba[[0, 0]] > 0.99);
        assert!(proba[[1, 1]] > 0.99);
    }

    #[test]
    fn test_gaussian_nb_not_fitted() {
        let nb = GaussianNB::new();
        let err = nb.predict(&array![[1.0, 2.0]]).unwrap_err();
        assert!(err.to_string().contains("GaussianNB"));
    }
}
