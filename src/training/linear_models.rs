//! Linear model implementations

use crate::error::{EnsembleError, Result};
use super::models::{argmax_labels, check_fit_input, check_n_features, unique_classes, unknown_param, Classifier};
use super::params::{ParamValue, Params};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Row-wise softmax, shifted by the row maximum for stability
fn softmax_rows(mut logits: Array2<f64>) -> Array2<f64> {
    for mut row in logits.rows_mut() {
        let max_val = row.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        row.mapv_inplace(|v| (v - max_val).exp());
        let sum = row.sum();
        row.mapv_inplace(|v| v / sum);
    }
    logits
}

/// Multinomial logistic regression with L2 penalty.
///
/// Features are standardized internally before optimization so a single
/// learning rate works across differently scaled inputs. The penalty is
/// parameterized by its inverse strength `c`: the objective is mean
/// cross-entropy plus `||W||² / (2 · c · n)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    /// Inverse regularization strength
    pub c: f64,
    /// Whether to fit intercept
    pub fit_intercept: bool,
    /// Maximum iterations
    pub max_iter: usize,
    /// Convergence tolerance on the gradient norm
    pub tol: f64,
    /// Learning rate
    pub learning_rate: f64,
    /// Fitted coefficients, shape (n_features, n_classes)
    coefficients: Option<Array2<f64>>,
    /// Fitted intercepts, one per class
    intercept: Option<Array1<f64>>,
    /// Feature means used for standardization
    means: Option<Array1<f64>>,
    /// Feature scales used for standardization
    scales: Option<Array1<f64>>,
    classes: Option<Vec<f64>>,
    n_iter: usize,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LogisticRegression {
    /// Create a new logistic regression model
    pub fn new() -> Self {
        Self {
            c: 1.0,
            fit_intercept: true,
            max_iter: 1000,
            tol: 1e-6,
            learning_rate: 0.5,
            coefficients: None,
            intercept: None,
            means: None,
            scales: None,
            classes: None,
            n_iter: 0,
        }
    }

    /// Set inverse regularization strength
    pub fn with_c(mut self, c: f64) -> Self {
        self.c = c;
        self
    }

    /// Set maximum iterations
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Set learning rate
    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    pub fn with_fit_intercept(mut self, fit_intercept: bool) -> Self {
        self.fit_intercept = fit_intercept;
        self
    }

    /// Iterations run by the last fit
    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    /// Fitted coefficients, shape (n_features, n_classes)
    pub fn coefficients(&self) -> Option<&Array2<f64>> {
        self.coefficients.as_ref()
    }

    fn standardize(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        match (&self.means, &self.scales) {
            (Some(means), Some(scales)) => Ok((x - means) / scales),
            _ => Err(EnsembleError::not_fitted(self.name())),
        }
    }

    fn validate(&self) -> Result<()> {
        if !(self.c > 0.0) {
            return Err(EnsembleError::InvalidParameter {
                name: "C".to_string(),
                value: self.c.to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if !(self.learning_rate > 0.0) {
            return Err(EnsembleError::InvalidParameter {
                name: "learning_rate".to_string(),
                value: self.learning_rate.to_string(),
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}

impl Classifier for LogisticRegression {
    fn name(&self) -> &'static str {
        "LogisticRegression"
    }

    /// Fit the model using full-batch gradient descent
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        self.validate()?;

        let classes = unique_classes(y);
        if classes.len() < 2 {
            return Err(EnsembleError::ValidationError(format!(
                "LogisticRegression needs samples of at least 2 classes, got {}",
                classes.len()
            )));
        }

        let n_samples = x.nrows();
        let n_features = x.ncols();
        let n_classes = classes.len();
        let n = n_samples as f64;

        let means = x.mean_axis(Axis(0)).ok_or_else(|| {
            EnsembleError::ValidationError("Cannot standardize empty input".to_string())
        })?;
        let scales = x.std_axis(Axis(0), 0.0).mapv(|s| if s > 1e-12 { s } else { 1.0 });
        let xs = (x - &means) / &scales;

        // One-hot targets
        let mut targets = Array2::<f64>::zeros((n_samples, n_classes));
        for (i, label) in y.iter().enumerate() {
            if let Some(k) = classes.iter().position(|c| c == label) {
                targets[[i, k]] = 1.0;
            }
        }

        let mut weights = Array2::<f64>::zeros((n_features, n_classes));
        let mut bias = Array1::<f64>::zeros(n_classes);
        let penalty = 1.0 / (self.c * n);
        let lr = self.learning_rate;

        self.n_iter = 0;
        let mut converged = false;
        for _ in 0..self.max_iter {
            self.n_iter += 1;

            let proba = softmax_rows(xs.dot(&weights) + &bias);
            let errors = proba - &targets;

            let dw = xs.t().dot(&errors) / n + &weights * penalty;
            let db = if self.fit_intercept {
                errors.sum_axis(Axis(0)) / n
            } else {
                Array1::zeros(n_classes)
            };

            let grad_norm = (dw.mapv(|v| v * v).sum() + db.mapv(|v| v * v).sum()).sqrt();
            if grad_norm < self.tol {
                converged = true;
                break;
            }

            weights.scaled_add(-lr, &dw);
            bias.scaled_add(-lr, &db);
        }

        if !converged {
            debug!(max_iter = self.max_iter, "LogisticRegression did not converge");
        }

        self.coefficients = Some(weights);
        self.intercept = Some(bias);
        self.means = Some(means);
        self.scales = Some(scales);
        self.classes = Some(classes);

        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        let classes = self.classes.as_deref().ok_or_else(|| EnsembleError::not_fitted(self.name()))?;
        Ok(argmax_labels(&proba, classes))
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let (weights, bias) = match (&self.coefficients, &self.intercept) {
            (Some(w), Some(b)) => (w, b),
            _ => return Err(EnsembleError::not_fitted(self.name())),
        };
        check_n_features(x, weights.nrows())?;

        let xs = self.standardize(x)?;
        Ok(softmax_rows(xs.dot(weights) + bias))
    }

    fn classes(&self) -> Option<&[f64]> {
        self.classes.as_deref()
    }

    fn get_params(&self) -> Params {
        let mut params = Params::new();
        params.insert("C".to_string(), self.c.into());
        params.insert("fit_intercept".to_string(), self.fit_intercept.into());
        params.insert("learning_rate".to_string(), self.learning_rate.into());
        params.insert("max_iter".to_string(), self.max_iter.into());
        params.insert("tol".to_string(), self.tol.into());
        params
    }

    fn set_param(&mut self, key: &str, value: &ParamValue) -> Result<()> {
        match key {
            "C" => self.c = value.as_f64(key)?,
            "fit_intercept" => self.fit_intercept = value.as_bool(key)?,
            "learning_rate" => self.learning_rate = value.as_f64(key)?,
            "max_iter" => self.max_iter = value.as_usize(key)?,
            "tol" => self.tol = value.as_f64(key)?,
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

    #[test]
    fn test_logistic_regression_binary() {
        // Simple linearly separable data
        let x = array![
            [1.0, 1.0],
            [1.5, 1.5],
            [2.0, 2.0],
            [5.0, 5.0],
            [5.5, 5.5],
            [6.0, 6.0],
        ];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];

        let mut model = LogisticRegression::new().with_max_iter(1000);
        model.fit(&x, &y).unwrap();
        assert!(model.is_fitted());

        let accuracy = model.score(&x, &y).unwrap();
        assert!(accuracy >= 0.99, "Accuracy should be 1.0, got {}", accuracy);
    }

    #[test]
    fn test_logistic_regression_multiclass() {
        let x = array![
            [0.0, 0.0],
            [0.2, 0.1],
            [5.0, 0.0],
            [5.2, 0.1],
            [0.0, 5.0],
            [0.1, 5.2],
        ];
        let y = array![0.0, 0.0, 1.0, 1.0, 2.0, 2.0];

        let mut model = LogisticRegression::new();
        model.fit(&x, &y).unwrap();

        assert_eq!(model.classes().unwrap(), &[0.0, 1.0, 2.0]);
        assert_eq!(model.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_predict_proba_rows_sum_to_one() {
        let x = array![[0.0, 0.0], [10.0, 10.0], [5.0, 4.0]];
        let y = array![0.0, 1.0, 1.0];

        let mut model = LogisticRegression::new().with_max_iter(500);
        model.fit(&x, &y).unwrap();

        let proba = model.predict_proba(&x).unwrap();
        assert_eq!(proba.dim(), (3, 2));
        for row in proba.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
        assert!(proba[[0, 0]] > 0.5);
        assert!(proba[[1, 1]] > 0.5);
    }

    #[test]
    fn test_not_fitted() {
        let model = LogisticRegression::new();
        let x = array![[1.0, 2.0]];
        assert!(matches!(model.predict(&x), Err(EnsembleError::NotFitted { .. })));
        assert!(matches!(model.predict_proba(&x), Err(EnsembleError::NotFitted { .. })));
    }

    #[test]
    fn test_single_class_rejected() {
        let x = array![[1.0], [2.0]];
        let y = array![1.0, 1.0];
        let mut model = LogisticRegression::new();
        assert!(matches!(model.fit(&x, &y), Err(EnsembleError::ValidationError(_))));
    }

    #[test]
    fn test_params_roundtrip() {
        let mut model = LogisticRegression::new();
        model.set_param("C", &ParamValue::Float(100.0)).unwrap();
        model.set_param("max_iter", &ParamValue::Int(50)).unwrap();
        assert_eq!(model.get_params()["C"], ParamValue::Float(100.0));
        assert_eq!(model.max_iter, 50);
        assert!(matches!(
            model.set_param("penalty", &ParamValue::Text("l1".into())),
            Err(EnsembleError::UnknownParameter { .. })
        ));
    }

    #[test]
    fn test_feature_mismatch() {
        let x = array![[0.0, 0.0], [1.0, 1.0]];
        let y = array![0.0, 1.0];
        let mut model = LogisticRegression::new();
        model.fit(&x, &y).unwrap();
        assert!(matches!(
            model.predict(&array![[1.0, 2.0, 3.0]]),
            Err(EnsembleError::ShapeError { .. })
        ));
    }
}
