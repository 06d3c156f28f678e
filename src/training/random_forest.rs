//! Random Forest implementation

use crate::error::{EnsembleError, Result};
use super::decision_tree::{encode_labels, Criterion, DecisionTreeClassifier};
use super::models::{argmax_labels, check_fit_input, check_n_features, unique_classes, unknown_param, Classifier};
use super::params::{ParamValue, Params};
use ndarray::{Array1, Array2, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Strategy for max features
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum MaxFeatures {
    /// Square root of n_features
    Sqrt,
    /// Log2 of n_features
    Log2,
    /// Fixed number
    Fixed(usize),
    /// All features
    All,
}

impl MaxFeatures {
    fn to_param(&self) -> ParamValue {
        match self {
            MaxFeatures::Sqrt => ParamValue::Text("sqrt".to_string()),
            MaxFeatures::Log2 => ParamValue::Text("log2".to_string()),
            MaxFeatures::Fixed(n) => ParamValue::from(*n),
            MaxFeatures::All => ParamValue::Text("all".to_string()),
        }
    }

    fn resolve(&self, n_features: usize) -> usize {
        match self {
            MaxFeatures::Sqrt => (n_features as f64).sqrt() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2() as usize,
            MaxFeatures::Fixed(n) => (*n).min(n_features),
            MaxFeatures::All => n_features,
        }
        .max(1)
    }
}

/// Random forest classifier: bagged CART trees with feature subsampling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestClassifier {
    /// Individual trees
    trees: Vec<DecisionTreeClassifier>,
    /// Number of trees
    pub n_estimators: usize,
    /// Maximum depth per tree
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Features considered per split
    pub max_features: MaxFeatures,
    /// Bootstrap sampling
    pub bootstrap: bool,
    /// Impurity criterion
    pub criterion: Criterion,
    /// Random state (42 when unset)
    pub random_state: Option<u64>,
    feature_importances: Option<Array1<f64>>,
    n_features: usize,
    classes: Option<Vec<f64>>,
}

impl Default for RandomForestClassifier {
    fn default() -> Self {
        Self::new(100)
    }
}

impl RandomForestClassifier {
    /// Create a new classifier forest
    pub fn new(n_estimators: usize) -> Self {
        Self {
            trees: Vec::new(),
            n_estimators,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
            criterion: Criterion::Gini,
            random_state: None,
            feature_importances: None,
            n_features: 0,
            classes: None,
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    /// Set max features strategy
    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    /// Set random state
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    pub fn with_bootstrap(mut self, bootstrap: bool) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    fn compute_feature_importances(&mut self) {
        if self.trees.is_empty() {
            return;
        }

        let mut total_importances = Array1::<f64>::zeros(self.n_features);
        for imp in self.trees.iter().filter_map(|t| t.feature_importances()) {
            total_importances += imp;
        }

        // Normalize
        let total = total_importances.sum();
        if total > 0.0 {
            total_importances /= total;
        }

        self.feature_importances = Some(total_importances);
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    /// Get number of trees
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Classifier for RandomForestClassifier {
    fn name(&self) -> &'static str {
        "RandomForestClassifier"
    }

    /// Fit the forest to training data
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        if self.n_estimators == 0 {
            return Err(EnsembleError::InvalidParameter {
                name: "n_estimators".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        let n_samples = x.nrows();
        let n_features = x.ncols();
        let classes = unique_classes(y);
        let encoded = encode_labels(y, &classes);
        let max_features = self.max_features.resolve(n_features);
        let base_seed = self.random_state.unwrap_or(42);

        // Build trees in parallel, one seeded stream per tree
        let trees: Result<Vec<DecisionTreeClassifier>> = (0..self.n_estimators)
            .into_par_iter()
            .map(|tree_idx| {
                let seed = base_seed.wrapping_add(tree_idx as u64);
                let mut rng = ChaCha8Rng::seed_from_u64(seed);

                let sample_indices: Vec<usize> = if self.bootstrap {
                    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
                } else {
                    (0..n_samples).collect()
                };

                let x_boot = x.select(Axis(0), &sample_indices);
                let y_boot: Vec<usize> = sample_indices.iter().map(|&i| encoded[i]).collect();

                let mut tree = DecisionTreeClassifier::new()
                    .with_min_samples_split(self.min_samples_split)
                    .with_min_samples_leaf(self.min_samples_leaf)
                    .with_criterion(self.criterion)
                    .with_max_features(max_features)
                    .with_random_state(rng.gen());
                tree.max_depth = self.max_depth;

                tree.fit_encoded(&x_boot, &y_boot, classes.clone())?;
                Ok(tree)
            })
            .collect();

        self.trees = trees?;
        self.n_features = n_features;
        self.classes = Some(classes);
        self.compute_feature_importances();

        Ok(())
    }

    /// Majority class of the averaged tree probabilities
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        let classes = self.classes.as_deref().ok_or_else(|| EnsembleError::not_fitted(self.name()))?;
        Ok(argmax_labels(&proba, classes))
    }

    /// Mean of the per-tree leaf distributions
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let classes = match (&self.classes, self.trees.is_empty()) {
            (Some(c), false) => c,
            _ => return Err(EnsembleError::not_fitted(self.name())),
        };
        check_n_features(x, self.n_features)?;

        let all_proba: Vec<Array2<f64>> = self
            .trees
            .par_iter()
            .map(|tree| tree.predict_proba(x))
            .collect::<Result<_>>()?;

        let mut proba = Array2::<f64>::zeros((x.nrows(), classes.len()));
        for p in &all_proba {
            proba += p;
        }
        proba /= all_proba.len() as f64;

        Ok(proba)
    }

    fn classes(&self) -> Option<&[f64]> {
        self.classes.as_deref()
    }

    fn get_params(&self) -> Params {
        let mut params = Params::new();
        params.insert("bootstrap".to_string(), self.bootstrap.into());
        params.insert("max_depth".to_string(), self.max_depth.into());
        params.insert("max_features".to_string(), self.max_features.to_param());
        params.insert("min_samples_leaf".to_string(), self.min_samples_leaf.into());
        params.insert("min_samples_split".to_string(), self.min_samples_split.into());
        params.insert("n_estimators".to_string(), self.n_estimators.into());
        params.insert("random_state".to_string(), self.random_state.into());
        params
    }

    fn set_param(&mut self, key: &str, value: &ParamValue) -> Result<()> {
        match key {
            "bootstrap" => self.bootstrap = value.as_bool(key)?,
            "max_depth" => self.max_depth = value.as_opt_usize(key)?,
            "max_features" => {
                self.max_features = match value {
                    ParamValue::Text(s) if s == "sqrt" => MaxFeatures::Sqrt,
                    ParamValue::Text(s) if s == "log2" => MaxFeatures::Log2,
                    ParamValue::Text(s) if s == "all" => MaxFeatures::All,
                    ParamValue::None => MaxFeatures::All,
                    other => MaxFeatures::Fixed(other.as_usize(key)?),
                }
            }
            "min_samples_leaf" => self.min_samples_leaf = value.as_usize(key)?,
            "min_samples_split" => self.min_samples_split = value.as_usize(key)?,
            "n_estimators" => self.n_estimators = value.as_usize(key)?,
            "random_state" => self.random_state = value.as_opt_u64(key)?,
            _ => return Err(unknown_param(self.name(), key)),
        }
        Ok(())
    }

    fn clone_box(&self) -> Box<dyn Classifier> {
        Box::new(self.clone())
    }
}
