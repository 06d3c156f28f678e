//! Decision tree implementation

use crate::error::{EnsembleError, Result};
use super::models::{argmax_labels, check_fit_input, check_n_features, unique_classes, unknown_param, Classifier};
use super::params::{ParamValue, Params};
use ndarray::{Array1, Array2, ArrayView1};
use rand::seq::index::sample;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node with class distribution
    Leaf {
        distribution: Vec<f64>,
        n_samples: usize,
    },
    /// Internal node with split
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
        impurity: f64,
    },
}

/// Impurity criterion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum Criterion {
    /// Gini impurity
    Gini,
    /// Entropy
    Entropy,
}

impl Criterion {
    fn as_str(&self) -> &'static str {
        match self {
            Criterion::Gini => "gini",
            Criterion::Entropy => "entropy",
        }
    }

    fn parse(name: &str) -> Option<Self> {
        match name {
            "gini" => Some(Criterion::Gini),
            "entropy" => Some(Criterion::Entropy),
            _ => None,
        }
    }

    /// Impurity of a node from its class counts
    fn impurity(&self, counts: &[usize], total: usize) -> f64 {
        if total == 0 {
            return 0.0;
        }
        let n = total as f64;
        match self {
            Criterion::Gini => {
                1.0 - counts
                    .iter()
                    .map(|&c| (c as f64 / n).powi(2))
                    .sum::<f64>()
            }
            Criterion::Entropy => -counts
                .iter()
                .filter(|&&c| c > 0)
                .map(|&c| {
                    let p = c as f64 / n;
                    p * p.ln()
                })
                .sum::<f64>(),
        }
    }
}

/// Best split found for one feature: (feature, threshold, gain)
type SplitCandidate = (usize, f64, f64);

/// CART classification tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTreeClassifier {
    /// Tree root
    root: Option<TreeNode>,
    /// Maximum depth
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Number of features sampled at each split (all when `None`)
    pub max_features: Option<usize>,
    /// Impurity criterion
    pub criterion: Criterion,
    /// Seed for feature sampling
    pub random_state: Option<u64>,
    n_features: usize,
    feature_importances: Option<Array1<f64>>,
    classes: Option<Vec<f64>>,
}

impl Default for DecisionTreeClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionTreeClassifier {
    pub fn new() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            criterion: Criterion::Gini,
            random_state: None,
            n_features: 0,
            feature_importances: None,
            classes: None,
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set minimum samples to split
    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples;
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    pub fn with_max_features(mut self, max_features: usize) -> Self {
        self.max_features = Some(max_features);
        self
    }

    /// Set criterion
    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Fit on labels already encoded as indices into `classes`.
    ///
    /// Used by the forest so every tree reports probabilities over the full
    /// class list even when its bootstrap sample misses a class.
    pub(crate) fn fit_encoded(&mut self, x: &Array2<f64>, y: &[usize], classes: Vec<f64>) -> Result<()> {
        if x.nrows() != y.len() {
            return Err(EnsembleError::ShapeError {
                expected: format!("y length = {}", x.nrows()),
                actual: format!("y length = {}", y.len()),
            });
        }

        self.n_features = x.ncols();
        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state.unwrap_or(42));
        let mut importances = vec![0.0; self.n_features];

        let indices: Vec<usize> = (0..x.nrows()).collect();
        let root = self.build_tree(x, y, classes.len(), &indices, 0, &mut rng, &mut importances);

        // Normalize feature importances
        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }

        self.root = Some(root);
        self.feature_importances = Some(Array1::from_vec(importances));
        self.classes = Some(classes);
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn build_tree(
        &self,
        x: &Array2<f64>,
        y: &[usize],
        n_classes: usize,
        indices: &[usize],
        depth: usize,
        rng: &mut ChaCha8Rng,
        importances: &mut [f64],
    ) -> TreeNode {
        let n_samples = indices.len();
        let counts = class_counts(y, indices, n_classes);
        let impurity = self.criterion.impurity(&counts, n_samples);

        // Check stopping conditions
        let should_stop = n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d)
            || impurity <= 0.0;

        if should_stop {
            return leaf(&counts, n_samples);
        }

        let features = self.sample_features(rng);
        match self.find_best_split(x, y, n_classes, indices, &features, impurity) {
            Some((feature_idx, threshold, gain)) => {
                let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
                    .iter()
                    .partition(|&&i| x[[i, feature_idx]] <= threshold);

                if left_indices.is_empty() || right_indices.is_empty() {
                    return leaf(&counts, n_samples);
                }

                importances[feature_idx] += n_samples as f64 * gain;

                let left = Box::new(self.build_tree(x, y, n_classes, &left_indices, depth + 1, rng, importances));
                let right = Box::new(self.build_tree(x, y, n_classes, &right_indices, depth + 1, rng, importances));

                TreeNode::Split {
                    feature_idx,
                    threshold,
                    left,
                    right,
                    n_samples,
                    impurity,
                }
            }
            None => leaf(&counts, n_samples),
        }
    }

    fn sample_features(&self, rng: &mut ChaCha8Rng) -> Vec<usize> {
        match self.max_features {
            Some(k) if k > 0 && k < self.n_features => {
                let mut features = sample(rng, self.n_features, k).into_vec();
                features.sort_unstable();
                features
            }
            _ => (0..self.n_features).collect(),
        }
    }

    fn find_best_split(
        &self,
        x: &Array2<f64>,
        y: &[usize],
        n_classes: usize,
        indices: &[usize],
        features: &[usize],
        parent_impurity: f64,
    ) -> Option<SplitCandidate> {
        let n = indices.len();
        let min_leaf = self.min_samples_leaf.max(1);

        // Each feature independently finds its best split
        let feature_results: Vec<Option<SplitCandidate>> = features
            .par_iter()
            .map(|&feature_idx| {
                let mut column: Vec<(f64, usize)> = indices.iter().map(|&i| (x[[i, feature_idx]], y[i])).collect();
                column.sort_by(|a, b| a.0.total_cmp(&b.0));

                let mut left_counts = vec![0usize; n_classes];
                let mut right_counts = vec![0usize; n_classes];
                for &(_, class) in &column {
                    right_counts[class] += 1;
                }

                let mut best: Option<SplitCandidate> = None;
                for pos in 0..n - 1 {
                    let (value, class) = column[pos];
                    left_counts[class] += 1;
                    right_counts[class] -= 1;

                    let next_value = column[pos + 1].0;
                    if next_value <= value {
                        continue;
                    }

                    let left_n = pos + 1;
                    let right_n = n - left_n;
                    if left_n < min_leaf || right_n < min_leaf {
                        continue;
                    }

                    let weighted = (left_n as f64 * self.criterion.impurity(&left_counts, left_n)
                        + right_n as f64 * self.criterion.impurity(&right_counts, right_n))
                        / n as f64;
                    let gain = parent_impurity - weighted;

                    if gain > best.map_or(1e-12, |b| b.2) {
                        // Midpoint of adjacent floats can round up to `next_value`
                        let mid = (value + next_value) / 2.0;
                        let threshold = if mid < next_value { mid } else { value };
                        best = Some((feature_idx, threshold, gain));
                    }
                }
                best
            })
            .collect();

        // Best across features; earliest feature wins ties
        feature_results
            .into_iter()
            .flatten()
            .fold(None, |acc: Option<SplitCandidate>, cand| match acc {
                Some(best) if best.2 >= cand.2 => Some(best),
                _ => Some(cand),
            })
    }

    fn predict_sample<'a>(&self, node: &'a TreeNode, sample: ArrayView1<f64>) -> &'a [f64] {
        match node {
            TreeNode::Leaf { distribution, .. } => distribution.as_slice(),
            TreeNode::Split { feature_idx, threshold, left, right, .. } => {
                if sample[*feature_idx] <= *threshold {
                    self.predict_sample(left, sample)
                } else {
                    self.predict_sample(right, sample)
                }
            }
        }
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    /// Get tree depth
    pub fn get_depth(&self) -> usize {
        self.root.as_ref().map_or(0, node_depth)
    }

    /// Get number of leaves
    pub fn get_n_leaves(&self) -> usize {
        self.root.as_ref().map_or(0, count_leaves)
    }
}

fn class_counts(y: &[usize], indices: &[usize], n_classes: usize) -> Vec<usize> {
    let mut counts = vec![0usize; n_classes];
    for &i in indices {
        counts[y[i]] += 1;
    }
    counts
}

fn leaf(counts: &[usize], n_samples: usize) -> TreeNode {
    let total = n_samples.max(1) as f64;
    TreeNode::Leaf {
        distribution: counts.iter().map(|&c| c as f64 / total).collect(),
        n_samples,
    }
}

fn node_depth(node: &TreeNode) -> usize {
    match node {
        TreeNode::Leaf { .. } => 0,
        TreeNode::Split { left, right, .. } => 1 + node_depth(left).max(node_depth(right)),
    }
}

fn count_leaves(node: &TreeNode) -> usize {
    match node {
        TreeNode::Leaf { .. } => 1,
        TreeNode::Split { left, right, .. } => count_leaves(left) + count_leaves(right),
    }
}

/// Encode labels as indices into the sorted class list
pub(crate) fn encode_labels(y: &Array1<f64>, classes: &[f64]) -> Vec<usize> {
    y.iter()
        .map(|label| classes.iter().position(|c| c == label).unwrap_or(0))
        .collect()
}

impl Classifier for DecisionTreeClassifier {
    fn name(&self) -> &'static str {
        "DecisionTreeClassifier"
    }

    /// Fit the tree to training data
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        let classes = unique_classes(y);
        let encoded = encode_labels(y, &classes);
        self.fit_encoded(x, &encoded, classes)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        let classes = self.classes.as_deref().ok_or_else(|| EnsembleError::not_fitted(self.name()))?;
        Ok(argmax_labels(&proba, classes))
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let (root, classes) = match (&self.root, &self.classes) {
            (Some(r), Some(c)) => (r, c),
            _ => return Err(EnsembleError::not_fitted(self.name())),
        };
        check_n_features(x, self.n_features)?;

        let mut proba = Array2::zeros((x.nrows(), classes.len()));
        for (i, sample) in x.rows().into_iter().enumerate() {
            let distribution = self.predict_sample(root, sample);
            for (j, &p) in distribution.iter().enumerate() {
                proba[[i, j]] = p;
            }
        }
        Ok(proba)
    }

    fn classes(&self) -> Option<&[f64]> {
        self.classes.as_deref()
    }

    fn get_params(&self) -> Params {
        let mut params = Params::new();
        params.insert("criterion".to_string(), self.criterion.as_str().into());
        params.insert("max_depth".to_string(), self.max_depth.into());
        params.insert("max_features".to_string(), self.max_features.into());
        params.insert("min_samples_leaf".to_string(), self.min_samples_leaf.into());
        params.insert("min_samples_split".to_string(), self.min_samples_split.into());
        params.insert("random_state".to_string(), self.random_state.into());
        params
    }

    fn set_param(&mut self, key: &str, value: &ParamValue) -> Result<()> {
        match key {
            "criterion" => {
                let name = value.as_str(key)?;
                self.criterion = Criterion::parse(name).ok_or_else(|| EnsembleError::InvalidParameter {
                    name: key.to_string(),
                    value: name.to_string(),
                    reason: "expected 'gini' or 'entropy'".to_string(),
                })?;
            }
            "max_depth" => self.max_depth = value.as_opt_usize(key)?,
            "max_features" => self.max_features = value.as_opt_usize(key)?,
            "min_samples_leaf" => self.min_samples_leaf = value.as_usize(key)?,
            "min_samples_split" => self.min_samples_split = value.as_usize(key)?,
            "random_state" => self.random_state = value.as_opt_u64(key)?,
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
    fn test_classifier_simple() {
        let x = array![
            [0.0, 0.0],
            [0.0, 1.0],
            [1.0, 0.0],
            [1.0, 1.0],
        ];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut tree = DecisionTreeClassifier::new();
        tree.fit(&x, &y).unwrap();

        assert_eq!(tree.predict(&x).unwrap(), y);
        assert_eq!(tree.get_depth(), 1);
        assert_eq!(tree.get_n_leaves(), 2);
    }

    #[test]
    fn test_max_depth() {
        let x = array![
            [1.0, 1.0],
            [2.0, 2.0],
            [3.0, 3.0],
            [4.0, 4.0],
            [5.0, 5.0],
            [6.0, 6.0],
        ];
        let y = array![0.0, 1.0, 0.0, 1.0, 0.0, 1.0];

        let mut tree = DecisionTreeClassifier::new().with_max_depth(2);
        tree.fit(&x, &y).unwrap();

        assert!(tree.get_depth() <= 2);
    }

    #[test]
    fn test_feature_importances() {
        let x = array![
            [1.0, 0.0],
            [2.0, 0.0],
            [3.0, 0.0],
            [4.0, 0.0],
        ];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut tree = DecisionTreeClassifier::new();
        tree.fit(&x, &y).unwrap();

        let importances = tree.feature_importances().unwrap();
        assert!((importances[0] - 1.0).abs() < 1e-12);
        assert_eq!(importances[1], 0.0);
    }

    #[test]
    fn test_leaf_probabilities() {
        let x = array![[0.0], [0.0], [0.0], [1.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut tree = DecisionTreeClassifier::new();
        tree.fit(&x, &y).unwrap();

        let proba = tree.predict_proba(&array![[0.0], [1.0]]).unwrap();
        assert!((proba[[0, 0]] - 2.0 / 3.0).abs() < 1e-12);
        assert!((proba[[1, 1]] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_criterion_param() {
        let mut tree = DecisionTreeClassifier::new();
        tree.set_param("criterion", &ParamValue::Text("entropy".into())).unwrap();
        assert_eq!(tree.criterion, Criterion::Entropy);
        assert!(tree.set_param("criterion", &ParamValue::Text("mse".into())).is_err());
        tree.set_param("max_depth", &ParamValue::None).unwrap();
        assert_eq!(tree.max_depth, None);
    }

    #[test]
    fn test_adjacent_float_split() {
        let a = 1.0000000000000002_f64;
        let b = f64::from_bits(a.to_bits() + 1);
        let x = array![[a], [b]];
        let y = array![0.0, 1.0];

        let mut tree = DecisionTreeClassifier::new();
        tree.fit(&x, &y).unwrap();

        assert_eq!(tree.predict(&x).unwrap(), y);
        assert_eq!(tree.get_n_leaves(), 2);
        assert_eq!(tree.get_depth(), 1);
    }
}
