//! Stacking ensemble method
//!
//! A [`StackingClassifier`] fits a list of base classifiers, turns their
//! outputs into meta-features and fits a meta-classifier on top. Meta-features
//! are either the base predictions (one column per classifier) or their class
//! probabilities, averaged or concatenated across classifiers.

use crate::error::{EnsembleError, Result};
use crate::training::cross_validation::{CrossValidator, CVStrategy};
use crate::training::{check_fit_input, check_n_features, unique_classes, unknown_param};
use crate::training::{Classifier, ParamValue, Params};
use super::naming::{meta_name, name_estimators, split_param_key, PARAM_SEPARATOR};
use ndarray::{concatenate, Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Configuration for stacking ensemble
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StackingConfig {
    /// Use class probabilities instead of predicted labels as meta-features
    pub use_probas: bool,
    /// Average probabilities across classifiers instead of concatenating them
    pub average_probas: bool,
    /// Logging volume: 0 silent, 1 progress, 2 parameters, >2 forwarded to nested estimators
    pub verbose: u8,
    /// Whether to include original features in meta-learner input
    pub passthrough: bool,
    /// Fit the meta-classifier on out-of-fold meta-features from this many folds
    pub cv_folds: Option<usize>,
    /// Shuffle before the out-of-fold split
    pub shuffle: bool,
    /// Random seed for the shuffled split
    pub random_state: Option<u64>,
    /// Keep the meta-features the meta-classifier was trained on
    pub store_train_meta_features: bool,
}

impl Default for StackingConfig {
    fn default() -> Self {
        Self {
            use_probas: false,
            average_probas: true,
            verbose: 0,
            passthrough: false,
            cv_folds: None,
            shuffle: false,
            random_state: None,
            store_train_meta_features: false,
        }
    }
}

impl StackingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_use_probas(mut self, use_probas: bool) -> Self {
        self.use_probas = use_probas;
        self
    }

    pub fn with_average_probas(mut self, average_probas: bool) -> Self {
        self.average_probas = average_probas;
        self
    }

    pub fn with_verbose(mut self, verbose: u8) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_passthrough(mut self, passthrough: bool) -> Self {
        self.passthrough = passthrough;
        self
    }

    /// Generate training meta-features from `n_folds` stratified folds
    pub fn with_cv_folds(mut self, n_folds: usize) -> Self {
        self.cv_folds = Some(n_folds);
        self
    }

    pub fn with_shuffle(mut self, shuffle: bool, random_state: Option<u64>) -> Self {
        self.shuffle = shuffle;
        self.random_state = random_state;
        self
    }

    pub fn with_store_train_meta_features(mut self, store: bool) -> Self {
        self.store_train_meta_features = store;
        self
    }

    /// Parse from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// State produced by a successful fit
#[derive(Debug, Clone)]
struct FittedStack {
    classifiers: Vec<Box<dyn Classifier>>,
    meta_classifier: Box<dyn Classifier>,
    classes: Vec<f64>,
    n_features: usize,
    train_meta_features: Option<Array2<f64>>,
}

/// Stacking classifier
#[derive(Debug, Clone)]
pub struct StackingClassifier {
    config: StackingConfig,
    /// Configured base classifiers (never fitted in place)
    classifiers: Vec<Box<dyn Classifier>>,
    /// Configured meta-classifier
    meta_classifier: Box<dyn Classifier>,
    fitted: Option<FittedStack>,
}

impl StackingClassifier {
    /// Create a new stacking classifier with the default configuration
    pub fn new(classifiers: Vec<Box<dyn Classifier>>, meta_classifier: Box<dyn Classifier>) -> Self {
        Self {
            config: StackingConfig::default(),
            classifiers,
            meta_classifier,
            fitted: None,
        }
    }

    pub fn with_config(mut self, config: StackingConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &StackingConfig {
        &self.config
    }

    /// Configured base classifiers
    pub fn classifiers(&self) -> &[Box<dyn Classifier>] {
        &self.classifiers
    }

    /// Configured meta-classifier
    pub fn meta_classifier(&self) -> &dyn Classifier {
        self.meta_classifier.as_ref()
    }

    /// Base classifiers paired with their generated parameter keys
    pub fn named_classifiers(&self) -> Vec<(String, &dyn Classifier)> {
        name_estimators(&self.classifiers)
            .into_iter()
            .zip(self.classifiers.iter().map(|c| c.as_ref()))
            .collect()
    }

    /// Fitted clones of the base classifiers
    pub fn fitted_classifiers(&self) -> Result<&[Box<dyn Classifier>]> {
        Ok(&self.fitted()?.classifiers)
    }

    /// Fitted clone of the meta-classifier
    pub fn fitted_meta_classifier(&self) -> Result<&dyn Classifier> {
        Ok(self.fitted()?.meta_classifier.as_ref())
    }

    /// Meta-features the meta-classifier was trained on, when stored
    pub fn train_meta_features(&self) -> Option<&Array2<f64>> {
        self.fitted.as_ref().and_then(|f| f.train_meta_features.as_ref())
    }

    fn fitted(&self) -> Result<&FittedStack> {
        self.fitted
            .as_ref()
            .ok_or_else(|| EnsembleError::not_fitted(self.name()))
    }

    /// Meta-features for `x` computed with the fitted base classifiers
    pub fn predict_meta_features(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let fitted = self.fitted()?;
        check_n_features(x, fitted.n_features)?;
        build_meta_features(&self.config, &fitted.classifiers, &fitted.classes, x)
    }

    fn fit_base_classifiers(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<Vec<Box<dyn Classifier>>> {
        let verbose = self.config.verbose;
        let n_classifiers = self.classifiers.len();

        if verbose > 0 {
            info!(n_classifiers, "Fitting {} classifiers...", n_classifiers);
        }

        let mut fitted = Vec::with_capacity(n_classifiers);
        for (i, (name, classifier)) in self.named_classifiers().into_iter().enumerate() {
            let mut model = classifier.clone_box();

            if verbose > 0 {
                info!(
                    classifier = %name,
                    "Fitting classifier{}: {} ({}/{})",
                    i + 1,
                    name,
                    i + 1,
                    n_classifiers
                );
            }
            if verbose > 2 && model.get_params().contains_key("verbose") {
                model.set_param("verbose", &ParamValue::Int(i64::from(verbose - 2)))?;
            }
            if verbose > 1 {
                info!(classifier = %name, params = ?model.get_params(), "Classifier parameters");
            }

            model.fit(x, y)?;
            fitted.push(model);
        }

        Ok(fitted)
    }

    /// Training meta-features from classifiers fitted on the complementary folds
    fn out_of_fold_meta_features(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        classes: &[f64],
        n_folds: usize,
    ) -> Result<Array2<f64>> {
        let mut validator = CrossValidator::new(CVStrategy::StratifiedKFold {
            n_splits: n_folds,
            shuffle: self.config.shuffle,
        });
        if let Some(seed) = self.config.random_state {
            validator = validator.with_random_state(seed);
        }
        let splits = validator.split(x.nrows(), Some(y))?;

        let mut meta_features: Option<Array2<f64>> = None;
        for split in &splits {
            if self.config.verbose > 1 {
                info!(fold = split.fold_idx + 1, n_folds, "Generating out-of-fold meta-features");
            }

            let x_train = x.select(Axis(0), &split.train_indices);
            let y_train = y.select(Axis(0), &split.train_indices);
            let x_test = x.select(Axis(0), &split.test_indices);

            let fold_models = self
                .classifiers
                .iter()
                .map(|c| -> Result<Box<dyn Classifier>> {
                    let mut model = c.clone_box();
                    model.fit(&x_train, &y_train)?;
                    Ok(model)
                })
                .collect::<Result<Vec<_>>>()?;

            let block = build_meta_features(&self.config, &fold_models, classes, &x_test)?;
            let out = meta_features.get_or_insert_with(|| Array2::zeros((x.nrows(), block.ncols())));
            for (local_idx, &global_idx) in split.test_indices.iter().enumerate() {
                out.row_mut(global_idx).assign(&block.row(local_idx));
            }
        }

        meta_features.ok_or_else(|| EnsembleError::ValidationError("No folds were generated".to_string()))
    }
}

/// Probabilities of `model` with columns reordered onto `classes`.
///
/// Classes the model never saw keep probability zero.
fn aligned_proba(model: &dyn Classifier, classes: &[f64], x: &Array2<f64>) -> Result<Array2<f64>> {
    let proba = model.predict_proba(x)?;
    let model_classes = model
        .classes()
        .ok_or_else(|| EnsembleError::not_fitted(model.name()))?;

    if model_classes == classes {
        return Ok(proba);
    }

    let mut aligned = Array2::zeros((x.nrows(), classes.len()));
    for (j, class) in model_classes.iter().enumerate() {
        if let Some(k) = classes.iter().position(|c| c == class) {
            aligned.column_mut(k).assign(&proba.column(j));
        }
    }
    Ok(aligned)
}

fn build_meta_features(
    config: &StackingConfig,
    classifiers: &[Box<dyn Classifier>],
    classes: &[f64],
    x: &Array2<f64>,
) -> Result<Array2<f64>> {
    let mut blocks: Vec<Array2<f64>> = if config.use_probas {
        let probas = classifiers
            .iter()
            .map(|c| aligned_proba(c.as_ref(), classes, x))
            .collect::<Result<Vec<_>>>()?;

        if config.average_probas {
            let mut mean = Array2::<f64>::zeros((x.nrows(), classes.len()));
            for p in &probas {
                mean += p;
            }
            mean /= probas.len() as f64;
            vec![mean]
        } else {
            probas
        }
    } else {
        classifiers
            .iter()
            .map(|c| -> Result<Array2<f64>> { Ok(c.predict(x)?.insert_axis(Axis(1))) })
            .collect::<Result<Vec<_>>>()?
    };

    if config.passthrough {
        blocks.push(x.clone());
    }

    let views: Vec<_> = blocks.iter().map(|b| b.view()).collect();
    Ok(concatenate(Axis(1), &views)?)
}

impl Classifier for StackingClassifier {
    fn name(&self) -> &'static str {
        "StackingClassifier"
    }

    /// Fit the stacking ensemble
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        if self.classifiers.is_empty() {
            return Err(EnsembleError::ValidationError(
                "No base classifiers provided".to_string(),
            ));
        }
        check_fit_input(x, y)?;

        let classes = unique_classes(y);
        let classifiers = self.fit_base_classifiers(x, y)?;

        let meta_features = match self.config.cv_folds {
            Some(n_folds) => self.out_of_fold_meta_features(x, y, &classes, n_folds)?,
            None => build_meta_features(&self.config, &classifiers, &classes, x)?,
        };

        let mut meta_classifier = self.meta_classifier.clone_box();
        if self.config.verbose > 0 {
            info!(
                meta_classifier = %meta_name(meta_classifier.as_ref()),
                n_meta_features = meta_features.ncols(),
                "Fitting meta-classifier"
            );
        }
        meta_classifier.fit(&meta_features, y)?;

        let train_meta_features = if self.config.store_train_meta_features {
            Some(meta_features)
        } else {
            None
        };

        self.fitted = Some(FittedStack {
            classifiers,
            meta_classifier,
            classes,
            n_features: x.ncols(),
            train_meta_features,
        });

        Ok(())
    }

    /// Make predictions
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let meta_features = self.predict_meta_features(x)?;
        self.fitted()?.meta_classifier.predict(&meta_features)
    }

    /// Meta-classifier probabilities over the classes seen in fit
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let meta_features = self.predict_meta_features(x)?;
        let fitted = self.fitted()?;
        aligned_proba(fitted.meta_classifier.as_ref(), &fitted.classes, &meta_features)
    }

    fn classes(&self) -> Option<&[f64]> {
        self.fitted.as_ref().map(|f| f.classes.as_slice())
    }

    fn get_params(&self) -> Params {
        let config = &self.config;
        let mut params = Params::new();
        params.insert("average_probas".to_string(), config.average_probas.into());
        params.insert("cv_folds".to_string(), config.cv_folds.into());
        params.insert("passthrough".to_string(), config.passthrough.into());
        params.insert("random_state".to_string(), config.random_state.into());
        params.insert("shuffle".to_string(), config.shuffle.into());
        params.insert(
            "store_train_meta_features".to_string(),
            config.store_train_meta_features.into(),
        );
        params.insert("use_probas".to_string(), config.use_probas.into());
        params.insert("verbose".to_string(), config.verbose.into());

        for (name, classifier) in self.named_classifiers() {
            for (key, value) in classifier.get_params() {
                params.insert(format!("{}{}{}", name, PARAM_SEPARATOR, key), value);
            }
        }

        let meta = meta_name(self.meta_classifier.as_ref());
        for (key, value) in self.meta_classifier.get_params() {
            params.insert(format!("{}{}{}", meta, PARAM_SEPARATOR, key), value);
        }

        params
    }

    /// Set an own parameter or route `<estimator>__<param>` to a nested estimator
    fn set_param(&mut self, key: &str, value: &ParamValue) -> Result<()> {
        match key {
            "average_probas" => self.config.average_probas = value.as_bool(key)?,
            "cv_folds" => self.config.cv_folds = value.as_opt_usize(key)?,
            "passthrough" => self.config.passthrough = value.as_bool(key)?,
            "random_state" => self.config.random_state = value.as_opt_u64(key)?,
            "shuffle" => self.config.shuffle = value.as_bool(key)?,
            "store_train_meta_features" => self.config.store_train_meta_features = value.as_bool(key)?,
            "use_probas" => self.config.use_probas = value.as_bool(key)?,
            "verbose" => {
                let level = value.as_usize(key)?;
                self.config.verbose = u8::try_from(level).map_err(|_| EnsembleError::InvalidParameter {
                    name: key.to_string(),
                    value: value.to_string(),
                    reason: "must fit in 0..=255".to_string(),
                })?;
            }
            _ => {
                let (owner, param) = split_param_key(key).ok_or_else(|| unknown_param(self.name(), key))?;

                if owner == meta_name(self.meta_classifier.as_ref()) {
                    return self.meta_classifier.set_param(param, value);
                }

                let idx = name_estimators(&self.classifiers)
                    .iter()
                    .position(|name| name == owner)
                    .ok_or_else(|| unknown_param(self.name(), key))?;
                self.classifiers[idx].set_param(param, value)?;
            }
        }
        Ok(())
    }

    fn clone_box(&self) -> Box<dyn Classifier> {
        Box::new(self.clone())
    }
}
