//! Model training module
//!
//! Provides the classifier contract and the estimators ensembles are built
//! from:
//! - Multinomial logistic regression
//! - Gaussian Naive Bayes
//! - Decision trees and Random Forests
//! - Cross-validation splitting and scoring

mod models;
pub mod params;
pub mod cross_validation;
pub mod linear_models;
pub mod decision_tree;
pub mod random_forest;
pub mod naive_bayes;

pub use models::{accuracy_score, unique_classes, Classifier, ModelMetrics};
pub use params::{ParamValue, Params};
pub use cross_validation::{cross_val_score, cross_val_score_with, CrossValidator, CVStrategy, CVSplit, CVResults};
pub use linear_models::LogisticRegression;
pub use decision_tree::{DecisionTreeClassifier, TreeNode, Criterion};
pub use random_forest::{RandomForestClassifier, MaxFeatures};
pub use naive_bayes::GaussianNB;

pub(crate) use models::{check_fit_input, check_n_features, unknown_param};
