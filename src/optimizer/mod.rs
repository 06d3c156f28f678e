//! Hyperparameter search
//!
//! Exhaustive grid search over `Params` keys, scored with stratified
//! cross-validation. Works with any `Classifier`, including nested keys such
//! as `meta-logisticregression__C` on a stacking ensemble.

mod config;
pub mod grid_search;

pub use config::GridSearchConfig;
pub use grid_search::{expand_grid, CvResult, GridSearchCV, ParamGrid};
