//! Ensemble methods module
//!
//! Provides stacking (meta-learning) over any set of `Classifier`s, plus the
//! parameter-naming scheme composite estimators use to expose the
//! hyperparameters of the estimators they wrap.

mod naming;
mod stacking;

pub use naming::{meta_name, name_estimators, split_param_key, META_PREFIX, PARAM_SEPARATOR};
pub use stacking::{StackingClassifier, StackingConfig};
