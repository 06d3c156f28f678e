//! Stacking Ensemble - meta-learning over heterogeneous classifiers
//!
//! This crate provides a stacking classifier and the pieces it is built from:
//! - A common `Classifier` contract with sklearn-style parameters
//! - Base estimators (logistic regression, naive Bayes, trees, forests)
//! - Stratified cross-validation and scoring
//! - Grid search over nested parameter keys
//!
//! # Modules
//!
//! - [`training`] - Classifier contract, estimators, cross-validation
//! - [`ensemble`] - Stacking classifier and parameter naming
//! - [`optimizer`] - Grid search
//! - [`datasets`] - Bundled toy datasets
//!
//! # Example
//!
//! ```no_run
//! use stacking_ensemble::prelude::*;
//!
//! let iris = load_iris();
//! let mut stack = StackingClassifier::new(
//!     vec![
//!         Box::new(RandomForestClassifier::new(10).with_random_state(1)),
//!         Box::new(GaussianNB::new()),
//!     ],
//!     Box::new(LogisticRegression::new()),
//! )
//! .with_config(StackingConfig::new().with_use_probas(true));
//!
//! stack.fit(&iris.data, &iris.target)?;
//! let proba = stack.predict_proba(&iris.data)?;
//! # Ok::<(), stacking_ensemble::EnsembleError>(())
//! ```

// Core error handling
pub mod error;

// Core ML modules
pub mod training;
pub mod ensemble;
pub mod optimizer;

// Data
pub mod datasets;

pub use error::{EnsembleError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{EnsembleError, Result};

    // Training
    pub use crate::training::{
        accuracy_score, cross_val_score, Classifier, CrossValidator, CVStrategy, DecisionTreeClassifier,
        GaussianNB, LogisticRegression, ParamValue, Params, RandomForestClassifier,
    };

    // Ensemble
    pub use crate::ensemble::{StackingClassifier, StackingConfig};

    // Optimization
    pub use crate::optimizer::{GridSearchCV, GridSearchConfig, ParamGrid};

    // Datasets
    pub use crate::datasets::{load_iris, Dataset};
}
