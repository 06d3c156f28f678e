//! Grid search configuration

use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Configuration for exhaustive grid search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSearchConfig {
    /// Cross-validation folds per candidate (stratified, unshuffled)
    pub cv_folds: usize,

    /// Refit the best candidate on the full data
    pub refit: bool,

    /// Evaluate candidates on the rayon pool
    pub parallel: bool,

    /// Logging volume: 0 silent, 1 summary, 2 per-candidate scores
    pub verbose: u8,
}

impl Default for GridSearchConfig {
    fn default() -> Self {
        Self {
            cv_folds: 5,
            refit: true,
            parallel: true,
            verbose: 0,
        }
    }
}

impl GridSearchConfig {
    /// Create a new configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set number of folds
    pub fn with_cv_folds(mut self, folds: usize) -> Self {
        self.cv_folds = folds;
        self
    }

    /// Builder method to toggle refitting
    pub fn with_refit(mut self, refit: bool) -> Self {
        self.refit = refit;
        self
    }

    /// Builder method to toggle parallel evaluation
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_verbose(mut self, verbose: u8) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GridSearchConfig::default();
        assert_eq!(config.cv_folds, 5);
        assert!(config.refit);
        assert!(config.parallel);
    }

    #[test]
    fn test_builder() {
        let config = GridSearchConfig::new()
            .with_cv_folds(3)
            .with_refit(false)
            .with_parallel(false);

        assert_eq!(config.cv_folds, 3);
        assert!(!config.refit);
        assert!(!config.parallel);
    }

    #[test]
    fn test_partial_json() {
        let config = GridSearchConfig::from_json(r#"{"cv_folds": 2}"#).unwrap();
        assert_eq!(config.cv_folds, 2);
        assert!(config.refit);
        assert!(GridSearchConfig::from_json("{\"cv_folds\": \"two\"}").is_err());
    }
}
