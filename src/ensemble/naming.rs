//! Parameter-name generation for composite estimators

use crate::training::Classifier;
use std::collections::HashMap;

/// Prefix marking the meta-estimator's parameters
pub const META_PREFIX: &str = "meta-";

/// Separator between an estimator key and one of its parameters
pub const PARAM_SEPARATOR: &str = "__";

/// Generate keys from lowercase type names.
///
/// Names that occur more than once get a `-1`, `-2`, ... suffix in list
/// order; unique names are left bare. `[RF, RF, NB]` becomes
/// `["randomforestclassifier-1", "randomforestclassifier-2", "gaussiannb"]`.
pub fn name_estimators(estimators: &[Box<dyn Classifier>]) -> Vec<String> {
    let names: Vec<String> = estimators.iter().map(|e| e.name().to_lowercase()).collect();

    let mut totals: HashMap<&str, usize> = HashMap::new();
    for name in &names {
        *totals.entry(name.as_str()).or_insert(0) += 1;
    }

    let mut seen: HashMap<&str, usize> = HashMap::new();
    names
        .iter()
        .map(|name| {
            if totals[name.as_str()] == 1 {
                return name.clone();
            }
            let k = seen.entry(name.as_str()).or_insert(0);
            *k += 1;
            format!("{}-{}", name, k)
        })
        .collect()
}

/// Key for the meta-estimator, e.g. `meta-logisticregression`
pub fn meta_name(meta: &dyn Classifier) -> String {
    format!("{}{}", META_PREFIX, meta.name().to_lowercase())
}

/// Split `owner__param` at the first separator
pub fn split_param_key(key: &str) -> Option<(&str, &str)> {
    key.split_once(PARAM_SEPARATOR)
}
