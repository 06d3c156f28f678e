//! Hyperparameter values shared by all estimators

use crate::error::{EnsembleError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Named hyperparameters, sorted by key
pub type Params = BTreeMap<String, ParamValue>;

/// A single hyperparameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    None,
}

impl ParamValue {
    fn invalid(&self, name: &str, reason: &str) -> EnsembleError {
        EnsembleError::InvalidParameter {
            name: name.to_string(),
            value: self.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Read as a float; integers are widened
    pub fn as_f64(&self, name: &str) -> Result<f64> {
        match self {
            ParamValue::Float(v) => Ok(*v),
            ParamValue::Int(v) => Ok(*v as f64),
            _ => Err(self.invalid(name, "expected a number")),
        }
    }

    /// Read as a non-negative integer
    pub fn as_usize(&self, name: &str) -> Result<usize> {
        match self {
            ParamValue::Int(v) if *v >= 0 => Ok(*v as usize),
            ParamValue::Float(v) if *v >= 0.0 && v.fract() == 0.0 => Ok(*v as usize),
            _ => Err(self.invalid(name, "expected a non-negative integer")),
        }
    }

    pub fn as_bool(&self, name: &str) -> Result<bool> {
        match self {
            ParamValue::Bool(v) => Ok(*v),
            _ => Err(self.invalid(name, "expected a boolean")),
        }
    }

    pub fn as_str(&self, name: &str) -> Result<&str> {
        match self {
            ParamValue::Text(v) => Ok(v.as_str()),
            _ => Err(self.invalid(name, "expected a string")),
        }
    }

    /// Read as an optional non-negative integer (`None` maps to `None`)
    pub fn as_opt_usize(&self, name: &str) -> Result<Option<usize>> {
        match self {
            ParamValue::None => Ok(None),
            other => other.as_usize(name).map(Some),
        }
    }

    /// Read as an optional seed. Seeds above `i64::MAX` are carried as text.
    pub fn as_opt_u64(&self, name: &str) -> Result<Option<u64>> {
        match self {
            ParamValue::None => Ok(None),
            ParamValue::Int(v) => u64::try_from(*v)
                .map(Some)
                .map_err(|_| self.invalid(name, "expected a non-negative integer")),
            ParamValue::Text(v) => v
                .parse::<u64>()
                .map(Some)
                .map_err(|_| self.invalid(name, "expected a non-negative integer")),
            other => Ok(Some(other.as_usize(name)? as u64)),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(v) => write!(f, "{}", v),
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Text(v) => write!(f, "{}", v),
            ParamValue::None => write!(f, "None"),
        }
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<usize> for ParamValue {
    fn from(v: usize) -> Self {
        ParamValue::Int(v as i64)
    }
}

impl From<u64> for ParamValue {
    fn from(v: u64) -> Self {
        i64::try_from(v).map_or_else(|_| ParamValue::Text(v.to_string()), ParamValue::Int)
    }
}

impl From<u8> for ParamValue {
    fn from(v: u8) -> Self {
        ParamValue::Int(v as i64)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

impl<T: Into<ParamValue>> From<Option<T>> for ParamValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(ParamValue::None, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversions() {
        assert_eq!(ParamValue::Int(3).as_f64("x").unwrap(), 3.0);
        assert_eq!(ParamValue::Float(20.0).as_usize("x").unwrap(), 20);
        assert!(ParamValue::Float(2.5).as_usize("x").is_err());
        assert!(ParamValue::Int(-1).as_usize("x").is_err());
        assert_eq!(ParamValue::None.as_opt_usize("x").unwrap(), None);
        assert!(ParamValue::Text("a".into()).as_bool("flag").is_err());
    }

    #[test]
    fn test_untagged_json() {
        let values: Vec<ParamValue> = serde_json::from_str("[1.5, 20, true, \"gini\", null]").unwrap();
        assert_eq!(
            values,
            vec![
                ParamValue::Float(1.5),
                ParamValue::Int(20),
                ParamValue::Bool(true),
                ParamValue::Text("gini".into()),
                ParamValue::None,
            ]
        );
    }

    #[test]
    fn test_seed_roundtrip() {
        for seed in [0u64, 42, i64::MAX as u64, i64::MAX as u64 + 1, u64::MAX] {
            let value: ParamValue = Some(seed).into();
            assert_eq!(value.as_opt_u64("random_state").unwrap(), Some(seed));
        }
        assert_eq!(ParamValue::from(7u64), ParamValue::Int(7));
        assert!(ParamValue::Int(-1).as_opt_u64("random_state").is_err());
        assert!(ParamValue::Text("abc".into()).as_opt_u64("random_state").is_err());
    }

    #[test]
    fn test_option_into() {
        let v: ParamValue = Some(5usize).into();
        assert_eq!(v, ParamValue::Int(5));
        let none: ParamValue = Option::<usize>::None.into();
        assert_eq!(none, ParamValue::None);
    }
}
