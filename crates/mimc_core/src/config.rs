//! Option values and configuration errors.
//!
//! Estimators are configured through a mapping of named options. Each
//! component (core loop, index-set strategy, sample method) declares the keys
//! it recognises; the union of those keys forms the allow-list checked at
//! construction time.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Mapping of option names to values.
pub type OptionMap = BTreeMap<String, OptionValue>;

/// Configuration error raised while constructing an estimator.
///
/// Configuration errors are fatal: they are reported before any sample is
/// drawn and are never recovered.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Option key not recognised by the core loop, the index set or the
    /// sample method.
    #[error("Unknown option '{key}' (allowed: {allowed})")]
    UnknownOption {
        /// Offending key.
        key: String,
        /// Comma-separated list of allowed keys.
        allowed: String,
    },

    /// Option present with an out-of-range or malformed value.
    #[error("Invalid value for option '{key}': {reason}")]
    InvalidValue {
        /// Option key.
        key: String,
        /// Description of the constraint that was violated.
        reason: String,
    },

    /// Option present with the wrong value type.
    #[error("Option '{key}' expects a value of type {expected}")]
    TypeMismatch {
        /// Option key.
        key: String,
        /// Expected type name.
        expected: &'static str,
    },

    /// Two options, or an option and a strategy, cannot be combined.
    #[error("Conflicting configuration: {0}")]
    Conflict(String),

    /// Index-set strategy parameters are invalid.
    #[error("Invalid index set: {0}")]
    InvalidIndexSet(String),
}

impl ConfigError {
    /// Creates an [`ConfigError::InvalidValue`] error.
    pub fn invalid_value(key: &str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    /// Creates an [`ConfigError::UnknownOption`] error listing the allowed keys.
    pub fn unknown_option(key: &str, allowed: &[&str]) -> Self {
        ConfigError::UnknownOption {
            key: key.to_string(),
            allowed: allowed.join(", "),
        }
    }
}

/// A single option value.
///
/// Deserialises untagged so that option files (TOML, JSON) map naturally:
/// booleans, integers, floats and strings.
///
/// # Examples
///
/// ```
/// use mimc_core::config::OptionValue;
///
/// let value = OptionValue::from(20_usize);
/// assert_eq!(value.as_usize("nb_of_warm_up_samples").unwrap(), 20);
/// assert_eq!(value.as_f64("nb_of_warm_up_samples").unwrap(), 20.0);
/// assert!(value.as_bool("nb_of_warm_up_samples").is_err());
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    /// Boolean toggle.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Floating-point value.
    Float(f64),
    /// String value (paths, names, strategy labels).
    Str(String),
}

impl OptionValue {
    /// Interprets the value as a boolean.
    pub fn as_bool(&self, key: &str) -> Result<bool, ConfigError> {
        match self {
            OptionValue::Bool(b) => Ok(*b),
            _ => Err(type_mismatch(key, "bool")),
        }
    }

    /// Interprets the value as a non-negative integer.
    pub fn as_usize(&self, key: &str) -> Result<usize, ConfigError> {
        match self {
            OptionValue::Int(i) if *i >= 0 => Ok(*i as usize),
            OptionValue::Int(_) => Err(ConfigError::invalid_value(key, "must be non-negative")),
            _ => Err(type_mismatch(key, "non-negative integer")),
        }
    }

    /// Interprets the value as a float; integers are widened.
    pub fn as_f64(&self, key: &str) -> Result<f64, ConfigError> {
        match self {
            OptionValue::Float(x) => Ok(*x),
            OptionValue::Int(i) => Ok(*i as f64),
            _ => Err(type_mismatch(key, "number")),
        }
    }

    /// Interprets the value as a string slice.
    pub fn as_str(&self, key: &str) -> Result<&str, ConfigError> {
        match self {
            OptionValue::Str(s) => Ok(s),
            _ => Err(type_mismatch(key, "string")),
        }
    }
}

fn type_mismatch(key: &str, expected: &'static str) -> ConfigError {
    ConfigError::TypeMismatch {
        key: key.to_string(),
        expected,
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Bool(b) => write!(f, "{}", b),
            OptionValue::Int(i) => write!(f, "{}", i),
            OptionValue::Float(x) => write!(f, "{}", x),
            OptionValue::Str(s) => write!(f, "\"{}\"", s),
        }
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        OptionValue::Bool(value)
    }
}

impl From<i64> for OptionValue {
    fn from(value: i64) -> Self {
        OptionValue::Int(value)
    }
}

impl From<i32> for OptionValue {
    fn from(value: i32) -> Self {
        OptionValue::Int(value as i64)
    }
}

impl From<usize> for OptionValue {
    fn from(value: usize) -> Self {
        OptionValue::Int(value as i64)
    }
}

impl From<u64> for OptionValue {
    fn from(value: u64) -> Self {
        OptionValue::Int(value as i64)
    }
}

impl From<f64> for OptionValue {
    fn from(value: f64) -> Self {
        OptionValue::Float(value)
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        OptionValue::Str(value.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        OptionValue::Str(value)
    }
}
