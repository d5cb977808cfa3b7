//! Estimator configuration.
//!
//! Options arrive as an [`OptionMap`]. Core keys are consumed by
//! [`EstimatorOptions`]; the remaining keys must be recognised by the chosen
//! index-set strategy or sample method, otherwise construction fails with
//! [`ConfigError::UnknownOption`] before any sample is drawn.

use crate::sample_method::SampleMethod;
use mimc_core::config::{ConfigError, OptionMap, OptionValue};
use mimc_core::index_set::IndexSet;
use std::collections::BTreeMap;

/// Option keys consumed by the core control loop.
pub const CORE_KEYS: &[&str] = &[
    "nb_of_warm_up_samples",
    "nb_of_qoi",
    "max_index_set_param",
    "min_index_set_param",
    "nb_of_tols",
    "continuation_mul_factor",
    "sample_mul_factor",
    "min_splitting",
    "max_splitting",
    "continuate",
    "save_samples",
    "conservative_bias_estimate",
    "do_mse_splitting",
    "do_regression",
    "verbose",
    "save",
    "folder",
    "name",
    "seed",
    "default_alpha",
    "default_beta",
    "default_gamma",
];

/// Core options of an estimator.
///
/// # Examples
///
/// ```
/// use mimc_estimator::config::EstimatorOptions;
///
/// let options = EstimatorOptions::default();
/// assert_eq!(options.nb_of_warm_up_samples, 20);
/// assert_eq!(options.max_splitting, 0.99);
/// assert!(options.seed.is_none());
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct EstimatorOptions {
    /// Samples drawn at every new index before it is used.
    pub nb_of_warm_up_samples: usize,
    /// Number of quantities of interest returned by the sampler.
    pub nb_of_qoi: usize,
    /// Largest index-set size parameter before the run gives up.
    pub max_index_set_param: usize,
    /// Smallest size parameter at which a bounded, biased index set may
    /// converge.
    pub min_index_set_param: usize,
    /// Number of tolerances under continuation.
    pub nb_of_tols: usize,
    /// Ratio between successive continuation tolerances.
    pub continuation_mul_factor: f64,
    /// Geometric growth factor of quasi-Monte Carlo point counts.
    pub sample_mul_factor: f64,
    /// Lower bound of the splitting parameter.
    pub min_splitting: f64,
    /// Upper bound of the splitting parameter.
    pub max_splitting: f64,
    /// Run a decreasing sequence of tolerances ending at the requested one.
    pub continuate: bool,
    /// Retain raw samples in the accumulators.
    pub save_samples: bool,
    /// Use the conservative bias estimate.
    pub conservative_bias_estimate: bool,
    /// Choose the splitting parameter from the bias estimate.
    pub do_mse_splitting: bool,
    /// Size warm-up batches of new indices from the fitted rates.
    pub do_regression: bool,
    /// Promote per-iteration log events from debug to info.
    pub verbose: bool,
    /// Persist the history after every tolerance.
    pub save: bool,
    /// Output folder for persisted history.
    pub folder: String,
    /// Run name; the history file is `<folder>/<name>.json`.
    pub name: String,
    /// Seed of the random number generator; drawn from entropy when absent.
    pub seed: Option<u64>,
    /// Mean decay rate used when it cannot be fitted.
    pub default_alpha: f64,
    /// Variance decay rate used when it cannot be fitted.
    pub default_beta: f64,
    /// Cost growth rate used when it cannot be fitted.
    pub default_gamma: f64,
}

impl Default for EstimatorOptions {
    fn default() -> Self {
        Self {
            nb_of_warm_up_samples: 20,
            nb_of_qoi: 1,
            max_index_set_param: 10,
            min_index_set_param: 2,
            nb_of_tols: 10,
            continuation_mul_factor: 1.2,
            sample_mul_factor: 2.0,
            min_splitting: 0.5,
            max_splitting: 0.99,
            continuate: false,
            save_samples: false,
            conservative_bias_estimate: false,
            do_mse_splitting: true,
            do_regression: true,
            verbose: false,
            save: false,
            folder: ".".to_string(),
            name: "estimator".to_string(),
            seed: None,
            default_alpha: 1.0,
            default_beta: 1.0,
            default_gamma: 1.0,
        }
    }
}

impl EstimatorOptions {
    /// Applies one core option.
    ///
    /// # Returns
    ///
    /// `Ok(false)` if `key` is not a core key.
    pub fn apply(&mut self, key: &str, value: &OptionValue) -> Result<bool, ConfigError> {
        match key {
            "nb_of_warm_up_samples" => self.nb_of_warm_up_samples = value.as_usize(key)?,
            "nb_of_qoi" => self.nb_of_qoi = value.as_usize(key)?,
            "max_index_set_param" => self.max_index_set_param = value.as_usize(key)?,
            "min_index_set_param" => self.min_index_set_param = value.as_usize(key)?,
            "nb_of_tols" => self.nb_of_tols = value.as_usize(key)?,
            "continuation_mul_factor" => self.continuation_mul_factor = value.as_f64(key)?,
            "sample_mul_factor" => self.sample_mul_factor = value.as_f64(key)?,
            "min_splitting" => self.min_splitting = value.as_f64(key)?,
            "max_splitting" => self.max_splitting = value.as_f64(key)?,
            "continuate" => self.continuate = value.as_bool(key)?,
            "save_samples" => self.save_samples = value.as_bool(key)?,
            "conservative_bias_estimate" => self.conservative_bias_estimate = value.as_bool(key)?,
            "do_mse_splitting" => self.do_mse_splitting = value.as_bool(key)?,
            "do_regression" => self.do_regression = value.as_bool(key)?,
            "verbose" => self.verbose = value.as_bool(key)?,
            "save" => self.save = value.as_bool(key)?,
            "folder" => self.folder = value.as_str(key)?.to_string(),
            "name" => self.name = value.as_str(key)?.to_string(),
            "seed" => self.seed = Some(value.as_usize(key)? as u64),
            "default_alpha" => self.default_alpha = value.as_f64(key)?,
            "default_beta" => self.default_beta = value.as_f64(key)?,
            "default_gamma" => self.default_gamma = value.as_f64(key)?,
            _ => return Ok(false),
        }
        Ok(true)
    }

    /// Splits `map` between the core options, the index-set strategy and
    /// the sample method.
    ///
    /// # Errors
    ///
    /// `ConfigError::UnknownOption` for a key outside the allow-list
    /// (core keys, index-set keys and sample-method keys), or the value
    /// errors of the component owning the key.
    pub fn from_map(
        index_set: &mut IndexSet,
        method: &mut SampleMethod,
        map: &OptionMap,
    ) -> Result<Self, ConfigError> {
        let mut options = Self::default();
        for (key, value) in map {
            if options.apply(key, value)? {
                continue;
            }
            if index_set.recognised_keys().contains(&key.as_str()) {
                index_set.apply_option(key, value)?;
                continue;
            }
            if method.recognised_keys().contains(&key.as_str()) {
                method.apply_option(key, value)?;
                continue;
            }
            let allowed: Vec<&str> = CORE_KEYS
                .iter()
                .chain(index_set.recognised_keys())
                .chain(method.recognised_keys())
                .copied()
                .collect();
            return Err(ConfigError::unknown_option(key, &allowed));
        }
        Ok(options)
    }

    /// Checks ranges and cross-option conflicts.
    pub fn validate(
        &self,
        index_set: &IndexSet,
        method: &SampleMethod,
        nb_of_inputs: usize,
    ) -> Result<(), ConfigError> {
        let min_warm_up = if method.is_qmc() { 1 } else { 2 };
        if self.nb_of_warm_up_samples < min_warm_up {
            return Err(ConfigError::invalid_value(
                "nb_of_warm_up_samples",
                format!("must be at least {} for {}", min_warm_up, method.label()),
            ));
        }
        if self.nb_of_qoi == 0 {
            return Err(ConfigError::invalid_value("nb_of_qoi", "must be at least 1"));
        }
        if self.nb_of_tols == 0 {
            return Err(ConfigError::invalid_value("nb_of_tols", "must be at least 1"));
        }
        if !(self.continuation_mul_factor.is_finite() && self.continuation_mul_factor >= 1.0) {
            return Err(ConfigError::invalid_value(
                "continuation_mul_factor",
                "must be finite and at least 1",
            ));
        }
        if !(self.sample_mul_factor.is_finite() && self.sample_mul_factor > 1.0) {
            return Err(ConfigError::invalid_value(
                "sample_mul_factor",
                "must be finite and greater than 1",
            ));
        }
        for (key, theta) in [
            ("min_splitting", self.min_splitting),
            ("max_splitting", self.max_splitting),
        ] {
            if !(theta > 0.0 && theta <= 1.0) {
                return Err(ConfigError::invalid_value(key, "must lie in (0, 1]"));
            }
        }
        for (key, rate) in [
            ("default_alpha", self.default_alpha),
            ("default_beta", self.default_beta),
            ("default_gamma", self.default_gamma),
        ] {
            if !rate.is_finite() {
                return Err(ConfigError::invalid_value(key, "must be finite"));
            }
        }

        if self.min_splitting > self.max_splitting {
            return Err(ConfigError::Conflict(format!(
                "min_splitting ({}) exceeds max_splitting ({})",
                self.min_splitting, self.max_splitting
            )));
        }
        if self.min_index_set_param > self.max_index_set_param {
            return Err(ConfigError::Conflict(format!(
                "min_index_set_param ({}) exceeds max_index_set_param ({})",
                self.min_index_set_param, self.max_index_set_param
            )));
        }
        if index_set.is_unbiased() && method.is_qmc() {
            return Err(ConfigError::Conflict(
                "the unbiased index set requires Monte Carlo sampling".to_string(),
            ));
        }
        if method.is_qmc() && nb_of_inputs == 0 {
            return Err(ConfigError::Conflict(
                "quasi-Monte Carlo needs input distributions to map points through".to_string(),
            ));
        }
        if self.save && self.name.trim().is_empty() {
            return Err(ConfigError::Conflict(
                "save is enabled but name is empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Parses an option file in TOML format.
///
/// # Examples
///
/// ```
/// use mimc_estimator::config::parse_options_toml;
/// use mimc_core::config::OptionValue;
///
/// let map = parse_options_toml(r#"
///     nb_of_warm_up_samples = 40
///     min_splitting = 0.2
///     continuate = true
///     max_search_space = "HC"
/// "#).unwrap();
/// assert_eq!(map["nb_of_warm_up_samples"], OptionValue::Int(40));
/// assert_eq!(map["max_search_space"], OptionValue::from("HC"));
/// ```
pub fn parse_options_toml(text: &str) -> Result<OptionMap, ConfigError> {
    let map: BTreeMap<String, OptionValue> =
        toml::from_str(text).map_err(|e| ConfigError::invalid_value("options", e.to_string()))?;
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: &[(&str, OptionValue)]) -> OptionMap {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_core_options_applied() {
        let mut index_set = IndexSet::ml();
        let mut method = SampleMethod::mc();
        let options = EstimatorOptions::from_map(
            &mut index_set,
            &mut method,
            &map(&[
                ("nb_of_warm_up_samples", OptionValue::from(50_usize)),
                ("verbose", OptionValue::from(true)),
                ("seed", OptionValue::from(7_usize)),
                ("name", OptionValue::from("run")),
            ]),
        )
        .unwrap();
        assert_eq!(options.nb_of_warm_up_samples, 50);
        assert!(options.verbose);
        assert_eq!(options.seed, Some(7));
        assert_eq!(options.name, "run");
    }

    #[test]
    fn test_strategy_keys_routed() {
        let mut index_set = IndexSet::ad(2);
        let mut method = SampleMethod::qmc();
        EstimatorOptions::from_map(
            &mut index_set,
            &mut method,
            &map(&[
                ("penalization", OptionValue::from(1.0)),
                ("nb_of_shifts", OptionValue::from(5_usize)),
            ]),
        )
        .unwrap();
        assert_eq!(method.nb_of_shifts(), 5);
        match index_set {
            IndexSet::Adaptive(spec) => assert_eq!(spec.penalization, 1.0),
            other => panic!("unexpected strategy {:?}", other),
        }
    }

    #[test]
    fn test_unknown_key_lists_allowed_keys() {
        let mut index_set = IndexSet::ml();
        let mut method = SampleMethod::mc();
        let err = EstimatorOptions::from_map(
            &mut index_set,
            &mut method,
            &map(&[("penalization", OptionValue::from(0.5))]),
        )
        .unwrap_err();
        match err {
            ConfigError::UnknownOption { key, allowed } => {
                assert_eq!(key, "penalization");
                assert!(allowed.contains("nb_of_warm_up_samples"));
                assert!(!allowed.contains("nb_of_shifts"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_wrong_type_rejected() {
        let mut index_set = IndexSet::ml();
        let mut method = SampleMethod::mc();
        let err = EstimatorOptions::from_map(
            &mut index_set,
            &mut method,
            &map(&[("continuate", OptionValue::from(1_usize))]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::TypeMismatch { .. }));
    }

    #[test]
    fn test_conflicts() {
        let ml = IndexSet::ml();
        let mc = SampleMethod::mc();

        let options = EstimatorOptions {
            min_splitting: 0.9,
            max_splitting: 0.6,
            ..EstimatorOptions::default()
        };
        assert!(matches!(
            options.validate(&ml, &mc, 1),
            Err(ConfigError::Conflict(_))
        ));

        let options = EstimatorOptions {
            min_index_set_param: 12,
            ..EstimatorOptions::default()
        };
        assert!(matches!(
            options.validate(&ml, &mc, 1),
            Err(ConfigError::Conflict(_))
        ));

        let defaults = EstimatorOptions::default();
        let unbiased = IndexSet::unbiased(IndexSet::ml()).unwrap();
        assert!(matches!(
            defaults.validate(&unbiased, &SampleMethod::qmc(), 1),
            Err(ConfigError::Conflict(_))
        ));
        assert!(matches!(
            defaults.validate(&ml, &SampleMethod::qmc(), 0),
            Err(ConfigError::Conflict(_))
        ));

        let options = EstimatorOptions {
            save: true,
            name: " ".to_string(),
            ..EstimatorOptions::default()
        };
        assert!(matches!(
            options.validate(&ml, &mc, 1),
            Err(ConfigError::Conflict(_))
        ));
        assert!(defaults.validate(&ml, &mc, 0).is_ok());
    }

    #[test]
    fn test_range_checks() {
        let ml = IndexSet::ml();
        let mc = SampleMethod::mc();
        let options = EstimatorOptions {
            nb_of_warm_up_samples: 1,
            ..EstimatorOptions::default()
        };
        assert!(matches!(
            options.validate(&ml, &mc, 1),
            Err(ConfigError::InvalidValue { .. })
        ));
        let options = EstimatorOptions {
            sample_mul_factor: 1.0,
            ..EstimatorOptions::default()
        };
        assert!(options.validate(&ml, &mc, 1).is_err());
    }

    #[test]
    fn test_parse_toml() {
        let map = parse_options_toml("verbose = true\nmax_splitting = 0.9\n").unwrap();
        assert_eq!(map["verbose"], OptionValue::Bool(true));
        assert_eq!(map["max_splitting"], OptionValue::Float(0.9));
        assert!(parse_options_toml("verbose = ").is_err());
    }
}
