//! Construction-time configuration checks.
//!
//! Every rejected configuration must fail in `build()`, before the sampling
//! function is ever called.

use mimc_core::config::{ConfigError, OptionValue};
use mimc_core::index_set::IndexSet;
use mimc_core::math::Uncertainty;
use mimc_core::types::Index;
use mimc_estimator::config::parse_options_toml;
use mimc_estimator::{Estimator, SampleMethod, SampleOutput, SamplingError};
use std::sync::atomic::{AtomicUsize, Ordering};

fn counting_sampler(
    calls: &AtomicUsize,
) -> impl Fn(&Index, &[f64]) -> Result<SampleOutput, SamplingError> + Sync + '_ {
    move |_: &Index, _: &[f64]| {
        calls.fetch_add(1, Ordering::Relaxed);
        Ok(SampleOutput::scalar(1.0, 1.0))
    }
}

#[test]
fn test_unknown_key_fails_before_sampling() {
    let calls = AtomicUsize::new(0);
    let result = Estimator::builder(IndexSet::ml(), SampleMethod::mc(), counting_sampler(&calls))
        .option("nb_of_warm_up_samples", 10_usize)
        .option("no_such_option", true)
        .build();

    match result {
        Err(ConfigError::UnknownOption { key, allowed }) => {
            assert_eq!(key, "no_such_option");
            assert!(allowed.contains("nb_of_warm_up_samples"));
        }
        Err(other) => panic!("unexpected error {:?}", other),
        Ok(_) => panic!("unknown key accepted"),
    }
    assert_eq!(calls.load(Ordering::Relaxed), 0);
}

#[test]
fn test_strategy_keys_require_the_strategy() {
    // adaptive keys are only recognised by the adaptive strategy
    let result = Estimator::builder(IndexSet::ml(), SampleMethod::mc(), |_: &Index, _: &[f64]| {
        Ok::<_, SamplingError>(SampleOutput::scalar(1.0, 1.0))
    })
    .option("penalization", 1.0)
    .build();
    assert!(matches!(result, Err(ConfigError::UnknownOption { .. })));

    // shifts are only recognised by quasi-Monte Carlo
    let result = Estimator::builder(IndexSet::sl(), SampleMethod::mc(), |_: &Index, _: &[f64]| {
        Ok::<_, SamplingError>(SampleOutput::scalar(1.0, 1.0))
    })
    .option("nb_of_shifts", 4_usize)
    .build();
    assert!(matches!(result, Err(ConfigError::UnknownOption { .. })));
}

#[test]
fn test_conflicting_options_are_rejected() {
    let sampler = |_: &Index, _: &[f64]| Ok::<_, SamplingError>(SampleOutput::scalar(1.0, 1.0));

    let result = Estimator::builder(IndexSet::ml(), SampleMethod::mc(), sampler)
        .option("min_splitting", 0.9)
        .option("max_splitting", 0.6)
        .build();
    assert!(matches!(result, Err(ConfigError::Conflict(_))));

    let u = IndexSet::unbiased(IndexSet::ml()).unwrap();
    let result = Estimator::builder(u, SampleMethod::qmc(), sampler)
        .distributions(vec![Uncertainty::standard_normal()])
        .build();
    assert!(matches!(result, Err(ConfigError::Conflict(_))));

    let result = Estimator::builder(IndexSet::sl(), SampleMethod::qmc(), sampler).build();
    assert!(matches!(result, Err(ConfigError::Conflict(_))));
}

#[test]
fn test_invalid_values_are_rejected() {
    let sampler = |_: &Index, _: &[f64]| Ok::<_, SamplingError>(SampleOutput::scalar(1.0, 1.0));

    let result = Estimator::builder(IndexSet::ml(), SampleMethod::mc(), sampler)
        .option("sample_mul_factor", 1.0)
        .build();
    assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));

    let result = Estimator::builder(IndexSet::ml(), SampleMethod::mc(), sampler)
        .option("continuate", 3_usize)
        .build();
    assert!(matches!(result, Err(ConfigError::TypeMismatch { .. })));

    let result = Estimator::builder(IndexSet::sl(), SampleMethod::mc(), sampler)
        .distributions(vec![Uncertainty::Normal {
            mean: 0.0,
            std_dev: -1.0,
        }])
        .build();
    assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
}

#[test]
fn test_options_from_toml_file() {
    let options = parse_options_toml(
        r#"
        nb_of_warm_up_samples = 12
        min_splitting = 0.3
        continuate = true
        nb_of_tols = 3
        max_search_space = "FT"
        penalization = 1.0
        tie_break = "lexicographic"
        "#,
    )
    .unwrap();
    assert_eq!(options["nb_of_tols"], OptionValue::Int(3));

    let estimator = Estimator::builder(IndexSet::ad(2), SampleMethod::mc(), |_: &Index, _: &[f64]| {
        Ok::<_, SamplingError>(SampleOutput::scalar(1.0, 1.0))
    })
    .options(options)
    .build()
    .unwrap();

    assert_eq!(estimator.options().nb_of_warm_up_samples, 12);
    assert!(estimator.options().continuate);
    assert_eq!(estimator.tolerances(0.1).len(), 3);
    match estimator.index_set() {
        IndexSet::Adaptive(spec) => {
            assert_eq!(*spec.max_search_space, IndexSet::ft(2));
            assert_eq!(spec.penalization, 1.0);
        }
        other => panic!("unexpected index set {:?}", other),
    }
}

#[test]
fn test_malformed_toml_is_a_config_error() {
    assert!(matches!(
        parse_options_toml("nb_of_warm_up_samples = ["),
        Err(ConfigError::InvalidValue { .. })
    ));
}
