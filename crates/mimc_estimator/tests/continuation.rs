//! Continuation over decreasing tolerances and sample-count monotonicity.

use mimc_core::index_set::IndexSet;
use mimc_core::math::Uncertainty;
use mimc_core::types::Index;
use mimc_estimator::{Estimator, SampleMethod, SampleOutput, SamplingError};
use proptest::prelude::*;
use std::collections::BTreeMap;

fn levels(index: &Index, inputs: &[f64]) -> Result<SampleOutput, SamplingError> {
    let l = index[0] as i32;
    let z = inputs[0];
    let diff = if l == 0 {
        1.0 + z
    } else {
        4f64.powi(-l) + 2f64.powi(-l) * z
    };
    Ok(SampleOutput::scalar(diff, diff))
}

fn continuation_estimator(
    seed: usize,
    nb_of_tols: usize,
) -> Estimator<fn(&Index, &[f64]) -> Result<SampleOutput, SamplingError>> {
    Estimator::builder(
        IndexSet::ml(),
        SampleMethod::mc(),
        levels as fn(&Index, &[f64]) -> Result<SampleOutput, SamplingError>,
    )
    .distributions(vec![Uncertainty::standard_normal()])
    .cost_model(|index: &Index| 2f64.powi(index[0] as i32))
    .option("seed", seed)
    .option("continuate", true)
    .option("nb_of_tols", nb_of_tols)
    .option("continuation_mul_factor", 2.0)
    .build()
    .unwrap()
}

#[test]
fn test_one_record_per_tolerance() {
    let mut estimator = continuation_estimator(3, 4);
    let outcome = estimator.run(1e-2).unwrap();
    assert!(outcome.is_converged());
    assert_eq!(outcome.tol(), 1e-2);

    let tols: Vec<f64> = estimator.history().iter().map(|r| r.tol).collect();
    assert_eq!(tols, vec![8e-2, 4e-2, 2e-2, 1e-2]);
    assert!(estimator.history().iter().all(|r| r.converged));
    assert!(estimator.history().iter().all(|r| r.rmse <= r.tol));

    // work only grows
    let work: Vec<f64> = estimator.history().iter().map(|r| r.total_work).collect();
    assert!(work.windows(2).all(|w| w[0] <= w[1]), "{:?}", work);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    #[test]
    fn prop_sample_counts_never_decrease(seed in 0usize..1000) {
        let mut estimator = continuation_estimator(seed, 3);
        estimator.run(2e-2).unwrap();

        let mut seen: BTreeMap<Index, usize> = BTreeMap::new();
        for record in estimator.history() {
            for entry in &record.indices {
                let previous = seen.insert(entry.index.clone(), entry.nb_of_samples).unwrap_or(0);
                prop_assert!(entry.nb_of_samples >= previous);
            }
            // an index once sampled stays in the set
            prop_assert!(seen.keys().all(|index| record.current_index_set.contains(index)));
        }
    }
}
