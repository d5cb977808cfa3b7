//! End-to-end estimation runs on synthetic problems with known answers.
//!
//! # Test Coverage
//!
//! - Single-level Monte Carlo on i.i.d. draws
//! - Multilevel Monte Carlo with geometric decay of mean, variance and cost
//! - Slowly decaying differences, where the truncation bias dominates
//! - Total-degree multi-index Monte Carlo and multilevel quasi-Monte Carlo
//! - Adaptive multi-index growth on a problem with a finite support
//! - Quasi-Monte Carlo and the unbiased estimator
//! - Parallel execution matching sequential execution

use approx::assert_abs_diff_eq;
use mimc_core::index_set::IndexSet;
use mimc_core::math::Uncertainty;
use mimc_core::types::Index;
use mimc_estimator::{
    Estimator, RayonExecutor, SampleMethod, SampleOutput, SamplingError, SequentialExecutor,
};

/// `Q_0 = 1 + z`, `ΔQ_ℓ = 2^-2ℓ + 2^-ℓ z` above the root: `α = β = 2`.
fn decaying_levels(index: &Index, inputs: &[f64]) -> Result<SampleOutput, SamplingError> {
    let l = index[0] as i32;
    let z = inputs[0];
    let diff = if l == 0 {
        1.0 + z
    } else {
        4f64.powi(-l) + 2f64.powi(-l) * z
    };
    Ok(SampleOutput::scalar(diff, diff))
}

fn level_cost(index: &Index) -> f64 {
    2f64.powi(index[0] as i32)
}

/// Differences of size `2^-|α|` up to `|α| = 3`, exactly zero beyond.
fn finite_support(index: &Index, inputs: &[f64]) -> Result<SampleOutput, SamplingError> {
    let s = index.sum();
    let noise = 1.0 + 0.1 * inputs[0];
    let diff = if s <= 3 {
        2f64.powi(-(s as i32)) * noise
    } else {
        0.0
    };
    Ok(SampleOutput::scalar(diff, noise))
}

// ============================================================================
// Scenario 1: single level
// ============================================================================

#[test]
fn e2e_single_level_converges_to_mean() {
    for seed in 0..5_usize {
        let sampler = |_: &Index, inputs: &[f64]| {
            let q = 3.0 + inputs[0];
            Ok::<_, SamplingError>(SampleOutput::scalar(q, q))
        };
        let mut estimator = Estimator::builder(IndexSet::sl(), SampleMethod::mc(), sampler)
            .distributions(vec![Uncertainty::standard_normal()])
            .option("seed", seed)
            .build()
            .unwrap();

        let outcome = estimator.run(0.05).unwrap();
        assert!(outcome.is_converged(), "seed {} did not converge", seed);
        let mean = estimator.mean()[0];
        assert!((mean - 3.0).abs() < 0.2, "seed {}: mean {}", seed, mean);
        assert!(estimator.rmse() <= 0.05);
        // V = 1 and θ ≤ 0.99 need about 1 / (0.99 · 0.05²) samples
        assert!(estimator.nb_of_samples(&Index::zero(1)) >= 300);
    }
}

// ============================================================================
// Scenario 2: multilevel
// ============================================================================

#[test]
fn e2e_multilevel_allocation_decays_geometrically() {
    let mut estimator = Estimator::builder(IndexSet::ml(), SampleMethod::mc(), decaying_levels)
        .distributions(vec![Uncertainty::standard_normal()])
        .cost_model(level_cost)
        .option("seed", 2024_usize)
        .option("max_index_set_param", 10_usize)
        .build()
        .unwrap();

    let outcome = estimator.run(1e-2).unwrap();
    assert!(outcome.is_converged());

    let levels: Vec<Index> = estimator.current_index_set().iter().cloned().collect();
    assert!(levels.len() >= 4, "only {} levels", levels.len());
    let counts: Vec<usize> = levels.iter().map(|l| estimator.nb_of_samples(l)).collect();

    for pair in counts.windows(2) {
        assert!(pair[0] >= pair[1], "counts not decreasing: {:?}", counts);
    }
    let total: usize = counts.iter().sum();
    assert!(2 * counts[0] > total, "level 0 is not the majority: {:?}", counts);

    // sqrt(V_1 / C_1) / sqrt(V_0 / C_0) = sqrt(1/8) ≈ 0.354
    let ratio = counts[1] as f64 / counts[0] as f64;
    assert!((0.2..0.6).contains(&ratio), "N_1 / N_0 = {}", ratio);

    let exact = 1.0 + 1.0 / 3.0;
    assert!((estimator.mean()[0] - exact).abs() < 0.04);
}

#[test]
fn e2e_slow_decay_bias_bounds_true_error() {
    // ΔQ_ℓ = 2^-ℓ/2 (1 + z / 1000): α = 0.5, so the neglected tail is 2.4 times
    // the last level's contribution
    let sampler = |index: &Index, inputs: &[f64]| {
        let diff = 2f64.powf(-(index[0] as f64) / 2.0) * (1.0 + 1e-3 * inputs[0]);
        Ok::<_, SamplingError>(SampleOutput::scalar(diff, diff))
    };
    let tol = 0.05;
    let mut estimator = Estimator::builder(IndexSet::ml(), SampleMethod::mc(), sampler)
        .distributions(vec![Uncertainty::standard_normal()])
        .cost_model(level_cost)
        .option("seed", 1_usize)
        .option("max_index_set_param", 20_usize)
        .build()
        .unwrap();

    let outcome = estimator.run(tol).unwrap();
    assert!(outcome.is_converged());
    assert_abs_diff_eq!(estimator.rates().alpha()[0], 0.5, epsilon = 0.05);

    // Σ_ℓ 2^-ℓ/2
    let exact = 1.0 / (1.0 - 0.5f64.sqrt());
    let error = (estimator.mean()[0] - exact).abs();
    assert!(error <= tol, "error {} above tolerance", error);
    assert!(estimator.bias() >= 0.9 * error, "bias {} vs error {}", estimator.bias(), error);
    // a tail ignoring α would have stopped at ℓ = 9
    let size = estimator.history().last().unwrap().size_param;
    assert!(size >= 11, "stopped at {}", size);
}

// ============================================================================
// Scenario 3: adaptive multi-index
// ============================================================================

#[test]
fn e2e_adaptive_growth_stays_within_support() {
    let mut estimator = Estimator::builder(IndexSet::ad(2), SampleMethod::mc(), finite_support)
        .distributions(vec![Uncertainty::standard_normal()])
        .cost_model(|index: &Index| 2f64.powi(index.sum() as i32))
        .option("seed", 77_usize)
        .option("max_index_set_param", 20_usize)
        .build()
        .unwrap();

    let outcome = estimator.run(0.05).unwrap();
    assert!(outcome.is_converged());

    let current = estimator.current_index_set();
    assert!(current.iter().all(|index| index.sum() <= 4), "{:?}", current);
    let support = IndexSet::td(2).enumerate(3);
    assert!(support.is_subset(current));

    let adaptive = estimator.internals().adaptive().unwrap();
    assert!(adaptive.is_consistent());
    assert!(adaptive.active_set().iter().all(|index| index.sum() == 4));

    // Σ_{|α| ≤ 3} 2^-|α| = 1 + 2/2 + 3/4 + 4/8
    assert!((estimator.mean()[0] - 3.25).abs() < 0.2);
}

// ============================================================================
// Other strategies
// ============================================================================

#[test]
fn e2e_quasi_monte_carlo_single_level() {
    let sampler = |_: &Index, inputs: &[f64]| {
        let q = inputs[0] * inputs[0] + inputs[1];
        Ok::<_, SamplingError>(SampleOutput::scalar(q, q))
    };
    let mut estimator = Estimator::builder(IndexSet::sl(), SampleMethod::qmc(), sampler)
        .distributions(vec![Uncertainty::unit_uniform(), Uncertainty::unit_uniform()])
        .option("seed", 5_usize)
        .option("nb_of_shifts", 8_usize)
        .build()
        .unwrap();

    let outcome = estimator.run(1e-3).unwrap();
    assert!(outcome.is_converged());
    // E[u² + v] = 1/3 + 1/2
    assert!((estimator.mean()[0] - 5.0 / 6.0).abs() < 5e-3);
    let acc = estimator.internals().accumulators(&Index::zero(1)).unwrap();
    assert_eq!(acc.nb_of_shifts(), 8);
    assert_eq!(acc.nb_of_evaluations(), 8 * acc.nb_of_samples());
}

#[test]
fn e2e_total_degree_multi_index() {
    // ΔQ_α = 4^-|α| (1 + z / 2): Σ_α 4^-|α| = (4/3)²
    let sampler = |index: &Index, inputs: &[f64]| {
        let diff = 4f64.powi(-(index.sum() as i32)) * (1.0 + 0.5 * inputs[0]);
        Ok::<_, SamplingError>(SampleOutput::scalar(diff, diff))
    };
    let tol = 1e-2;
    let mut estimator = Estimator::builder(IndexSet::td(2), SampleMethod::mc(), sampler)
        .distributions(vec![Uncertainty::standard_normal()])
        .cost_model(|index: &Index| 2f64.powi(index.sum() as i32))
        .option("seed", 606_usize)
        .build()
        .unwrap();

    let outcome = estimator.run(tol).unwrap();
    assert!(outcome.is_converged());
    let size = estimator.history().last().unwrap().size_param;
    assert_eq!(estimator.current_index_set(), &IndexSet::td(2).enumerate(size));
    assert!(estimator.rmse() <= tol);

    let exact = 16.0 / 9.0;
    let error = (estimator.mean()[0] - exact).abs();
    assert!(error <= 4.0 * tol, "error {}", error);
}

#[test]
fn e2e_quasi_monte_carlo_multilevel() {
    let tol = 1e-2;
    let mut estimator = Estimator::builder(IndexSet::ml(), SampleMethod::qmc(), decaying_levels)
        .distributions(vec![Uncertainty::standard_normal()])
        .cost_model(level_cost)
        .option("seed", 17_usize)
        .option("nb_of_shifts", 8_usize)
        .build()
        .unwrap();

    let outcome = estimator.run(tol).unwrap();
    assert!(outcome.is_converged());
    assert!(estimator.current_index_set().len() >= 3);
    assert!(estimator.rmse() <= tol);
    for index in estimator.current_index_set() {
        let acc = estimator.internals().accumulators(index).unwrap();
        assert_eq!(acc.nb_of_evaluations(), 8 * acc.nb_of_samples());
    }

    let exact = 1.0 + 1.0 / 3.0;
    let error = (estimator.mean()[0] - exact).abs();
    assert!(error <= 3.0 * tol, "error {}", error);
}

#[test]
fn e2e_unbiased_multilevel() {
    let u = IndexSet::unbiased(IndexSet::ml()).unwrap();
    let mut estimator = Estimator::builder(u, SampleMethod::mc(), decaying_levels)
        .distributions(vec![Uncertainty::standard_normal()])
        .cost_model(level_cost)
        .option("seed", 31_usize)
        .option("max_index_set_param", 8_usize)
        .build()
        .unwrap();

    let outcome = estimator.run(2e-2).unwrap();
    assert!(outcome.is_converged());
    assert_eq!(estimator.bias(), 0.0);
    assert!(estimator.varest() <= 4e-4);
    // Σ_{ℓ ≤ 8} E[ΔQ_ℓ] = 1 + Σ_{1 ≤ ℓ ≤ 8} 4^-ℓ
    let exact = 1.0 + (1.0 - 4f64.powi(-8)) / 3.0;
    assert!((estimator.mean()[0] - exact).abs() < 0.1);
}

#[test]
fn e2e_parallel_execution_matches_sequential() {
    let build = |parallel: bool| {
        let builder = Estimator::builder(IndexSet::ml(), SampleMethod::mc(), decaying_levels)
            .distributions(vec![Uncertainty::standard_normal()])
            .cost_model(level_cost)
            .option("seed", 8_usize);
        let builder = if parallel {
            builder.executor(RayonExecutor::with_workers(4).unwrap())
        } else {
            builder.executor(SequentialExecutor)
        };
        builder.build().unwrap()
    };
    let mut sequential = build(false);
    let mut parallel = build(true);
    sequential.run(2e-2).unwrap();
    parallel.run(2e-2).unwrap();

    assert_eq!(sequential.mean(), parallel.mean());
    assert_eq!(sequential.current_index_set(), parallel.current_index_set());
}
